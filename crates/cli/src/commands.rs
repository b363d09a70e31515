use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use stampcache_core::{CatalogCache, CatalogRecord, Freshness};

use crate::Command;

/// Run one subcommand against an open cache, writing its output to `out`.
pub fn execute(
    cache: &CatalogCache,
    command: &Command,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Status => status(cache, now, out),
        Command::Import {
            normalized,
            raw,
            mark_refreshed,
        } => import(cache, normalized, raw.as_deref(), *mark_refreshed, now, out),
        Command::Page { offset, limit } => page(cache, *offset, *limit, out),
        Command::Clear => {
            cache.clear_all().context("Failed to clear cache")?;
            writeln!(out, "Cleared cached records")?;
            Ok(())
        }
        Command::Reset => {
            cache.reset_store().context("Failed to reset cache database")?;
            writeln!(out, "Cache database reset")?;
            Ok(())
        }
    }
}

fn status(cache: &CatalogCache, now: DateTime<Utc>, out: &mut impl Write) -> Result<()> {
    let stats = cache.stats().context("Failed to read cache statistics")?;
    let freshness = cache.freshness(now);

    writeln!(out, "schema version:     {}", stats.schema_version)?;
    writeln!(out, "normalized records: {}", stats.normalized_records)?;
    writeln!(out, "raw items:          {}", stats.raw_items)?;
    writeln!(
        out,
        "last refresh:       {}",
        stats.last_refresh_date.as_deref().unwrap_or("never")
    )?;
    match &freshness {
        Freshness::Unknown(e) => writeln!(out, "freshness:          unknown ({})", e)?,
        other => writeln!(out, "freshness:          {}", other.label())?,
    }
    Ok(())
}

fn import(
    cache: &CatalogCache,
    normalized: &Path,
    raw: Option<&Path>,
    mark_refreshed: bool,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<()> {
    let records: Vec<CatalogRecord> = read_json_array(normalized)?;
    cache
        .save_normalized(&records)
        .context("Failed to save normalized records")?;
    writeln!(out, "Imported {} normalized records", records.len())?;

    if let Some(raw) = raw {
        let items: Vec<Value> = read_json_array(raw)?;
        cache.save_raw(&items).context("Failed to save raw items")?;
        writeln!(out, "Imported {} raw items", items.len())?;
    }

    if mark_refreshed {
        cache
            .mark_refreshed(now)
            .context("Failed to record refresh date")?;
        info!("Marked cache refreshed");
        writeln!(out, "Refresh date set to {}", now.date_naive())?;
    }
    Ok(())
}

fn page(cache: &CatalogCache, offset: u64, limit: u64, out: &mut impl Write) -> Result<()> {
    let page = cache
        .load_normalized_page(offset, limit)
        .context("Failed to read page")?;
    serde_json::to_writer_pretty(&mut *out, &page)?;
    writeln!(out)?;
    Ok(())
}

fn read_json_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{:?} is not a JSON array of catalog entries", path))
}
