use std::path::Path;

use anyhow::{Context, Result};

use memora::config::MemoraConfig;
use memora::memo::transfer::{import_data, ExportData};

/// Import users, tags and memos from a JSON file produced by `memora export`.
///
/// Memos whose id already exists are skipped. New rows keep their ids and
/// timestamps.
pub fn import(config: &MemoraConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let data: ExportData = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let db_path = config.resolved_db_path();
    let mut conn = memora::db::open_database(&db_path)?;

    println!(
        "Importing {} memos and {} tags...",
        data.memos.len(),
        data.tags.len()
    );

    let summary = import_data(&mut conn, &data)?;

    println!("Import complete:");
    println!("  Users upserted:  {}", summary.users);
    println!("  Tags created:    {}", summary.tags_created);
    println!("  Memos imported:  {}", summary.memos_imported);
    println!("  Memos skipped:   {} (already exist)", summary.memos_skipped);

    Ok(())
}
