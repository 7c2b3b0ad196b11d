use anyhow::Result;

use memora::config::MemoraConfig;
use memora::memo::transfer::export_data;

/// Export users, tags and memos as JSON to stdout.
pub fn export(config: &MemoraConfig, user: Option<&str>) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = memora::db::open_database(&db_path)?;

    let data = export_data(&conn, user)?;

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} memos, {} tags and {} users.",
        data.memos.len(),
        data.tags.len(),
        data.users.len()
    );

    Ok(())
}
