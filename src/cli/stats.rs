use anyhow::Result;

use memora::config::MemoraConfig;

/// Display a user's memo statistics in the terminal.
pub fn stats(config: &MemoraConfig, user: &str) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = memora::db::open_database(&db_path)?;

    let stats = memora::memo::stats::memo_stats(&conn, user, config.api.stats_scan_limit)?;

    println!("Memo Statistics for {user}");
    println!("{}", "=".repeat(40));
    println!("  Total memos:         {}", stats.total);
    println!("  Favorites:           {}", stats.favorites);
    println!("  Archived:            {}", stats.archived);
    println!("  Created this week:   {}", stats.recent_count);
    println!();

    println!(
        "Categories ({}, from the latest {} memos):",
        stats.category_count, config.api.stats_scan_limit
    );
    for category in &stats.categories {
        println!("  {category}");
    }
    println!();

    println!("Tags ({}):", stats.tag_count);
    if !stats.tags.is_empty() {
        println!("  {}", stats.tags.join(", "));
    }

    Ok(())
}
