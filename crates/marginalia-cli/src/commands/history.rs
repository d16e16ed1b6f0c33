use anyhow::Result;
use marginalia_core::schema::Database;
use std::path::Path;

pub fn show_history(db_path: &Path, json: bool) -> Result<()> {
    let db = Database::open_without_migrating(db_path)?;
    let history = db.migration_history()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No migrations applied yet");
        return Ok(());
    }

    println!("\n📜 Applied migrations\n");
    for record in &history {
        println!(
            "  v{:<3} {}  {}",
            record.version,
            record.applied_at.format("%Y-%m-%d %H:%M:%S"),
            record.description
        );
    }

    Ok(())
}
