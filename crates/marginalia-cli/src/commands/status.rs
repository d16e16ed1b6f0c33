use anyhow::Result;
use marginalia_core::schema::Database;
use std::path::Path;

pub fn show_status(db_path: &Path, json: bool) -> Result<()> {
    let db = Database::open_without_migrating(db_path)?;
    let current = db.schema_version()?;
    let history = db.migration_history()?;
    let pending = db.pending_migrations()?;

    if json {
        let payload = serde_json::json!({
            "current_version": current,
            "applied": history,
            "pending": pending,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("\n📊 Marginalia Schema Status\n");
    println!("  Database: {}", db_path.display());
    println!("  Current version: {current}");
    println!("  Applied migrations: {}", history.len());

    if pending.is_empty() {
        println!("  Schema is up to date");
    } else {
        let pending: Vec<String> = pending.iter().map(|v| format!("v{v}")).collect();
        println!("  Pending: {}", pending.join(", "));
        println!("\n  Run `marginalia migrate` to apply them");
    }

    Ok(())
}
