use anyhow::Result;
use marginalia_core::schema::Database;
use std::path::Path;

pub fn run_migrate(db_path: &Path) -> Result<()> {
    let db = Database::open_without_migrating(db_path)?;
    let before = db.schema_version()?;
    let report = db.run_pending_migrations()?;

    if report.applied.is_empty() {
        println!("✅ Schema up to date (version {})", report.current_version);
    } else {
        let applied: Vec<String> = report.applied.iter().map(|v| format!("v{v}")).collect();
        println!(
            "🎉 Applied {} migration(s): {}",
            report.applied.len(),
            applied.join(", ")
        );
        println!(
            "   Schema version: {} (was {})",
            report.current_version, before
        );
    }

    Ok(())
}
