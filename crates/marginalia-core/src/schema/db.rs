use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::Result;
use crate::model::{
    Flag, ListItem, NewListItem, NewNote, Note, NoteUpdate, User, DEFAULT_FLAG_COLOR,
    DEFAULT_NOTE_COLOR,
};

use super::migrations::{AppliedMigration, MigrationReport, MigrationRunner};
use super::parse_timestamp;

/// A database connection with CRUD methods for the notes domain.
///
/// The connection is exclusively owned; no other component may write to the
/// schema while a migration run is active.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database at the given path and bring its schema up
    /// to date. This is the application bootstrap path: a failure here means
    /// the process must not start serving.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::open_without_migrating(path)?;
        db.run_pending_migrations()?;
        Ok(db)
    }

    /// Open without touching the schema, for diagnostic tooling that only
    /// wants to inspect version state.
    pub fn open_without_migrating(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.run_pending_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Apply any released migrations not yet recorded. Blocking; the first
    /// failure aborts the run and should abort startup with it.
    pub fn run_pending_migrations(&self) -> Result<MigrationReport> {
        MigrationRunner::new(&self.conn).run_pending()
    }

    /// Current schema version, 0 for a never-migrated database.
    pub fn schema_version(&self) -> Result<u32> {
        MigrationRunner::new(&self.conn).current_version()
    }

    /// The applied-migrations audit trail, ascending by version.
    pub fn migration_history(&self) -> Result<Vec<AppliedMigration>> {
        MigrationRunner::new(&self.conn).history()
    }

    /// Released versions not yet applied, ascending.
    pub fn pending_migrations(&self) -> Result<Vec<u32>> {
        MigrationRunner::new(&self.conn).pending()
    }
}

// User rows
impl Database {
    /// Insert a user. The password is stored as given; hashing is the
    /// caller's job. Username/email uniqueness violations propagate.
    pub fn insert_user(&self, username: &str, email: &str, password: &str) -> Result<User> {
        self.conn.execute(
            "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, email, password],
        )?;
        let id = self.conn.last_insert_rowid();
        let user = self.conn.query_row(
            "SELECT id, username, email, password, created_at FROM users WHERE id = ?1",
            [id],
            |row| row_to_user(row),
        )?;
        Ok(user)
    }

    /// Look a user up for login.
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
                [username],
                |row| row_to_user(row),
            )
            .optional()?;
        Ok(user)
    }
}

// Note CRUD
impl Database {
    /// Insert a new note and read the created row back.
    pub fn insert_note(&self, note: &NewNote) -> Result<Note> {
        self.conn.execute(
            "INSERT INTO notes (user_id, title, content, content_html, color)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                note.user_id,
                note.title,
                note.content,
                note.content_html,
                note.color.as_deref().unwrap_or(DEFAULT_NOTE_COLOR),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        let created = self.conn.query_row(
            "SELECT id, user_id, title, content, content_html, color, is_pinned,
                    created_at, updated_at
             FROM notes WHERE id = ?1",
            [id],
            |row| row_to_note(row),
        )?;
        Ok(created)
    }

    /// Fetch one of the user's notes.
    pub fn get_note(&self, id: i64, user_id: i64) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                "SELECT id, user_id, title, content, content_html, color, is_pinned,
                        created_at, updated_at
                 FROM notes WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
                |row| row_to_note(row),
            )
            .optional()?;
        Ok(note)
    }

    /// All of the user's notes, pinned first, most recently edited next.
    pub fn list_notes(&self, user_id: i64) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, content, content_html, color, is_pinned,
                    created_at, updated_at
             FROM notes
             WHERE user_id = ?1
             ORDER BY is_pinned DESC, updated_at DESC",
        )?;
        let notes = stmt
            .query_map([user_id], |row| row_to_note(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// Edit a note's content, touching `updated_at`. Returns whether a row
    /// of this user actually changed.
    pub fn update_note(&self, id: i64, user_id: i64, update: &NoteUpdate) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET title = ?1, content = ?2, content_html = ?3, color = ?4,
                 updated_at = datetime('now')
             WHERE id = ?5 AND user_id = ?6",
            rusqlite::params![
                update.title,
                update.content,
                update.content_html,
                update.color,
                id,
                user_id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a note; its list items cascade away with it.
    pub fn delete_note(&self, id: i64, user_id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
            [id, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Pin or unpin a note.
    pub fn set_note_pinned(&self, id: i64, user_id: i64, pinned: bool) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notes SET is_pinned = ?1 WHERE id = ?2 AND user_id = ?3",
            rusqlite::params![pinned, id, user_id],
        )?;
        Ok(changed > 0)
    }
}

// List item rows (checklist / flagged-checklist / TODO nodes)
impl Database {
    /// Replace a note's items wholesale, the way an editor save does.
    pub fn replace_note_items(&self, note_id: i64, items: &[NewListItem]) -> Result<()> {
        self.conn
            .execute("DELETE FROM list_items WHERE note_id = ?1", [note_id])?;
        for item in items {
            self.conn.execute(
                "INSERT INTO list_items (note_id, content, flag_id, position, completed)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    note_id,
                    item.content,
                    item.flag_id,
                    item.position,
                    item.completed,
                ],
            )?;
        }
        Ok(())
    }

    /// A note's items in display order, with their flag resolved.
    pub fn list_note_items(&self, note_id: i64) -> Result<Vec<ListItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT li.id, li.note_id, li.content, li.flag_id, li.position, li.completed,
                    li.created_at, f.name, f.color
             FROM list_items li
             LEFT JOIN flags f ON li.flag_id = f.id
             WHERE li.note_id = ?1
             ORDER BY li.position ASC",
        )?;
        let items = stmt
            .query_map([note_id], |row| row_to_list_item(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

// Flag CRUD
impl Database {
    /// Create a flag. Duplicate names surface as a uniqueness violation.
    pub fn insert_flag(&self, name: &str, color: Option<&str>) -> Result<Flag> {
        self.conn.execute(
            "INSERT INTO flags (name, color) VALUES (?1, ?2)",
            rusqlite::params![name, color.unwrap_or(DEFAULT_FLAG_COLOR)],
        )?;
        let id = self.conn.last_insert_rowid();
        let flag = self.conn.query_row(
            "SELECT id, name, color, created_at FROM flags WHERE id = ?1",
            [id],
            |row| row_to_flag(row),
        )?;
        Ok(flag)
    }

    /// All flags, name-ordered.
    pub fn list_flags(&self) -> Result<Vec<Flag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, created_at FROM flags ORDER BY name ASC")?;
        let flags = stmt
            .query_map([], |row| row_to_flag(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flags)
    }

    /// Rename/recolor a flag. Returns whether the flag existed.
    pub fn update_flag(&self, id: i64, name: &str, color: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE flags SET name = ?1, color = ?2 WHERE id = ?3",
            rusqlite::params![name, color, id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a flag; items carrying it are detached, not deleted.
    pub fn delete_flag(&self, id: i64) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM flags WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        content_html: row.get(4)?,
        color: row.get(5)?,
        is_pinned: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}

fn row_to_list_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListItem> {
    let created_at: String = row.get(6)?;
    Ok(ListItem {
        id: row.get(0)?,
        note_id: row.get(1)?,
        content: row.get(2)?,
        flag_id: row.get(3)?,
        position: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        // Pre-TODO rows carry NULL here.
        completed: row.get::<_, Option<bool>>(5)?.unwrap_or(false),
        created_at: parse_timestamp(6, &created_at)?,
        flag_name: row.get(7)?,
        flag_color: row.get(8)?,
    })
}

fn row_to_flag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flag> {
    let created_at: String = row.get(3)?;
    Ok(Flag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at: parse_timestamp(3, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, User) {
        let db = Database::open_in_memory().unwrap();
        let user = db.insert_user("ada", "ada@example.com", "hash").unwrap();
        (db, user)
    }

    #[test]
    fn test_open_in_memory_migrates_to_latest() {
        let db = Database::open_in_memory().unwrap();

        assert_eq!(db.schema_version().unwrap(), 4);
        let history = db.migration_history().unwrap();
        let versions: Vec<u32> = history.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3, 4]);
        assert!(db.pending_migrations().unwrap().is_empty());

        // A second run is a no-op.
        let report = db.run_pending_migrations().unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.current_version, 4);
    }

    #[test]
    fn test_user_round_trip() {
        let (db, user) = seeded();
        assert_eq!(user.username, "ada");

        let found = db.find_user_by_username("ada").unwrap();
        assert_eq!(found, Some(user));
        assert_eq!(db.find_user_by_username("nobody").unwrap(), None);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (db, _user) = seeded();
        assert!(db.insert_user("ada", "other@example.com", "hash").is_err());
    }

    #[test]
    fn test_note_round_trip() {
        let (db, user) = seeded();

        let note = db
            .insert_note(
                &NewNote::new(user.id, "Groceries", "milk, eggs")
                    .with_content_html("<p>milk, eggs</p>")
                    .with_color("#ffee88"),
            )
            .unwrap();
        assert_eq!(note.color, "#ffee88");
        assert_eq!(note.content_html.as_deref(), Some("<p>milk, eggs</p>"));
        assert!(!note.is_pinned);

        let fetched = db.get_note(note.id, user.id).unwrap();
        assert_eq!(fetched, Some(note.clone()));

        // Scoped to the owner.
        assert_eq!(db.get_note(note.id, user.id + 1).unwrap(), None);
    }

    #[test]
    fn test_note_defaults() {
        let (db, user) = seeded();
        let note = db
            .insert_note(&NewNote::new(user.id, "Untitled", "body"))
            .unwrap();
        assert_eq!(note.color, DEFAULT_NOTE_COLOR);
        assert_eq!(note.content_html, None);
    }

    #[test]
    fn test_update_note_is_user_scoped() {
        let (db, user) = seeded();
        let note = db
            .insert_note(&NewNote::new(user.id, "Draft", "v1"))
            .unwrap();

        let update = NoteUpdate {
            title: "Draft".to_string(),
            content: "v2".to_string(),
            content_html: None,
            color: DEFAULT_NOTE_COLOR.to_string(),
        };
        assert!(db.update_note(note.id, user.id, &update).unwrap());
        assert!(!db.update_note(note.id, user.id + 1, &update).unwrap());

        let fetched = db.get_note(note.id, user.id).unwrap().unwrap();
        assert_eq!(fetched.content, "v2");
    }

    #[test]
    fn test_pinned_notes_list_first() {
        let (db, user) = seeded();
        let first = db
            .insert_note(&NewNote::new(user.id, "first", "a"))
            .unwrap();
        let second = db
            .insert_note(&NewNote::new(user.id, "second", "b"))
            .unwrap();

        assert!(db.set_note_pinned(second.id, user.id, true).unwrap());
        let notes = db.list_notes(user.id).unwrap();
        assert_eq!(notes[0].id, second.id);
        assert!(notes[0].is_pinned);

        assert!(db.set_note_pinned(second.id, user.id, false).unwrap());
        assert!(!db.set_note_pinned(first.id, user.id + 1, true).unwrap());
    }

    #[test]
    fn test_replace_note_items() {
        let (db, user) = seeded();
        let note = db
            .insert_note(&NewNote::new(user.id, "todos", ""))
            .unwrap();

        db.replace_note_items(
            note.id,
            &[
                NewListItem::new("buy milk", 0),
                NewListItem::new("call home", 1).completed(true),
            ],
        )
        .unwrap();
        let items = db.list_note_items(note.id).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "buy milk");
        assert!(items[1].completed);

        // A later save replaces the whole set.
        db.replace_note_items(note.id, &[NewListItem::new("only one", 0)])
            .unwrap();
        let items = db.list_note_items(note.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "only one");
    }

    #[test]
    fn test_items_ordered_by_position() {
        let (db, user) = seeded();
        let note = db.insert_note(&NewNote::new(user.id, "list", "")).unwrap();

        db.replace_note_items(
            note.id,
            &[
                NewListItem::new("third", 2),
                NewListItem::new("first", 0),
                NewListItem::new("second", 1),
            ],
        )
        .unwrap();

        let items = db.list_note_items(note.id).unwrap();
        let contents: Vec<&str> = items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_deleting_note_cascades_items() {
        let (db, user) = seeded();
        let note = db.insert_note(&NewNote::new(user.id, "gone", "")).unwrap();
        db.replace_note_items(note.id, &[NewListItem::new("orphan?", 0)])
            .unwrap();

        assert!(db.delete_note(note.id, user.id).unwrap());
        assert!(db.list_note_items(note.id).unwrap().is_empty());
    }

    #[test]
    fn test_flag_round_trip_and_ordering() {
        let (db, _user) = seeded();
        db.insert_flag("urgent", Some("#ff0000")).unwrap();
        let later = db.insert_flag("later", None).unwrap();
        assert_eq!(later.color, DEFAULT_FLAG_COLOR);

        let names: Vec<String> = db
            .list_flags()
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["later", "urgent"]);

        assert!(db.update_flag(later.id, "someday", "#00ff00").unwrap());
        assert!(!db.update_flag(later.id + 100, "nope", "#000000").unwrap());

        // Names are unique.
        assert!(db.insert_flag("urgent", None).is_err());
    }

    #[test]
    fn test_deleting_flag_detaches_items() {
        let (db, user) = seeded();
        let note = db.insert_note(&NewNote::new(user.id, "tagged", "")).unwrap();
        let flag = db.insert_flag("urgent", None).unwrap();
        db.replace_note_items(note.id, &[NewListItem::new("do it", 0).with_flag(flag.id)])
            .unwrap();

        let items = db.list_note_items(note.id).unwrap();
        assert_eq!(items[0].flag_name.as_deref(), Some("urgent"));

        assert!(db.delete_flag(flag.id).unwrap());
        let items = db.list_note_items(note.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].flag_id, None);
        assert_eq!(items[0].flag_name, None);
    }
}
