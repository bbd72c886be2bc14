use rusqlite::{Connection, Result};

/// Initialise document-store tables. Safe to call on every startup
/// (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    create_users_table(conn)?;
    create_rooms_tables(conn)?;
    create_files_tables(conn)?;
    Ok(())
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );",
    )
}

fn create_rooms_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rooms (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            owner_id     TEXT NOT NULL,
            invite_code  TEXT NOT NULL UNIQUE,
            created_at   TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS room_members (
            room_id  TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            user_id  TEXT NOT NULL,
            added_at TEXT NOT NULL,
            PRIMARY KEY (room_id, user_id)
        );",
    )
}

/// `file_versions` is append-only. The UNIQUE(file_id, created_at) pair
/// (second resolution) makes `append_version` idempotent under retry:
/// duplicate rows within the same second are ignored.
fn create_files_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS files (
            id          TEXT PRIMARY KEY,
            room_id     TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            content     TEXT NOT NULL DEFAULT '',
            language    TEXT NOT NULL DEFAULT 'plaintext',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_files_room
            ON files(room_id);
        CREATE TABLE IF NOT EXISTS file_versions (
            id          TEXT PRIMARY KEY,
            file_id     TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            user_id     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE (file_id, created_at)
        );
        CREATE INDEX IF NOT EXISTS idx_versions_file
            ON file_versions(file_id, created_at DESC);",
    )
}
