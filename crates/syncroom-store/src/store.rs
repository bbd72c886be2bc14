use std::sync::Mutex;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};
use syncroom_core::config::{STORE_ATTEMPT_TIMEOUT_MS, VERSION_RING};
use syncroom_core::types::{FileVersion, Room, RoomFile};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db;
use crate::error::{Result, StoreError};

/// Durable store for rooms, files, and version history.
///
/// Wraps a single SQLite connection in a `Mutex`. All content writes are
/// funneled through one hub per room, so a single connection is enough;
/// the busy timeout covers cross-process readers.
pub struct DocumentStore {
    db: Mutex<Connection>,
}

impl DocumentStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests and demos.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(STORE_ATTEMPT_TIMEOUT_MS))?;
        db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    // ── users ────────────────────────────────────────────────────────────

    /// Record the identity produced by the gate so membership rows have a
    /// stable target. Username updates win on conflict.
    pub fn upsert_user(&self, user_id: &str, username: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET username = excluded.username",
            params![user_id, username, now],
        )?;
        Ok(())
    }

    // ── rooms & membership ───────────────────────────────────────────────

    /// Create a room and enrol the owner as its first member.
    #[instrument(skip(self))]
    pub fn create_room(&self, name: &str, owner_id: &str) -> Result<Room> {
        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            invite_code: invite_code(),
            created_at: Utc::now().to_rfc3339(),
        };
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO rooms (id, name, owner_id, invite_code, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                room.id,
                room.name,
                room.owner_id,
                room.invite_code,
                room.created_at
            ],
        )?;
        db.execute(
            "INSERT OR IGNORE INTO room_members (room_id, user_id, added_at)
             VALUES (?1, ?2, ?3)",
            params![room.id, room.owner_id, room.created_at],
        )?;
        Ok(room)
    }

    /// Delete a room; files and versions cascade.
    #[instrument(skip(self))]
    pub fn delete_room(&self, room_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let changed = db.execute("DELETE FROM rooms WHERE id = ?1", params![room_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "room",
                id: room_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, name, owner_id, invite_code, created_at
             FROM rooms WHERE id = ?1",
            params![room_id],
            row_to_room,
        ) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    pub fn add_member(&self, room_id: &str, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO room_members (room_id, user_id, added_at)
             VALUES (?1, ?2, ?3)",
            params![room_id, user_id, now],
        )?;
        Ok(())
    }

    /// Authoritative permission check: a user may read/edit a room iff a
    /// membership row exists. Hot path, called on every hub join.
    pub fn room_member(&self, room_id: &str, user_id: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM room_members WHERE room_id = ?1 AND user_id = ?2",
            params![room_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ── files ────────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub fn create_file(&self, room_id: &str, name: &str, language: &str) -> Result<RoomFile> {
        let now = Utc::now().to_rfc3339();
        let file = RoomFile {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            name: name.to_string(),
            content: String::new(),
            language: language.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO files (id, room_id, name, content, language, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.id,
                file.room_id,
                file.name,
                file.content,
                file.language,
                file.created_at,
                file.updated_at
            ],
        )
        .map_err(|e| match e {
            // FK violation: the room is gone.
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::NotFound {
                    entity: "room",
                    id: room_id.to_string(),
                }
            }
            other => StoreError::Database(other),
        })?;
        Ok(file)
    }

    #[instrument(skip(self))]
    pub fn delete_file(&self, file_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let changed = db.execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "file",
                id: file_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn load_file(&self, file_id: &str) -> Result<RoomFile> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, room_id, name, content, language, created_at, updated_at
             FROM files WHERE id = ?1",
            params![file_id],
            row_to_file,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                entity: "file",
                id: file_id.to_string(),
            },
            other => StoreError::Database(other),
        })
    }

    pub fn list_files(&self, room_id: &str) -> Result<Vec<RoomFile>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, room_id, name, content, language, created_at, updated_at
             FROM files WHERE room_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![room_id], row_to_file)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    /// Replace a file's content and bump `updated_at` atomically.
    #[instrument(skip(self, content))]
    pub fn save_content(&self, file_id: &str, content: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "UPDATE files SET content = ?2, updated_at = ?3 WHERE id = ?1",
            params![file_id, content, now],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "file",
                id: file_id.to_string(),
            });
        }
        Ok(())
    }

    // ── versions ─────────────────────────────────────────────────────────

    /// Snapshot the pre-save content. Idempotent on retry: a duplicate row
    /// for the same (file, second) is silently ignored.
    pub fn append_version(&self, file_id: &str, prior_content: &str, user_id: &str) -> Result<()> {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.append_version_at(file_id, prior_content, user_id, &stamp)
    }

    pub(crate) fn append_version_at(
        &self,
        file_id: &str,
        prior_content: &str,
        user_id: &str,
        created_at: &str,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let inserted = db.execute(
            "INSERT OR IGNORE INTO file_versions (id, file_id, content, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                file_id,
                prior_content,
                user_id,
                created_at
            ],
        )?;
        if inserted == 0 {
            debug!(file_id, created_at, "duplicate version row ignored");
        }
        Ok(())
    }

    /// The ring of the most recent versions, newest first.
    pub fn list_versions(&self, file_id: &str) -> Result<Vec<FileVersion>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, file_id, content, user_id, created_at
             FROM file_versions WHERE file_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![file_id, VERSION_RING as i64], row_to_version)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }
}

/// Short URL-safe invite code derived from a fresh UUID.
fn invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        invite_code: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoomFile> {
    Ok(RoomFile {
        id: row.get(0)?,
        room_id: row.get(1)?,
        name: row.get(2)?,
        content: row.get(3)?,
        language: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileVersion> {
    Ok(FileVersion {
        id: row.get(0)?,
        file_id: row.get(1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}
