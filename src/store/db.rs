use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use walkdir::WalkDir;

use crate::error::StoreError;

use super::model::Track;

/// Downloads land here first and are renamed into place by `create`.
pub const STAGING_DIR: &str = ".incoming";

/// Content-addressed track cache: one SQLite row and one file per track.
///
/// Every mutation runs with the connection lock held, so a row and its file
/// appear and disappear together as far as other callers can observe.
pub struct TrackStore {
    conn: Mutex<Connection>,
    files_dir: PathBuf,
}

impl TrackStore {
    pub fn open(database: &Path, files_dir: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(database)?;
        Self::with_connection(conn, files_dir)
    }

    /// Store backed by an in-memory database; files still live in `files_dir`.
    #[cfg(test)]
    pub fn open_in_memory(files_dir: &Path) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, files_dir)
    }

    fn with_connection(conn: Connection, files_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(files_dir.join(STAGING_DIR))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                title TEXT NOT NULL
            )",
            [],
        )?;

        let store = Self {
            conn: Mutex::new(conn),
            files_dir: files_dir.to_path_buf(),
        };
        store.clear_staging();
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leftovers from downloads interrupted by a crash.
    fn clear_staging(&self) {
        let staging = self.files_dir.join(STAGING_DIR);
        for entry in WalkDir::new(&staging)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!("removed stale staged file {}", entry.path().display()),
                    Err(e) => warn!("could not remove {}: {e}", entry.path().display()),
                }
            }
        }
    }

    #[cfg(test)]
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Final location of the audio file for `id`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.files_dir.join(id)
    }

    /// A fresh staging path for a download of `id`. Two calls never collide.
    pub fn staging_path(&self, id: &str) -> PathBuf {
        let nonce: u32 = rand::random();
        self.files_dir
            .join(STAGING_DIR)
            .join(format!("{id}.{nonce:08x}"))
    }

    pub fn lookup(&self, id: &str) -> Result<Track, StoreError> {
        let conn = self.conn();
        let track = find(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !self.path_for(id).is_file() {
            return Err(StoreError::Integrity {
                id: id.to_string(),
                detail: "record has no backing file".to_string(),
            });
        }
        Ok(track)
    }

    /// Register `track` and move `staged` into place as its backing file.
    ///
    /// The row insert and the rename commit together. On `AlreadyExists` the
    /// staged file is left untouched for the caller to discard.
    pub fn create(&self, track: &Track, staged: &Path) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        match tx.execute(
            "INSERT INTO tracks (id, source, title) VALUES (?1, ?2, ?3)",
            params![track.id, track.source, track.title],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::AlreadyExists(track.id.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let target = self.path_for(&track.id);
        if target.exists() {
            warn!(
                "replacing orphaned file {} while registering {}",
                target.display(),
                track.id
            );
        }
        // Dropping `tx` on error rolls the insert back.
        fs::rename(staged, &target)?;

        if let Err(e) = tx.commit() {
            if let Err(rm) = fs::remove_file(&target) {
                warn!("could not roll back {}: {rm}", target.display());
            }
            return Err(e.into());
        }

        info!("registered track {} ({})", track.id, track.title);
        Ok(())
    }

    /// Remove the backing file, then the record. A failed file removal keeps
    /// the record.
    pub fn delete(&self, id: &str) -> Result<Track, StoreError> {
        let conn = self.conn();
        let track = find(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        match fs::remove_file(self.path_for(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Integrity {
                    id: id.to_string(),
                    detail: "record has no backing file".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        conn.execute("DELETE FROM tracks WHERE id = ?1", params![id])?;
        info!("deleted track {} ({})", track.id, track.title);
        Ok(track)
    }

    /// Up to `n` distinct tracks chosen uniformly at random.
    pub fn random(&self, n: usize) -> Result<Vec<Track>, StoreError> {
        let mut tracks = all(&self.conn())?;
        tracks.shuffle(&mut rand::rng());
        tracks.truncate(n);
        Ok(tracks)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Cross-check records against the files directory.
    ///
    /// Returns one `StoreError::Integrity` per record without a file and per
    /// file without a record.
    pub fn verify(&self) -> Result<Vec<StoreError>, StoreError> {
        let conn = self.conn();
        let ids: HashSet<String> = all(&conn)?.into_iter().map(|t| t.id).collect();

        let mut faults = Vec::new();
        let mut seen = HashSet::new();

        for entry in WalkDir::new(&self.files_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if ids.contains(name) {
                seen.insert(name.to_string());
            } else {
                faults.push(StoreError::Integrity {
                    id: name.to_string(),
                    detail: "file has no record".to_string(),
                });
            }
        }

        for id in ids.difference(&seen) {
            faults.push(StoreError::Integrity {
                id: id.clone(),
                detail: "record has no backing file".to_string(),
            });
        }

        Ok(faults)
    }
}

fn find(conn: &Connection, id: &str) -> Result<Option<Track>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, source, title FROM tracks WHERE id = ?1",
        params![id],
        |row| {
            Ok(Track::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )
    .optional()
}

fn all(conn: &Connection) -> Result<Vec<Track>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT id, source, title FROM tracks")?;
    let rows = stmt.query_map([], |row| {
        Ok(Track::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let tracks = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(tracks)
}
