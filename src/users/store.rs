//! SQLite-backed user records.
//!
//! Holds profile fields and the Google refresh token, which is sealed with
//! [`TokenCipher`] before it touches disk.

use super::encryption::TokenCipher;
use super::{ProfileUpdate, UserRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// User table.
///
/// # Schema
/// ```sql
/// CREATE TABLE users (
///     id                   TEXT PRIMARY KEY,
///     email                TEXT,
///     display_name         TEXT,
///     google_refresh_token TEXT,          -- Sealed (nonce.ciphertext)
///     created_at           TEXT NOT NULL, -- RFC 3339
///     updated_at           TEXT NOT NULL  -- RFC 3339
/// );
/// ```
///
/// Concurrent writes to the same row are last-write-wins.
pub struct UserStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

impl UserStore {
    /// Creates or opens the store.
    ///
    /// # Arguments
    /// * `db_path` - SQLite file, or `:memory:`
    /// * `encryption_key` - Base64-encoded 32-byte key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = TokenCipher::from_base64_key(encryption_key).context("Invalid encryption key")?;
        let conn = Connection::open(db_path).context("Failed to open user database")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id                   TEXT PRIMARY KEY,
                email                TEXT,
                display_name         TEXT,
                google_refresh_token TEXT,
                created_at           TEXT NOT NULL,
                updated_at           TEXT NOT NULL
            );",
        )
        .context("Failed to create users table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("User store lock poisoned"))
    }

    /// Looks up a user. `Ok(None)` when no record exists.
    pub fn get(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, email, display_name, google_refresh_token, created_at, updated_at
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .context("Failed to query user")?;

        let Some((id, email, display_name, sealed_token, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let google_refresh_token = sealed_token
            .map(|sealed| self.cipher.open(&sealed))
            .transpose()
            .context("Failed to decrypt refresh token")?;

        Ok(Some(UserRecord {
            id,
            email,
            display_name,
            google_refresh_token,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    /// Creates the user or updates the given profile fields.
    ///
    /// Fields left `None` keep their stored value; the refresh token is never
    /// touched here.
    pub fn upsert_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<UserRecord> {
        let now = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO users (id, email, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     email = COALESCE(excluded.email, users.email),
                     display_name = COALESCE(excluded.display_name, users.display_name),
                     updated_at = excluded.updated_at",
                params![user_id, update.email, update.display_name, now],
            )
            .context("Failed to upsert user profile")?;

        self.get(user_id)?
            .ok_or_else(|| anyhow!("User '{}' missing after upsert", user_id))
    }

    /// Stores (overwrites) the user's Google refresh token.
    ///
    /// Creates a bare record when the user id is unknown, so a link made before
    /// the profile exists is not lost.
    pub fn set_refresh_token(&self, user_id: &str, refresh_token: &str) -> Result<()> {
        let sealed = self
            .cipher
            .seal(refresh_token)
            .context("Failed to encrypt refresh token")?;
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                "INSERT INTO users (id, google_refresh_token, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     google_refresh_token = excluded.google_refresh_token,
                     updated_at = excluded.updated_at",
                params![user_id, sealed, now],
            )
            .context("Failed to store refresh token")?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{}'", value))
}
