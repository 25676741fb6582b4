use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::backend::BackendError;
use crate::db::models::{AccountRow, SessionRow};
use crate::db::format_time;
use crate::state::DbPool;

/// Create a new session for an account. The returned row carries the secret.
pub fn create_session(
    pool: &DbPool,
    account_id: &str,
    hours: u64,
) -> Result<SessionRow, BackendError> {
    let conn = pool.get()?;

    let now = Utc::now();
    let session = SessionRow {
        id: uuid::Uuid::now_v7().simple().to_string(),
        account_id: account_id.to_string(),
        secret: generate_secret(),
        expires_at: format_time(&(now + Duration::hours(hours as i64))),
        created_at: format_time(&now),
    };

    conn.execute(
        "INSERT INTO sessions (id, account_id, secret, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.id,
            session.account_id,
            session.secret,
            session.expires_at,
            session.created_at
        ],
    )?;

    Ok(session)
}

/// Resolve a secret to its session and account, ignoring expired sessions.
pub fn find_active(
    pool: &DbPool,
    secret: &str,
) -> Result<Option<(SessionRow, AccountRow)>, BackendError> {
    let conn = pool.get()?;
    let now = format_time(&Utc::now());

    Ok(conn
        .query_row(
            "SELECT s.id, s.account_id, s.secret, s.expires_at, s.created_at,
                    a.id, a.email, a.name, a.password_hash, a.created_at
             FROM sessions s JOIN accounts a ON a.id = s.account_id
             WHERE s.secret = ?1 AND s.expires_at > ?2",
            params![secret, now],
            |row| {
                Ok((
                    SessionRow {
                        id: row.get(0)?,
                        account_id: row.get(1)?,
                        secret: row.get(2)?,
                        expires_at: row.get(3)?,
                        created_at: row.get(4)?,
                    },
                    AccountRow {
                        id: row.get(5)?,
                        email: row.get(6)?,
                        name: row.get(7)?,
                        password_hash: row.get(8)?,
                        created_at: row.get(9)?,
                    },
                ))
            },
        )
        .optional()?)
}

/// Delete one session of an account. Returns false if it did not exist.
pub fn delete_session(pool: &DbPool, account_id: &str, id: &str) -> Result<bool, BackendError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM sessions WHERE id = ?1 AND account_id = ?2",
        params![id, account_id],
    )?;
    Ok(rows > 0)
}

/// Delete every session of an account.
pub fn revoke_all(pool: &DbPool, account_id: &str) -> Result<usize, BackendError> {
    let conn = pool.get()?;
    Ok(conn.execute(
        "DELETE FROM sessions WHERE account_id = ?1",
        params![account_id],
    )?)
}

/// Generate a cryptographically random 32-byte hex secret.
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
