use rusqlite::{params, OptionalExtension};

use crate::backend::BackendError;
use crate::db::models::FileRow;
use crate::state::DbPool;

pub fn insert(pool: &DbPool, file: &FileRow) -> Result<bool, BackendError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT OR IGNORE INTO files (bucket, id, name, mime_type, size, path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            file.bucket,
            file.id,
            file.name,
            file.mime_type,
            file.size,
            file.path,
            file.created_at
        ],
    )?;
    Ok(rows > 0)
}

pub fn get(pool: &DbPool, bucket: &str, id: &str) -> Result<Option<FileRow>, BackendError> {
    let conn = pool.get()?;
    Ok(conn
        .query_row(
            "SELECT bucket, id, name, mime_type, size, path, created_at
             FROM files WHERE bucket = ?1 AND id = ?2",
            params![bucket, id],
            |row| {
                Ok(FileRow {
                    bucket: row.get(0)?,
                    id: row.get(1)?,
                    name: row.get(2)?,
                    mime_type: row.get(3)?,
                    size: row.get(4)?,
                    path: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )
        .optional()?)
}

pub fn delete(pool: &DbPool, bucket: &str, id: &str) -> Result<bool, BackendError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM files WHERE bucket = ?1 AND id = ?2",
        params![bucket, id],
    )?;
    Ok(rows > 0)
}
