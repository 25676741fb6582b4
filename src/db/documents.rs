use rusqlite::{params, OptionalExtension, Row};

use crate::backend::BackendError;
use crate::db::models::DocumentRow;
use crate::state::DbPool;

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        seq: row.get(0)?,
        collection: row.get(1)?,
        id: row.get(2)?,
        data: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// All documents of a collection in insertion order.
pub fn list(pool: &DbPool, collection: &str) -> Result<Vec<DocumentRow>, BackendError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT seq, collection, id, data, created_at, updated_at
         FROM documents WHERE collection = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt
        .query_map(params![collection], document_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(pool: &DbPool, collection: &str, id: &str) -> Result<Option<DocumentRow>, BackendError> {
    let conn = pool.get()?;
    Ok(conn
        .query_row(
            "SELECT seq, collection, id, data, created_at, updated_at
             FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            document_from_row,
        )
        .optional()?)
}

/// Insert a document. Returns false when the id is already taken in the collection.
pub fn insert(
    pool: &DbPool,
    collection: &str,
    id: &str,
    data: &str,
    now: &str,
) -> Result<bool, BackendError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT OR IGNORE INTO documents (collection, id, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![collection, id, data, now],
    )?;
    Ok(rows > 0)
}

pub fn update(
    pool: &DbPool,
    collection: &str,
    id: &str,
    data: &str,
    now: &str,
) -> Result<bool, BackendError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE documents SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
        params![collection, id, data, now],
    )?;
    Ok(rows > 0)
}

pub fn delete(pool: &DbPool, collection: &str, id: &str) -> Result<bool, BackendError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
        params![collection, id],
    )?;
    Ok(rows > 0)
}
