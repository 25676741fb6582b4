use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::AccountRow;

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_account(conn: &rusqlite::Connection, account: &AccountRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, email, name, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            account.id,
            account.email,
            account.name,
            account.password_hash,
            account.created_at
        ],
    )?;
    Ok(())
}

pub fn find_by_email(
    conn: &rusqlite::Connection,
    email: &str,
) -> rusqlite::Result<Option<AccountRow>> {
    conn.query_row(
        "SELECT id, email, name, password_hash, created_at FROM accounts WHERE email = ?1 COLLATE NOCASE",
        params![email],
        account_from_row,
    )
    .optional()
}
