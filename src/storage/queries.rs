use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};

use crate::domain::{Account, AccountId, Entry, Transfer};

use super::StoreError;

/// Point lookup shared by the pool and the in-flight transaction.
pub(crate) async fn fetch_account<'e, E>(
    executor: E,
    id: AccountId,
) -> Result<Option<Account>, StoreError>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT id, owner, balance, currency, created_at
        FROM accounts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_account).transpose()
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = row.try_get(column).map_err(StoreError::Database)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("invalid {column} timestamp {raw:?}: {e}")))
}

pub(crate) fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}

pub(crate) fn row_to_entry(row: &SqliteRow) -> Result<Entry, StoreError> {
    Ok(Entry {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}

pub(crate) fn row_to_transfer(row: &SqliteRow) -> Result<Transfer, StoreError> {
    Ok(Transfer {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}
