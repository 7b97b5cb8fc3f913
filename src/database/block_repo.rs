use chrono::NaiveDateTime;
use sqlx::SqliteConnection;

use crate::models::BlocksRow;

const SQL_BLOCK_COLUMNS: &str = r#"
SELECT
  id,
  date,
  block_letter,
  locked,
  signup_deadline,
  auto_locked_at
FROM blocks
"#;

pub async fn load_block(conn: &mut SqliteConnection, block_id: i64) -> sqlx::Result<Option<BlocksRow>> {
    let sql = format!("{SQL_BLOCK_COLUMNS} WHERE id = ?1 LIMIT 1");
    sqlx::query_as::<_, BlocksRow>(&sql)
        .bind(block_id)
        .fetch_optional(conn)
        .await
}

pub async fn list_due_for_auto_lock(
    conn: &mut SqliteConnection,
    now: NaiveDateTime,
) -> sqlx::Result<Vec<BlocksRow>> {
    let sql = format!(
        "{SQL_BLOCK_COLUMNS} WHERE auto_locked_at IS NULL AND signup_deadline IS NOT NULL AND signup_deadline <= ?1 ORDER BY date, block_letter"
    );
    sqlx::query_as::<_, BlocksRow>(&sql)
        .bind(now)
        .fetch_all(conn)
        .await
}

const SQL_SET_LOCKED: &str = r#"
UPDATE blocks
SET locked = ?1
WHERE id = ?2
"#;

pub async fn set_locked(conn: &mut SqliteConnection, block_id: i64, locked: bool) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_LOCKED)
        .bind(locked)
        .bind(block_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

// Only the first deadline lock counts; an admin unlock afterwards sticks.
const SQL_MARK_AUTO_LOCKED: &str = r#"
UPDATE blocks
SET locked = 1, auto_locked_at = ?1
WHERE id = ?2
  AND auto_locked_at IS NULL
"#;

pub async fn mark_auto_locked(
    conn: &mut SqliteConnection,
    block_id: i64,
    now: NaiveDateTime,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_MARK_AUTO_LOCKED)
        .bind(now)
        .bind(block_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
