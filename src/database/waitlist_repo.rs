use chrono::NaiveDateTime;
use sqlx::{Row, SqliteConnection};

use crate::models::WaitlistEntriesRow;

const SQL_WAITLIST_COLUMNS: &str = r#"
SELECT
  id,
  user_id,
  block_id,
  scheduled_activity_id,
  created_at
FROM waitlist_entries
"#;

const SQL_INSERT_ENTRY: &str = r#"
INSERT OR IGNORE INTO waitlist_entries (
  user_id,
  block_id,
  scheduled_activity_id,
  created_at
) VALUES (?1, ?2, ?3, ?4)
"#;

pub async fn insert_entry(
    conn: &mut SqliteConnection,
    user_id: i64,
    block_id: i64,
    scheduled_activity_id: i64,
    created_at: NaiveDateTime,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_INSERT_ENTRY)
        .bind(user_id)
        .bind(block_id)
        .bind(scheduled_activity_id)
        .bind(created_at)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

/// Head of the FIFO queue for one scheduled activity.
pub async fn head(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<Option<WaitlistEntriesRow>> {
    let sql = format!(
        "{SQL_WAITLIST_COLUMNS} WHERE scheduled_activity_id = ?1 ORDER BY created_at, id LIMIT 1"
    );
    sqlx::query_as::<_, WaitlistEntriesRow>(&sql)
        .bind(scheduled_activity_id)
        .fetch_optional(conn)
        .await
}

pub async fn list_for_scheduled(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<Vec<WaitlistEntriesRow>> {
    let sql = format!("{SQL_WAITLIST_COLUMNS} WHERE scheduled_activity_id = ?1 ORDER BY created_at, id");
    sqlx::query_as::<_, WaitlistEntriesRow>(&sql)
        .bind(scheduled_activity_id)
        .fetch_all(conn)
        .await
}

const SQL_POSITION: &str = r#"
SELECT COUNT(*) AS position
FROM waitlist_entries w
JOIN waitlist_entries me
  ON me.scheduled_activity_id = w.scheduled_activity_id
 AND me.user_id = ?1
WHERE w.scheduled_activity_id = ?2
  AND (w.created_at < me.created_at OR (w.created_at = me.created_at AND w.id <= me.id))
"#;

/// 1-based queue position, `None` when the user is not waiting.
pub async fn position(
    conn: &mut SqliteConnection,
    user_id: i64,
    scheduled_activity_id: i64,
) -> sqlx::Result<Option<i64>> {
    let row = sqlx::query(SQL_POSITION)
        .bind(user_id)
        .bind(scheduled_activity_id)
        .fetch_one(conn)
        .await?;
    let position: i64 = row.get("position");
    Ok((position > 0).then_some(position))
}

pub async fn delete_entry(
    conn: &mut SqliteConnection,
    user_id: i64,
    scheduled_activity_id: i64,
) -> sqlx::Result<u64> {
    let res = sqlx::query(
        "DELETE FROM waitlist_entries WHERE user_id = ?1 AND scheduled_activity_id = ?2",
    )
    .bind(user_id)
    .bind(scheduled_activity_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

pub async fn delete_for_user_in_block(
    conn: &mut SqliteConnection,
    user_id: i64,
    block_id: i64,
) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM waitlist_entries WHERE user_id = ?1 AND block_id = ?2")
        .bind(user_id)
        .bind(block_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_for_scheduled(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM waitlist_entries WHERE scheduled_activity_id = ?1")
        .bind(scheduled_activity_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_for_user(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM waitlist_entries WHERE user_id = ?1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

const SQL_SCHEDULED_IDS_FOR_USER_IN_BLOCK: &str = r#"
SELECT scheduled_activity_id
FROM waitlist_entries
WHERE user_id = ?1
  AND block_id = ?2
"#;

pub async fn scheduled_ids_for_user_in_block(
    conn: &mut SqliteConnection,
    user_id: i64,
    block_id: i64,
) -> sqlx::Result<Vec<i64>> {
    let rows = sqlx::query(SQL_SCHEDULED_IDS_FOR_USER_IN_BLOCK)
        .bind(user_id)
        .bind(block_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("scheduled_activity_id")).collect())
}
