use chrono::NaiveDateTime;
use sqlx::SqliteConnection;

use crate::models::SignupArchiveRow;

pub struct NewArchiveEntry<'a> {
    pub signup_id: i64,
    pub user_id: i64,
    pub scheduled_activity_id: i64,
    pub block_id: i64,
    pub activity_name: &'a str,
    pub sponsor_names: &'a str,
    pub signed_up_at: NaiveDateTime,
    pub after_deadline: bool,
    pub reason: &'a str,
    pub archived_at: NaiveDateTime,
}

const SQL_INSERT_ARCHIVE_ENTRY: &str = r#"
INSERT INTO signup_archive (
  signup_id,
  user_id,
  original_user_id,
  scheduled_activity_id,
  block_id,
  activity_name,
  sponsor_names,
  signed_up_at,
  after_deadline,
  reason,
  archived_at
) VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#;

pub async fn insert_entry(conn: &mut SqliteConnection, entry: NewArchiveEntry<'_>) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_ARCHIVE_ENTRY)
        .bind(entry.signup_id)
        .bind(entry.user_id)
        .bind(entry.scheduled_activity_id)
        .bind(entry.block_id)
        .bind(entry.activity_name)
        .bind(entry.sponsor_names)
        .bind(entry.signed_up_at)
        .bind(entry.after_deadline)
        .bind(entry.reason)
        .bind(entry.archived_at)
        .execute(conn)
        .await?;
    Ok(res.last_insert_rowid())
}

// `original_user_id` is never rewritten.
pub async fn reassign_user(conn: &mut SqliteConnection, from_user_id: i64, to_user_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE signup_archive SET user_id = ?1 WHERE user_id = ?2")
        .bind(to_user_id)
        .bind(from_user_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list_for_scheduled(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<Vec<SignupArchiveRow>> {
    sqlx::query_as::<_, SignupArchiveRow>(
        r#"
SELECT
  id,
  signup_id,
  user_id,
  original_user_id,
  scheduled_activity_id,
  block_id,
  activity_name,
  sponsor_names,
  signed_up_at,
  after_deadline,
  reason,
  archived_at
FROM signup_archive
WHERE scheduled_activity_id = ?1
ORDER BY archived_at, id
        "#,
    )
    .bind(scheduled_activity_id)
    .fetch_all(conn)
    .await
}
