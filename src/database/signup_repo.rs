use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Row, SqliteConnection};

use crate::models::{SignupDetailRow, SignupsRow};

const SQL_SIGNUP_DETAIL_COLUMNS: &str = r#"
SELECT
  s.id,
  s.user_id,
  s.block_id,
  s.scheduled_activity_id,
  s.created_at,
  s.after_deadline,
  sa.activity_id,
  a.name AS activity_name,
  b.date AS block_date,
  (sa.sticky OR a.sticky) AS sticky,
  a.one_a_day,
  a.both_blocks
FROM signups s
JOIN scheduled_activities sa ON sa.id = s.scheduled_activity_id
JOIN activities a ON a.id = sa.activity_id
JOIN blocks b ON b.id = s.block_id
"#;

pub async fn load_in_block(
    conn: &mut SqliteConnection,
    user_id: i64,
    block_id: i64,
) -> sqlx::Result<Option<SignupDetailRow>> {
    let sql = format!("{SQL_SIGNUP_DETAIL_COLUMNS} WHERE s.user_id = ?1 AND s.block_id = ?2 LIMIT 1");
    sqlx::query_as::<_, SignupDetailRow>(&sql)
        .bind(user_id)
        .bind(block_id)
        .fetch_optional(conn)
        .await
}

pub async fn list_on_date(
    conn: &mut SqliteConnection,
    user_id: i64,
    date: NaiveDate,
) -> sqlx::Result<Vec<SignupDetailRow>> {
    let sql = format!(
        "{SQL_SIGNUP_DETAIL_COLUMNS} WHERE s.user_id = ?1 AND b.date = ?2 ORDER BY b.block_letter"
    );
    sqlx::query_as::<_, SignupDetailRow>(&sql)
        .bind(user_id)
        .bind(date)
        .fetch_all(conn)
        .await
}

pub async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> sqlx::Result<Vec<SignupDetailRow>> {
    let sql = format!("{SQL_SIGNUP_DETAIL_COLUMNS} WHERE s.user_id = ?1 ORDER BY b.date, b.block_letter");
    sqlx::query_as::<_, SignupDetailRow>(&sql)
        .bind(user_id)
        .fetch_all(conn)
        .await
}

const SQL_LIST_USER_IDS_FOR_SCHEDULED: &str = r#"
SELECT user_id
FROM signups
WHERE scheduled_activity_id = ?1
ORDER BY created_at, id
"#;

pub async fn list_user_ids_for_scheduled(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<Vec<i64>> {
    let rows = sqlx::query(SQL_LIST_USER_IDS_FOR_SCHEDULED)
        .bind(scheduled_activity_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
}

pub async fn load_signup(conn: &mut SqliteConnection, signup_id: i64) -> sqlx::Result<Option<SignupsRow>> {
    sqlx::query_as::<_, SignupsRow>(
        r#"
SELECT
  id,
  user_id,
  block_id,
  scheduled_activity_id,
  created_at,
  after_deadline,
  own_signup,
  previous_activity_name,
  previous_activity_sponsors
FROM signups
WHERE id = ?1
LIMIT 1
        "#,
    )
    .bind(signup_id)
    .fetch_optional(conn)
    .await
}

pub struct NewSignup<'a> {
    pub user_id: i64,
    pub block_id: i64,
    pub scheduled_activity_id: i64,
    pub created_at: NaiveDateTime,
    pub after_deadline: bool,
    pub own_signup: bool,
    pub previous_activity_name: Option<&'a str>,
    pub previous_activity_sponsors: Option<&'a str>,
}

const SQL_INSERT_SIGNUP: &str = r#"
INSERT INTO signups (
  user_id,
  block_id,
  scheduled_activity_id,
  created_at,
  after_deadline,
  own_signup,
  previous_activity_name,
  previous_activity_sponsors
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

pub async fn insert_signup(conn: &mut SqliteConnection, signup: NewSignup<'_>) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_SIGNUP)
        .bind(signup.user_id)
        .bind(signup.block_id)
        .bind(signup.scheduled_activity_id)
        .bind(signup.created_at)
        .bind(signup.after_deadline)
        .bind(signup.own_signup)
        .bind(signup.previous_activity_name)
        .bind(signup.previous_activity_sponsors)
        .execute(conn)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn delete_signup(conn: &mut SqliteConnection, signup_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM signups WHERE id = ?1")
        .bind(signup_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
