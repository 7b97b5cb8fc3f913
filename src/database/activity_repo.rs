use sqlx::{Row, SqliteConnection};

use crate::models::{ActivitiesRow, AllowList};

const SQL_LOAD_ACTIVITY_BY_ID: &str = r#"
SELECT
  id,
  name,
  default_capacity,
  restricted,
  presign,
  one_a_day,
  both_blocks,
  sticky,
  special,
  administrative,
  deleted
FROM activities
WHERE id = ?1
LIMIT 1
"#;

pub async fn load_activity(
    conn: &mut SqliteConnection,
    activity_id: i64,
) -> sqlx::Result<Option<ActivitiesRow>> {
    sqlx::query_as::<_, ActivitiesRow>(SQL_LOAD_ACTIVITY_BY_ID)
        .bind(activity_id)
        .fetch_optional(conn)
        .await
}

pub async fn load_allow_list(
    conn: &mut SqliteConnection,
    activity_id: i64,
) -> sqlx::Result<AllowList> {
    let user_ids = sqlx::query("SELECT user_id FROM activity_allowed_users WHERE activity_id = ?1")
        .bind(activity_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|r| r.get("user_id"))
        .collect();
    let group_ids =
        sqlx::query("SELECT group_id FROM activity_allowed_groups WHERE activity_id = ?1")
            .bind(activity_id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(|r| r.get("group_id"))
            .collect();
    let grades = sqlx::query("SELECT grade FROM activity_allowed_grades WHERE activity_id = ?1")
        .bind(activity_id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|r| r.get("grade"))
        .collect();

    Ok(AllowList {
        user_ids,
        group_ids,
        grades,
    })
}

const SQL_SOFT_DELETE: &str = r#"
UPDATE activities
SET deleted = 1
WHERE id = ?1
  AND deleted = 0
"#;

pub async fn soft_delete(conn: &mut SqliteConnection, activity_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SOFT_DELETE)
        .bind(activity_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
