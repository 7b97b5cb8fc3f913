use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};

use crate::models::ScheduledActivitiesRow;

const SQL_SCHEDULED_COLUMNS: &str = r#"
SELECT
  sa.id,
  sa.block_id,
  sa.activity_id,
  sa.capacity,
  sa.cancelled,
  sa.restricted,
  sa.sticky,
  sa.member_count,
  sa.archived_member_count,
  (
    SELECT SUM(r.capacity)
    FROM scheduled_activity_rooms sar
    JOIN rooms r ON r.id = sar.room_id
    WHERE sar.scheduled_activity_id = sa.id
  ) AS room_capacity,
  b.date AS block_date,
  b.block_letter,
  a.name AS activity_name,
  a.default_capacity,
  a.restricted AS activity_restricted,
  a.presign,
  a.one_a_day,
  a.both_blocks,
  a.sticky AS activity_sticky,
  a.special,
  a.administrative,
  a.deleted AS activity_deleted
FROM scheduled_activities sa
JOIN blocks b ON b.id = sa.block_id
JOIN activities a ON a.id = sa.activity_id
"#;

pub async fn load_by_id(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<Option<ScheduledActivitiesRow>> {
    let sql = format!("{SQL_SCHEDULED_COLUMNS} WHERE sa.id = ?1 LIMIT 1");
    sqlx::query_as::<_, ScheduledActivitiesRow>(&sql)
        .bind(scheduled_activity_id)
        .fetch_optional(conn)
        .await
}

pub async fn load_for_block(
    conn: &mut SqliteConnection,
    block_id: i64,
    activity_id: i64,
) -> sqlx::Result<Option<ScheduledActivitiesRow>> {
    let sql = format!("{SQL_SCHEDULED_COLUMNS} WHERE sa.block_id = ?1 AND sa.activity_id = ?2 LIMIT 1");
    sqlx::query_as::<_, ScheduledActivitiesRow>(&sql)
        .bind(block_id)
        .bind(activity_id)
        .fetch_optional(conn)
        .await
}

/// The other half of a both-blocks activity: same activity, same day,
/// different block.
pub async fn find_sibling(
    conn: &mut SqliteConnection,
    activity_id: i64,
    date: NaiveDate,
    exclude_block_id: i64,
) -> sqlx::Result<Option<ScheduledActivitiesRow>> {
    let sql = format!(
        "{SQL_SCHEDULED_COLUMNS} WHERE sa.activity_id = ?1 AND b.date = ?2 AND sa.block_id != ?3 ORDER BY b.block_letter LIMIT 1"
    );
    sqlx::query_as::<_, ScheduledActivitiesRow>(&sql)
        .bind(activity_id)
        .bind(date)
        .bind(exclude_block_id)
        .fetch_optional(conn)
        .await
}

const SQL_LIST_FOR_ACTIVITY_FROM: &str = r#"
SELECT sa.id
FROM scheduled_activities sa
JOIN blocks b ON b.id = sa.block_id
WHERE sa.activity_id = ?1
  AND b.date >= ?2
ORDER BY b.date, b.block_letter
"#;

pub async fn list_ids_for_activity_from(
    conn: &mut SqliteConnection,
    activity_id: i64,
    from: NaiveDate,
) -> sqlx::Result<Vec<i64>> {
    let rows = sqlx::query(SQL_LIST_FOR_ACTIVITY_FROM)
        .bind(activity_id)
        .bind(from)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("id")).collect())
}

pub async fn increment_members(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE scheduled_activities SET member_count = member_count + 1 WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn decrement_members(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(
        "UPDATE scheduled_activities SET member_count = MAX(member_count - 1, 0) WHERE id = ?1",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

pub async fn increment_archived(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(
        "UPDATE scheduled_activities SET archived_member_count = archived_member_count + 1 WHERE id = ?1",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected())
}

pub async fn set_cancelled(conn: &mut SqliteConnection, id: i64, cancelled: bool) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE scheduled_activities SET cancelled = ?1 WHERE id = ?2")
        .bind(cancelled)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn set_capacity(
    conn: &mut SqliteConnection,
    id: i64,
    capacity: Option<i64>,
) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE scheduled_activities SET capacity = ?1 WHERE id = ?2")
        .bind(capacity)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

// Scheduled sponsors win; otherwise the activity's default sponsors.
const SQL_SPONSOR_NAMES: &str = r#"
SELECT s.name
FROM scheduled_activity_sponsors sas
JOIN sponsors s ON s.id = sas.sponsor_id
WHERE sas.scheduled_activity_id = ?1
UNION ALL
SELECT s.name
FROM activity_sponsors asp
JOIN sponsors s ON s.id = asp.sponsor_id
JOIN scheduled_activities sa ON sa.activity_id = asp.activity_id
WHERE sa.id = ?1
  AND NOT EXISTS (
    SELECT 1 FROM scheduled_activity_sponsors x WHERE x.scheduled_activity_id = ?1
  )
ORDER BY 1
"#;

pub async fn sponsor_names(
    conn: &mut SqliteConnection,
    scheduled_activity_id: i64,
) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query(SQL_SPONSOR_NAMES)
        .bind(scheduled_activity_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("name")).collect())
}
