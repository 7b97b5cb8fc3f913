use sqlx::{Row, SqliteConnection};

use crate::models::UsersRow;

pub const SQL_LOAD_USER: &str = r#"
SELECT
    id,
    username,
    display_name,
    role,
    graduation_year,
    grade,
    is_placeholder
FROM users
WHERE id = ?1
LIMIT 1
"#;

pub async fn load_user(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<Option<UsersRow>> {
    sqlx::query_as::<_, UsersRow>(SQL_LOAD_USER)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

const SQL_LIST_GROUP_IDS: &str = r#"
SELECT group_id
FROM user_groups
WHERE user_id = ?1
ORDER BY group_id
"#;

pub async fn list_group_ids(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<Vec<i64>> {
    let rows = sqlx::query(SQL_LIST_GROUP_IDS)
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("group_id")).collect())
}

const SQL_LOAD_PLACEHOLDER_ID: &str = r#"
SELECT id
FROM users
WHERE is_placeholder = 1
LIMIT 1
"#;

pub async fn load_placeholder_id(conn: &mut SqliteConnection) -> sqlx::Result<Option<i64>> {
    let row = sqlx::query(SQL_LOAD_PLACEHOLDER_ID)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn username_taken(conn: &mut SqliteConnection, username: &str) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 AS taken FROM users WHERE username = ?1 LIMIT 1")
        .bind(username)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

const SQL_INSERT_PLACEHOLDER: &str = r#"
INSERT INTO users (username, display_name, role, is_placeholder)
VALUES (?1, 'Deleted user', 'student', 1)
"#;

pub async fn insert_placeholder(conn: &mut SqliteConnection, username: &str) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_PLACEHOLDER)
        .bind(username)
        .execute(conn)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn delete_user(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
