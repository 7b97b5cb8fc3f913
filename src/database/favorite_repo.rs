use sqlx::SqliteConnection;

pub async fn is_favorite(conn: &mut SqliteConnection, user_id: i64, activity_id: i64) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM favorites WHERE user_id = ?1 AND activity_id = ?2 LIMIT 1")
        .bind(user_id)
        .bind(activity_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn insert_favorite(conn: &mut SqliteConnection, user_id: i64, activity_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("INSERT OR IGNORE INTO favorites (user_id, activity_id) VALUES (?1, ?2)")
        .bind(user_id)
        .bind(activity_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_favorite(conn: &mut SqliteConnection, user_id: i64, activity_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM favorites WHERE user_id = ?1 AND activity_id = ?2")
        .bind(user_id)
        .bind(activity_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_for_user(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM favorites WHERE user_id = ?1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected())
}
