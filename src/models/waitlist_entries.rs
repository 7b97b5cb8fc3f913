use chrono::NaiveDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WaitlistEntriesRow {
    pub id: i64,
    pub user_id: i64,
    pub block_id: i64,
    pub scheduled_activity_id: i64,
    pub created_at: NaiveDateTime,
}
