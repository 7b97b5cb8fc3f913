use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignupsRow {
    pub id: i64,
    pub user_id: i64,
    pub block_id: i64,
    pub scheduled_activity_id: i64,
    pub created_at: NaiveDateTime,
    pub after_deadline: bool,
    pub own_signup: bool,
    pub previous_activity_name: Option<String>,
    pub previous_activity_sponsors: Option<String>,
}

// Signup joined with the activity flags the rules care about.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignupDetailRow {
    pub id: i64,
    pub user_id: i64,
    pub block_id: i64,
    pub scheduled_activity_id: i64,
    pub created_at: NaiveDateTime,
    pub after_deadline: bool,
    pub activity_id: i64,
    pub activity_name: String,
    pub block_date: NaiveDate,
    pub sticky: bool,
    pub one_a_day: bool,
    pub both_blocks: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignupArchiveRow {
    pub id: i64,
    pub signup_id: i64,
    pub user_id: i64,
    pub original_user_id: i64,
    pub scheduled_activity_id: i64,
    pub block_id: i64,
    pub activity_name: String,
    pub sponsor_names: String,
    pub signed_up_at: NaiveDateTime,
    pub after_deadline: bool,
    pub reason: String,
    pub archived_at: NaiveDateTime,
}
