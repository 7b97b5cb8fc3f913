use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlocksRow {
    pub id: i64,
    pub date: NaiveDate,
    pub block_letter: String,
    pub locked: bool,
    pub signup_deadline: Option<NaiveDateTime>,
    pub auto_locked_at: Option<NaiveDateTime>,
}

impl BlocksRow {
    pub fn label(&self) -> String {
        format!("{} ({})", self.date.format("%a %b %-d"), self.block_letter)
    }

    pub fn deadline_passed(&self, now: NaiveDateTime) -> bool {
        self.signup_deadline.is_some_and(|deadline| now >= deadline)
    }
}
