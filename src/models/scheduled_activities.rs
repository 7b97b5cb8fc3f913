use chrono::NaiveDate;

// Scheduled activity joined with its block date and parent activity flags.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledActivitiesRow {
    pub id: i64,
    pub block_id: i64,
    pub activity_id: i64,
    pub capacity: Option<i64>,
    pub cancelled: bool,
    pub restricted: bool,
    pub sticky: bool,
    pub member_count: i64,
    pub archived_member_count: i64,
    pub room_capacity: Option<i64>,
    pub block_date: NaiveDate,
    pub block_letter: String,
    pub activity_name: String,
    pub default_capacity: Option<i64>,
    pub activity_restricted: bool,
    pub presign: bool,
    pub one_a_day: bool,
    pub both_blocks: bool,
    pub activity_sticky: bool,
    pub special: bool,
    pub administrative: bool,
    pub activity_deleted: bool,
}

impl ScheduledActivitiesRow {
    /// `None` means unlimited.
    pub fn effective_capacity(&self) -> Option<i64> {
        self.capacity
            .or(self.default_capacity)
            .or(self.room_capacity)
    }

    pub fn is_full(&self) -> bool {
        self.effective_capacity()
            .is_some_and(|cap| self.member_count >= cap)
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted || self.activity_restricted
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky || self.activity_sticky
    }

    pub fn capacity_label(&self) -> String {
        match self.effective_capacity() {
            Some(cap) => format!("{}/{}", self.member_count, cap),
            None => format!("{}/unlimited", self.member_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(capacity: Option<i64>, default: Option<i64>, rooms: Option<i64>) -> ScheduledActivitiesRow {
        ScheduledActivitiesRow {
            id: 1,
            block_id: 1,
            activity_id: 1,
            capacity,
            cancelled: false,
            restricted: false,
            sticky: false,
            member_count: 3,
            archived_member_count: 0,
            room_capacity: rooms,
            block_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            block_letter: "A".to_string(),
            activity_name: "Chess".to_string(),
            default_capacity: default,
            activity_restricted: false,
            presign: false,
            one_a_day: false,
            both_blocks: false,
            activity_sticky: false,
            special: false,
            administrative: false,
            activity_deleted: false,
        }
    }

    #[test]
    fn capacity_falls_back_through_activity_then_rooms() {
        assert_eq!(row(Some(5), Some(10), Some(30)).effective_capacity(), Some(5));
        assert_eq!(row(None, Some(10), Some(30)).effective_capacity(), Some(10));
        assert_eq!(row(None, None, Some(30)).effective_capacity(), Some(30));
        assert_eq!(row(None, None, None).effective_capacity(), None);
    }

    #[test]
    fn unlimited_is_never_full() {
        assert!(!row(None, None, None).is_full());
        assert!(row(Some(3), None, None).is_full());
        assert!(!row(Some(4), None, None).is_full());
    }
}
