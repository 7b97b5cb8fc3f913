#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivitiesRow {
    pub id: i64,
    pub name: String,
    pub default_capacity: Option<i64>,
    pub restricted: bool,
    pub presign: bool,
    pub one_a_day: bool,
    pub both_blocks: bool,
    pub sticky: bool,
    pub special: bool,
    pub administrative: bool,
    pub deleted: bool,
}

/// Who may join a restricted activity. Membership in any one list is enough.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    pub user_ids: Vec<i64>,
    pub group_ids: Vec<i64>,
    pub grades: Vec<i64>,
}

impl AllowList {
    pub fn admits(&self, user_id: i64, group_ids: &[i64], grade: Option<i64>) -> bool {
        self.user_ids.contains(&user_id)
            || group_ids.iter().any(|g| self.group_ids.contains(g))
            || grade.is_some_and(|g| self.grades.contains(&g))
    }
}
