use sqlx::SqlitePool;

// Statements are idempotent; `init` runs on every startup.
const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY,
  username TEXT NOT NULL UNIQUE,
  display_name TEXT,
  role TEXT NOT NULL DEFAULT 'student',
  graduation_year INTEGER,
  grade INTEGER,
  is_placeholder INTEGER NOT NULL DEFAULT 0,
  lock_version INTEGER NOT NULL DEFAULT 0
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS student_groups (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS user_groups (
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  group_id INTEGER NOT NULL REFERENCES student_groups(id) ON DELETE CASCADE,
  PRIMARY KEY (user_id, group_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS blocks (
  id INTEGER PRIMARY KEY,
  date TEXT NOT NULL,
  block_letter TEXT NOT NULL,
  locked INTEGER NOT NULL DEFAULT 0,
  signup_deadline TEXT,
  auto_locked_at TEXT,
  UNIQUE (date, block_letter)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS activities (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  default_capacity INTEGER,
  restricted INTEGER NOT NULL DEFAULT 0,
  presign INTEGER NOT NULL DEFAULT 0,
  one_a_day INTEGER NOT NULL DEFAULT 0,
  both_blocks INTEGER NOT NULL DEFAULT 0,
  sticky INTEGER NOT NULL DEFAULT 0,
  special INTEGER NOT NULL DEFAULT 0,
  administrative INTEGER NOT NULL DEFAULT 0,
  deleted INTEGER NOT NULL DEFAULT 0
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS activity_allowed_users (
  activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  PRIMARY KEY (activity_id, user_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS activity_allowed_groups (
  activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  group_id INTEGER NOT NULL REFERENCES student_groups(id) ON DELETE CASCADE,
  PRIMARY KEY (activity_id, group_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS activity_allowed_grades (
  activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  grade INTEGER NOT NULL,
  PRIMARY KEY (activity_id, grade)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS sponsors (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS rooms (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  capacity INTEGER NOT NULL DEFAULT 28
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS activity_sponsors (
  activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  sponsor_id INTEGER NOT NULL REFERENCES sponsors(id) ON DELETE CASCADE,
  PRIMARY KEY (activity_id, sponsor_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS scheduled_activities (
  id INTEGER PRIMARY KEY,
  block_id INTEGER NOT NULL REFERENCES blocks(id),
  activity_id INTEGER NOT NULL REFERENCES activities(id),
  capacity INTEGER,
  cancelled INTEGER NOT NULL DEFAULT 0,
  restricted INTEGER NOT NULL DEFAULT 0,
  sticky INTEGER NOT NULL DEFAULT 0,
  member_count INTEGER NOT NULL DEFAULT 0,
  archived_member_count INTEGER NOT NULL DEFAULT 0,
  lock_version INTEGER NOT NULL DEFAULT 0,
  UNIQUE (block_id, activity_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS scheduled_activity_sponsors (
  scheduled_activity_id INTEGER NOT NULL REFERENCES scheduled_activities(id) ON DELETE CASCADE,
  sponsor_id INTEGER NOT NULL REFERENCES sponsors(id) ON DELETE CASCADE,
  PRIMARY KEY (scheduled_activity_id, sponsor_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS scheduled_activity_rooms (
  scheduled_activity_id INTEGER NOT NULL REFERENCES scheduled_activities(id) ON DELETE CASCADE,
  room_id INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
  PRIMARY KEY (scheduled_activity_id, room_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS signups (
  id INTEGER PRIMARY KEY,
  user_id INTEGER NOT NULL REFERENCES users(id),
  block_id INTEGER NOT NULL REFERENCES blocks(id),
  scheduled_activity_id INTEGER NOT NULL REFERENCES scheduled_activities(id),
  created_at TEXT NOT NULL,
  after_deadline INTEGER NOT NULL DEFAULT 0,
  own_signup INTEGER NOT NULL DEFAULT 1,
  previous_activity_name TEXT,
  previous_activity_sponsors TEXT,
  UNIQUE (user_id, block_id)
)
"#,
    // At most one placeholder account.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_placeholder ON users (is_placeholder) WHERE is_placeholder = 1",
    "CREATE INDEX IF NOT EXISTS idx_signups_scheduled ON signups (scheduled_activity_id)",
    r#"
CREATE TABLE IF NOT EXISTS signup_archive (
  id INTEGER PRIMARY KEY,
  signup_id INTEGER NOT NULL,
  user_id INTEGER NOT NULL,
  original_user_id INTEGER NOT NULL,
  scheduled_activity_id INTEGER NOT NULL,
  block_id INTEGER NOT NULL,
  activity_name TEXT NOT NULL,
  sponsor_names TEXT NOT NULL,
  signed_up_at TEXT NOT NULL,
  after_deadline INTEGER NOT NULL,
  reason TEXT NOT NULL,
  archived_at TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS waitlist_entries (
  id INTEGER PRIMARY KEY,
  user_id INTEGER NOT NULL REFERENCES users(id),
  block_id INTEGER NOT NULL REFERENCES blocks(id),
  scheduled_activity_id INTEGER NOT NULL REFERENCES scheduled_activities(id),
  created_at TEXT NOT NULL,
  UNIQUE (user_id, scheduled_activity_id)
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_waitlist_queue ON waitlist_entries (scheduled_activity_id, created_at, id)",
    r#"
CREATE TABLE IF NOT EXISTS favorites (
  user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
  activity_id INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  PRIMARY KEY (user_id, activity_id)
)
"#,
];

pub async fn init(pool: &SqlitePool) -> sqlx::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
