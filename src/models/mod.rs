pub mod activities;
pub mod blocks;
pub mod scheduled_activities;
pub mod signups;
pub mod users;
pub mod waitlist_entries;

pub use activities::{ActivitiesRow, AllowList};
pub use blocks::BlocksRow;
pub use scheduled_activities::ScheduledActivitiesRow;
pub use signups::{SignupArchiveRow, SignupDetailRow, SignupsRow};
pub use users::{Role, UsersRow};
pub use waitlist_entries::WaitlistEntriesRow;
