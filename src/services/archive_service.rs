use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use tracing::warn;

use crate::database::{archive_repo, scheduled_activity_repo};
use crate::models::SignupDetailRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveReason {
    Switched,
    Unsignup,
    Removed,
    UserDeleted,
    ActivityDeleted,
}

impl ArchiveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveReason::Switched => "switched",
            ArchiveReason::Unsignup => "unsignup",
            ArchiveReason::Removed => "removed",
            ArchiveReason::UserDeleted => "user_deleted",
            ArchiveReason::ActivityDeleted => "activity_deleted",
        }
    }
}

/// What a replacement signup remembers about the one it replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousSignup {
    pub activity_name: String,
    pub sponsor_names: String,
}

/// Snapshot a signup that is about to be deleted. Runs inside the ledger's
/// transaction and never fails it: store errors are logged and skipped.
pub async fn record_removal(
    conn: &mut SqliteConnection,
    signup: &SignupDetailRow,
    reason: ArchiveReason,
    now: NaiveDateTime,
) -> PreviousSignup {
    let sponsor_names = match scheduled_activity_repo::sponsor_names(conn, signup.scheduled_activity_id).await {
        Ok(names) => names.join(", "),
        Err(e) => {
            warn!(signup_id = signup.id, error = %e, "sponsor lookup for archive failed");
            String::new()
        }
    };

    let entry = archive_repo::NewArchiveEntry {
        signup_id: signup.id,
        user_id: signup.user_id,
        scheduled_activity_id: signup.scheduled_activity_id,
        block_id: signup.block_id,
        activity_name: &signup.activity_name,
        sponsor_names: &sponsor_names,
        signed_up_at: signup.created_at,
        after_deadline: signup.after_deadline,
        reason: reason.as_str(),
        archived_at: now,
    };
    if let Err(e) = archive_repo::insert_entry(conn, entry).await {
        warn!(signup_id = signup.id, error = %e, "signup archive insert failed");
    }

    // Past blocks keep their headcount even though the live row goes away.
    if signup.block_date < now.date() {
        if let Err(e) =
            scheduled_activity_repo::increment_archived(conn, signup.scheduled_activity_id).await
        {
            warn!(
                scheduled_activity_id = signup.scheduled_activity_id,
                error = %e,
                "archived member count update failed"
            );
        }
    }

    PreviousSignup {
        activity_name: signup.activity_name.clone(),
        sponsor_names,
    }
}
