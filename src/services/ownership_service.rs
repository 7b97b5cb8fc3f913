//! Deleting users and activities without losing history.
//!
//! Live signups always leave through the ledger, so counters and archive
//! snapshots stay consistent. Archive rows of a deleted user are handed to a
//! placeholder account; `original_user_id` keeps the old id.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::database::{activity_repo, archive_repo, favorite_repo, scheduled_activity_repo, signup_repo, user_repo};
use crate::error::{AppError, AppResult};
use crate::services::archive_service::ArchiveReason;
use crate::services::capacity_ledger::{ReleaseReport, ReleaseRequest};
use crate::services::signup_context;
use crate::services::signup_service::SignupEngine;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserDeletion {
    pub released_signups: usize,
    pub reassigned_archive_rows: u64,
    pub placeholder_user_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivityDeletion {
    pub released_signups: usize,
    pub dropped_waitlist_entries: u64,
}

/// Remove a user in one transaction. The user row and every scheduled
/// activity they hold a seat in stay locked from the first release to the
/// final delete, so no signup can land in between.
pub async fn delete_user(
    engine: &SignupEngine,
    actor_id: i64,
    user_id: i64,
    now: NaiveDateTime,
) -> AppResult<UserDeletion> {
    engine.require_admin(actor_id).await?;
    let user = {
        let mut conn = engine.pool().acquire().await?;
        signup_context::load_user(&mut conn, user_id).await?
    };
    if user.is_placeholder {
        return Err(AppError::Forbidden);
    }

    let mut locked = engine.ledger.lock_user(user_id).await?;
    if user_repo::load_user(locked.conn(), user_id).await?.is_none() {
        return Err(AppError::NotFound("user"));
    }
    let placeholder = resolve_placeholder(locked.conn(), &engine.config().placeholder_username).await?;
    let freed = locked.release_all(ArchiveReason::UserDeleted, now).await?;
    favorite_repo::delete_for_user(locked.conn(), user_id).await?;
    let reassigned = archive_repo::reassign_user(locked.conn(), user_id, placeholder).await?;
    user_repo::delete_user(locked.conn(), user_id).await?;
    locked.commit().await?;

    let released = freed.len();
    info!(
        user_id,
        released,
        reassigned,
        placeholder_user_id = placeholder,
        "user deleted"
    );
    engine.promote_freed(freed, now).await;

    Ok(UserDeletion {
        released_signups: released,
        reassigned_archive_rows: reassigned,
        placeholder_user_id: placeholder,
    })
}

// The placeholder is the one account flagged `is_placeholder`. Its username
// is only used to create it, and never to claim a real account.
async fn resolve_placeholder(conn: &mut SqliteConnection, username: &str) -> AppResult<i64> {
    if let Some(id) = user_repo::load_placeholder_id(conn).await? {
        return Ok(id);
    }
    if user_repo::username_taken(conn, username).await? {
        warn!(username, "placeholder username belongs to a real account");
        return Err(AppError::Conflict(format!(
            "username {username:?} is reserved for deleted users but belongs to an account"
        )));
    }
    Ok(user_repo::insert_placeholder(conn, username).await?)
}

/// Soft-delete an activity. Signups in today's and later blocks are released;
/// earlier ones stay as history.
pub async fn delete_activity(
    engine: &SignupEngine,
    actor_id: i64,
    activity_id: i64,
    now: NaiveDateTime,
) -> AppResult<ActivityDeletion> {
    engine.require_admin(actor_id).await?;
    let upcoming: Vec<(i64, Vec<i64>)> = {
        let mut conn = engine.pool().acquire().await?;
        activity_repo::load_activity(&mut conn, activity_id)
            .await?
            .ok_or(AppError::NotFound("activity"))?;
        activity_repo::soft_delete(&mut conn, activity_id).await?;

        let mut upcoming = Vec::new();
        for sa_id in scheduled_activity_repo::list_ids_for_activity_from(&mut conn, activity_id, now.date()).await? {
            let members = signup_repo::list_user_ids_for_scheduled(&mut conn, sa_id).await?;
            upcoming.push((sa_id, members));
        }
        upcoming
    };

    let mut result = ActivityDeletion::default();
    for (sa_id, members) in upcoming {
        result.dropped_waitlist_entries += engine.ledger.drop_waitlist(sa_id).await?;
        let block_id = {
            let mut conn = engine.pool().acquire().await?;
            scheduled_activity_repo::load_by_id(&mut conn, sa_id)
                .await?
                .ok_or(AppError::NotFound("scheduled activity"))?
                .block_id
        };
        for user_id in members {
            let req = ReleaseRequest {
                user_id,
                block_id,
                only_scheduled_activity_id: Some(sa_id),
                force: true,
                reason: ArchiveReason::ActivityDeleted,
                now,
            };
            if let ReleaseReport::Released { freed } = engine.ledger.release(&req).await? {
                result.released_signups += freed.len();
                // Other halves of both-blocks signups were in this activity
                // too, so nothing freed here is worth promoting into.
            }
        }
    }

    info!(
        activity_id,
        released = result.released_signups,
        dropped = result.dropped_waitlist_entries,
        "activity deleted"
    );
    Ok(result)
}
