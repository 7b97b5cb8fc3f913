//! Loads the snapshots the rule catalog evaluates. Deadline locks are applied
//! here, so every rule sees the block as it stands right now.

use chrono::NaiveDateTime;
use sqlx::SqliteConnection;

use crate::database::{activity_repo, block_repo, scheduled_activity_repo, signup_repo, user_repo};
use crate::error::{AppError, AppResult};
use crate::models::{BlocksRow, UsersRow};
use crate::services::block_lock_service;
use crate::services::rules::{RemovalContext, SiblingContext, SignupContext};

#[derive(Debug, Clone, Copy)]
pub struct ContextRequest {
    pub actor_id: i64,
    pub user_id: i64,
    pub block_id: i64,
    pub force: bool,
    pub now: NaiveDateTime,
}

pub async fn load_user(conn: &mut SqliteConnection, user_id: i64) -> AppResult<UsersRow> {
    user_repo::load_user(conn, user_id)
        .await?
        .ok_or(AppError::NotFound("user"))
}

pub async fn load_block(conn: &mut SqliteConnection, block_id: i64, now: NaiveDateTime) -> AppResult<BlocksRow> {
    let block = block_repo::load_block(conn, block_id)
        .await?
        .ok_or(AppError::NotFound("block"))?;
    Ok(block_lock_service::sync_deadline(conn, block, now).await?)
}

pub async fn load_signup_context(
    conn: &mut SqliteConnection,
    req: ContextRequest,
    activity_id: i64,
) -> AppResult<SignupContext> {
    let actor = load_user(conn, req.actor_id).await?;
    let user = if req.user_id == req.actor_id {
        actor.clone()
    } else {
        load_user(conn, req.user_id).await?
    };
    let block = load_block(conn, req.block_id, req.now).await?;
    let target = scheduled_activity_repo::load_for_block(conn, block.id, activity_id)
        .await?
        .ok_or(AppError::NotFound("scheduled activity"))?;
    let allow_list = activity_repo::load_allow_list(conn, activity_id).await?;
    let user_group_ids = user_repo::list_group_ids(conn, user.id).await?;
    let current = signup_repo::load_in_block(conn, user.id, block.id).await?;

    let sibling = if target.both_blocks {
        match scheduled_activity_repo::find_sibling(conn, activity_id, block.date, block.id).await? {
            Some(scheduled) => {
                let sibling_block = load_block(conn, scheduled.block_id, req.now).await?;
                let current = signup_repo::load_in_block(conn, user.id, sibling_block.id).await?;
                Some(SiblingContext {
                    block: sibling_block,
                    scheduled,
                    current,
                })
            }
            None => None,
        }
    } else {
        None
    };

    let same_day = signup_repo::list_on_date(conn, user.id, block.date).await?;
    let force = req.force && actor.is_admin();

    Ok(SignupContext {
        actor,
        user,
        user_group_ids,
        block,
        target,
        allow_list,
        current,
        sibling,
        same_day,
        today: req.now.date(),
        force,
    })
}

/// `None` when the user holds nothing in the block.
pub async fn load_removal_context(
    conn: &mut SqliteConnection,
    req: ContextRequest,
) -> AppResult<Option<RemovalContext>> {
    let actor = load_user(conn, req.actor_id).await?;
    let user = if req.user_id == req.actor_id {
        actor.clone()
    } else {
        load_user(conn, req.user_id).await?
    };
    let block = load_block(conn, req.block_id, req.now).await?;
    let Some(current) = signup_repo::load_in_block(conn, user.id, block.id).await? else {
        return Ok(None);
    };

    let mut sibling_block = None;
    if current.both_blocks {
        let other_half = signup_repo::list_on_date(conn, user.id, current.block_date)
            .await?
            .into_iter()
            .find(|s| s.activity_id == current.activity_id && s.block_id != current.block_id);
        if let Some(half) = other_half {
            sibling_block = Some(load_block(conn, half.block_id, req.now).await?);
        }
    }

    let force = req.force && actor.is_admin();
    Ok(Some(RemovalContext {
        actor,
        user,
        block,
        current,
        sibling_block,
        force,
    }))
}
