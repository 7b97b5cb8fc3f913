use chrono::NaiveDateTime;
use tracing::info;

use crate::database::scheduled_activity_repo;
use crate::error::{AppError, AppResult};
use crate::services::block_lock_service::{self, BlockLockEvent, BlockLockState};
use crate::services::signup_service::SignupEngine;

pub async fn lock_block(engine: &SignupEngine, actor_id: i64, block_id: i64) -> AppResult<BlockLockState> {
    engine.require_admin(actor_id).await?;
    block_lock_service::set_block_lock(engine.pool(), block_id, BlockLockEvent::AdminLock).await
}

pub async fn unlock_block(engine: &SignupEngine, actor_id: i64, block_id: i64) -> AppResult<BlockLockState> {
    engine.require_admin(actor_id).await?;
    block_lock_service::set_block_lock(engine.pool(), block_id, BlockLockEvent::AdminUnlock).await
}

/// Cancelled activities keep their members but lose their queue.
pub async fn set_cancelled(
    engine: &SignupEngine,
    actor_id: i64,
    scheduled_activity_id: i64,
    cancelled: bool,
) -> AppResult<()> {
    engine.require_admin(actor_id).await?;
    let updated = {
        let mut conn = engine.pool().acquire().await?;
        scheduled_activity_repo::set_cancelled(&mut conn, scheduled_activity_id, cancelled).await?
    };
    if updated == 0 {
        return Err(AppError::NotFound("scheduled activity"));
    }
    if cancelled {
        let dropped = engine.ledger.drop_waitlist(scheduled_activity_id).await?;
        info!(scheduled_activity_id, dropped, "scheduled activity cancelled");
    } else {
        info!(scheduled_activity_id, "scheduled activity reinstated");
    }
    Ok(())
}

/// `None` clears the override and falls back to the activity default.
pub async fn set_capacity(
    engine: &SignupEngine,
    actor_id: i64,
    scheduled_activity_id: i64,
    capacity: Option<i64>,
    now: NaiveDateTime,
) -> AppResult<()> {
    engine.require_admin(actor_id).await?;
    if capacity.is_some_and(|c| c < 0) {
        return Err(AppError::MalformedPayload);
    }
    let updated = {
        let mut conn = engine.pool().acquire().await?;
        scheduled_activity_repo::set_capacity(&mut conn, scheduled_activity_id, capacity).await?
    };
    if updated == 0 {
        return Err(AppError::NotFound("scheduled activity"));
    }
    info!(scheduled_activity_id, ?capacity, "capacity changed");
    engine.promote_freed(vec![scheduled_activity_id], now).await;
    Ok(())
}
