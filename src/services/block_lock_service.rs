use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::database::block_repo;
use crate::error::{AppError, AppResult};
use crate::models::BlocksRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLockState {
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLockEvent {
    DeadlinePassed,
    AdminLock,
    AdminUnlock,
}

impl BlockLockState {
    pub fn of(block: &BlocksRow) -> Self {
        if block.locked {
            BlockLockState::Locked
        } else {
            BlockLockState::Unlocked
        }
    }
}

/// Only an administrator can reopen a block.
pub fn transition(state: BlockLockState, event: BlockLockEvent) -> BlockLockState {
    match (state, event) {
        (_, BlockLockEvent::DeadlinePassed) | (_, BlockLockEvent::AdminLock) => BlockLockState::Locked,
        (_, BlockLockEvent::AdminUnlock) => BlockLockState::Unlocked,
    }
}

/// Apply the deadline to one block if it has passed and never fired before.
/// Returns the block as it stands afterwards.
pub async fn sync_deadline(
    conn: &mut SqliteConnection,
    mut block: BlocksRow,
    now: NaiveDateTime,
) -> sqlx::Result<BlocksRow> {
    if block.auto_locked_at.is_some() || !block.deadline_passed(now) {
        return Ok(block);
    }
    if block_repo::mark_auto_locked(conn, block.id, now).await? > 0 {
        info!(block_id = block.id, "block locked at signup deadline");
        block.locked = transition(BlockLockState::of(&block), BlockLockEvent::DeadlinePassed)
            == BlockLockState::Locked;
        block.auto_locked_at = Some(now);
        Ok(block)
    } else {
        // Someone else fired it first; take their result.
        Ok(block_repo::load_block(conn, block.id).await?.unwrap_or(block))
    }
}

/// Lock every block whose deadline has passed. Used by the `lock_blocks` job.
pub async fn lock_due_blocks(pool: &SqlitePool, now: NaiveDateTime) -> sqlx::Result<Vec<i64>> {
    let mut conn = pool.acquire().await?;
    let due = block_repo::list_due_for_auto_lock(&mut conn, now).await?;
    let mut locked = Vec::with_capacity(due.len());
    for block in due {
        let id = block.id;
        match sync_deadline(&mut conn, block, now).await {
            Ok(b) if b.locked => locked.push(id),
            Ok(_) => {}
            Err(e) => warn!(block_id = id, error = %e, "deadline lock failed"),
        }
    }
    Ok(locked)
}

pub async fn set_block_lock(pool: &SqlitePool, block_id: i64, event: BlockLockEvent) -> AppResult<BlockLockState> {
    let mut conn = pool.acquire().await?;
    let block = block_repo::load_block(&mut conn, block_id)
        .await?
        .ok_or(AppError::NotFound("block"))?;
    let next = transition(BlockLockState::of(&block), event);
    block_repo::set_locked(&mut conn, block_id, next == BlockLockState::Locked).await?;
    info!(block_id, ?event, state = ?next, "block lock changed");
    Ok(next)
}
