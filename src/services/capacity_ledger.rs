//! The only writer of signups, waitlist entries and the member counters.
//!
//! Every mutation follows the same shape: read the user's current signups to
//! learn which rows will be touched, take the row locks for those rows in
//! canonical order, open a transaction whose first writes are the ordered
//! `lock_version` touches, then re-read under the locks. If the re-read shows
//! rows the lock set does not cover (a concurrent switch moved the user), the
//! attempt is rolled back and retried with the larger set.
//!
//! Claims and user removal hand the locked transaction back to the caller
//! ([`LockedClaim`], [`LockedUser`]) so that eligibility is re-checked and the
//! write committed under the same locks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::database::row_locks::{self, HeldLocks, LockSet, RowLockRegistry};
use crate::database::{scheduled_activity_repo, signup_repo, waitlist_repo};
use crate::models::{ScheduledActivitiesRow, SignupDetailRow};
use crate::services::archive_service::{self, ArchiveReason, PreviousSignup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimTarget {
    pub block_id: i64,
    pub scheduled_activity_id: i64,
}

#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub user_id: i64,
    /// One target, or two for a both-blocks activity.
    pub targets: Vec<ClaimTarget>,
    pub force: bool,
    pub allow_waitlist: bool,
    pub after_deadline: bool,
    pub own_signup: bool,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { signup_ids: Vec<i64> },
    AlreadySignedUp,
    Waitlisted { position: i64 },
    Full { scheduled_activity_id: i64 },
}

#[derive(Debug, Clone)]
pub struct ClaimReport {
    pub outcome: ClaimOutcome,
    /// Scheduled activities that lost a member, for waitlist promotion.
    pub freed: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub user_id: i64,
    pub block_id: i64,
    /// Release only if the block's signup is in this scheduled activity.
    pub only_scheduled_activity_id: Option<i64>,
    /// Remove sticky signups too.
    pub force: bool,
    pub reason: ArchiveReason,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseReport {
    Released { freed: Vec<i64> },
    NotSignedUp,
    /// The signup turned sticky after the caller checked it.
    Sticky,
}

/// A user's signups in a set of blocks, locked and re-read inside an open
/// transaction. Callers re-check whatever they decided from an unlocked read
/// through [`LockedClaim::conn`] before handing it back to
/// [`CapacityLedger::claim_locked`]. Dropping it rolls back.
pub struct LockedClaim {
    tx: Transaction<'static, Sqlite>,
    held: HeldLocks,
    block_ids: Vec<i64>,
    affected: Vec<SignupDetailRow>,
}

impl LockedClaim {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Whether these targets can be claimed without taking more locks.
    pub fn covers(&self, targets: &[ClaimTarget]) -> bool {
        let mut block_ids: Vec<i64> = targets.iter().map(|t| t.block_id).collect();
        block_ids.sort_unstable();
        block_ids.dedup();
        let target_ids: Vec<i64> = targets.iter().map(|t| t.scheduled_activity_id).collect();
        block_ids == self.block_ids
            && self.held.set().covers(&LockSet::new().scheduled_activities(target_ids))
    }

    pub async fn rollback(self) -> sqlx::Result<()> {
        self.tx.rollback().await
    }
}

/// Every live signup of one user, locked inside an open transaction. Used to
/// remove a user in a single commit.
pub struct LockedUser {
    tx: Transaction<'static, Sqlite>,
    _held: (HeldLocks, HeldLocks),
    user_id: i64,
    signups: Vec<SignupDetailRow>,
}

impl LockedUser {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    /// Archive and remove every signup, and drop every waitlist entry.
    /// Returns the scheduled activities that lost a member.
    pub async fn release_all(&mut self, reason: ArchiveReason, now: NaiveDateTime) -> sqlx::Result<Vec<i64>> {
        let signups = std::mem::take(&mut self.signups);
        let mut freed = Vec::with_capacity(signups.len());
        for signup in &signups {
            archive_service::record_removal(&mut self.tx, signup, reason, now).await;
            signup_repo::delete_signup(&mut self.tx, signup.id).await?;
            scheduled_activity_repo::decrement_members(&mut self.tx, signup.scheduled_activity_id).await?;
            freed.push(signup.scheduled_activity_id);
        }
        waitlist_repo::delete_for_user(&mut self.tx, self.user_id).await?;
        Ok(freed)
    }

    pub async fn commit(self) -> sqlx::Result<()> {
        self.tx.commit().await
    }
}

pub struct CapacityLedger {
    pool: SqlitePool,
    locks: Arc<RowLockRegistry>,
    enable_waitlist: bool,
    retry_limit: usize,
}

impl CapacityLedger {
    pub fn new(pool: SqlitePool, locks: Arc<RowLockRegistry>, config: &EngineConfig) -> Self {
        Self {
            pool,
            locks,
            enable_waitlist: config.enable_waitlist,
            retry_limit: config.lock_retry_limit.max(1),
        }
    }

    pub fn locks(&self) -> &RowLockRegistry {
        &self.locks
    }

    /// Lock the user's signups in the targets' blocks and re-read them inside
    /// a fresh transaction. Retries while a concurrent switch keeps moving the
    /// rows outside the lock set.
    pub async fn lock_claim(&self, user_id: i64, targets: &[ClaimTarget]) -> sqlx::Result<LockedClaim> {
        let mut block_ids: Vec<i64> = targets.iter().map(|t| t.block_id).collect();
        block_ids.sort_unstable();
        block_ids.dedup();
        let target_ids: Vec<i64> = targets.iter().map(|t| t.scheduled_activity_id).collect();

        for attempt in 1..=self.retry_limit {
            let expected = {
                let mut conn = self.pool.acquire().await?;
                affected_signups(&mut conn, user_id, &block_ids).await?
            };
            let wanted = lock_set(user_id, &target_ids, &expected);
            let held = self.locks.acquire(&wanted).await;

            let mut tx = self.pool.begin().await?;
            row_locks::touch_rows(&mut tx, held.set()).await?;
            let affected = affected_signups(&mut tx, user_id, &block_ids).await?;
            if !held.set().covers(&lock_set(user_id, &target_ids, &affected)) {
                tx.rollback().await?;
                debug!(user_id, attempt, "signup moved while locking, retrying claim");
                continue;
            }
            return Ok(LockedClaim {
                tx,
                held,
                block_ids,
                affected,
            });
        }

        warn!(user_id, "claim gave up after {} lock attempts", self.retry_limit);
        Err(sqlx::Error::Protocol("lock set kept changing during claim".into()))
    }

    /// Apply a claim under the locks taken by [`CapacityLedger::lock_claim`].
    /// A `Full` outcome rolls back; everything else commits.
    pub async fn claim_locked(&self, mut locked: LockedClaim, req: &ClaimRequest) -> sqlx::Result<ClaimReport> {
        let affected = std::mem::take(&mut locked.affected);
        let report = self.apply_claim(&mut locked.tx, req, affected).await?;
        match report.outcome {
            ClaimOutcome::Full { scheduled_activity_id } => {
                locked.tx.rollback().await?;
                debug!(user_id = req.user_id, scheduled_activity_id, "claim refused, activity full");
            }
            _ => {
                locked.tx.commit().await?;
                info!(user_id = req.user_id, outcome = ?report.outcome, "claim committed");
            }
        }
        Ok(report)
    }

    /// Lock the user row and every scheduled activity the user holds a seat
    /// in, then re-read all of the user's signups inside a fresh transaction.
    ///
    /// The user key sorts before every scheduled activity key, so it is taken
    /// first and on its own: every path that moves this user's signups needs
    /// it, which keeps the pre-read stable while the rest of the set is taken.
    pub async fn lock_user(&self, user_id: i64) -> sqlx::Result<LockedUser> {
        let user_set = LockSet::new().user(user_id);
        let user_lock = self.locks.acquire(&user_set).await;
        let expected = {
            let mut conn = self.pool.acquire().await?;
            signup_repo::list_for_user(&mut conn, user_id).await?
        };
        let seats = LockSet::new().scheduled_activities(expected.iter().map(|s| s.scheduled_activity_id));
        let seat_locks = self.locks.acquire(&seats).await;

        let full = lock_set(user_id, &[], &expected);
        let mut tx = self.pool.begin().await?;
        row_locks::touch_rows(&mut tx, &full).await?;
        let signups = signup_repo::list_for_user(&mut tx, user_id).await?;
        if !full.covers(&lock_set(user_id, &[], &signups)) {
            tx.rollback().await?;
            warn!(user_id, "signups changed under the user lock");
            return Err(sqlx::Error::Protocol("signups changed under the user lock".into()));
        }
        Ok(LockedUser {
            tx,
            _held: (user_lock, seat_locks),
            user_id,
            signups,
        })
    }

    async fn apply_claim(
        &self,
        conn: &mut SqliteConnection,
        req: &ClaimRequest,
        affected: Vec<SignupDetailRow>,
    ) -> sqlx::Result<ClaimReport> {
        let mut targets: Vec<(ClaimTarget, ScheduledActivitiesRow)> = Vec::with_capacity(req.targets.len());
        for target in &req.targets {
            let scheduled = scheduled_activity_repo::load_by_id(conn, target.scheduled_activity_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            targets.push((*target, scheduled));
        }

        let is_target = |sa_id: i64| targets.iter().any(|(t, _)| t.scheduled_activity_id == sa_id);
        let (kept, removals): (Vec<_>, Vec<_>) = affected
            .into_iter()
            .partition(|s| is_target(s.scheduled_activity_id));
        let to_insert: Vec<&(ClaimTarget, ScheduledActivitiesRow)> = targets
            .iter()
            .filter(|(t, _)| !kept.iter().any(|k| k.scheduled_activity_id == t.scheduled_activity_id))
            .collect();

        if to_insert.is_empty() {
            return Ok(ClaimReport {
                outcome: ClaimOutcome::AlreadySignedUp,
                freed: Vec::new(),
            });
        }

        if !req.force {
            if let Some((target, _)) = to_insert.iter().find(|(_, sa)| sa.is_full()) {
                let outcome = if self.enable_waitlist && req.allow_waitlist && req.targets.len() == 1 {
                    let position = enqueue(conn, req.user_id, *target, req.now).await?;
                    ClaimOutcome::Waitlisted { position }
                } else {
                    ClaimOutcome::Full {
                        scheduled_activity_id: target.scheduled_activity_id,
                    }
                };
                return Ok(ClaimReport {
                    outcome,
                    freed: Vec::new(),
                });
            }
        }

        let mut previous: HashMap<i64, PreviousSignup> = HashMap::new();
        let mut freed = Vec::with_capacity(removals.len());
        for signup in &removals {
            let snapshot =
                archive_service::record_removal(conn, signup, ArchiveReason::Switched, req.now).await;
            signup_repo::delete_signup(conn, signup.id).await?;
            scheduled_activity_repo::decrement_members(conn, signup.scheduled_activity_id).await?;
            previous.insert(signup.block_id, snapshot);
            freed.push(signup.scheduled_activity_id);
        }

        let mut signup_ids = Vec::with_capacity(to_insert.len());
        for (target, _) in to_insert {
            let prev = previous.get(&target.block_id);
            let id = signup_repo::insert_signup(
                conn,
                signup_repo::NewSignup {
                    user_id: req.user_id,
                    block_id: target.block_id,
                    scheduled_activity_id: target.scheduled_activity_id,
                    created_at: req.now,
                    after_deadline: req.after_deadline,
                    own_signup: req.own_signup,
                    previous_activity_name: prev.map(|p| p.activity_name.as_str()),
                    previous_activity_sponsors: prev.map(|p| p.sponsor_names.as_str()),
                },
            )
            .await?;
            scheduled_activity_repo::increment_members(conn, target.scheduled_activity_id).await?;
            // A signup in a block ends any wait in that block.
            waitlist_repo::delete_for_user_in_block(conn, req.user_id, target.block_id).await?;
            signup_ids.push(id);
        }

        Ok(ClaimReport {
            outcome: ClaimOutcome::Claimed { signup_ids },
            freed,
        })
    }

    /// Remove the user's signup in a block, together with the other half of a
    /// both-blocks signup.
    pub async fn release(&self, req: &ReleaseRequest) -> sqlx::Result<ReleaseReport> {
        let block_ids = [req.block_id];

        for attempt in 1..=self.retry_limit {
            let expected = {
                let mut conn = self.pool.acquire().await?;
                affected_signups(&mut conn, req.user_id, &block_ids).await?
            };
            let held = self.locks.acquire(&lock_set(req.user_id, &[], &expected)).await;

            let mut tx = self.pool.begin().await?;
            row_locks::touch_rows(&mut tx, held.set()).await?;
            let affected = affected_signups(&mut tx, req.user_id, &block_ids).await?;
            if !held.set().covers(&lock_set(req.user_id, &[], &affected)) {
                tx.rollback().await?;
                debug!(user_id = req.user_id, attempt, "signup moved while locking, retrying release");
                continue;
            }

            let holds_expected = req.only_scheduled_activity_id.map_or(true, |sa_id| {
                affected
                    .iter()
                    .any(|s| s.block_id == req.block_id && s.scheduled_activity_id == sa_id)
            });
            if affected.is_empty() || !holds_expected {
                tx.rollback().await?;
                return Ok(ReleaseReport::NotSignedUp);
            }
            if !req.force && affected.iter().any(|s| s.sticky) {
                tx.rollback().await?;
                debug!(user_id = req.user_id, block_id = req.block_id, "release refused, signup is sticky");
                return Ok(ReleaseReport::Sticky);
            }

            let mut freed = Vec::with_capacity(affected.len());
            for signup in &affected {
                archive_service::record_removal(&mut tx, signup, req.reason, req.now).await;
                signup_repo::delete_signup(&mut tx, signup.id).await?;
                scheduled_activity_repo::decrement_members(&mut tx, signup.scheduled_activity_id).await?;
                freed.push(signup.scheduled_activity_id);
            }
            tx.commit().await?;
            info!(
                user_id = req.user_id,
                block_id = req.block_id,
                reason = req.reason.as_str(),
                released = freed.len(),
                "release committed"
            );
            return Ok(ReleaseReport::Released { freed });
        }

        warn!(user_id = req.user_id, "release gave up after {} lock attempts", self.retry_limit);
        Err(sqlx::Error::Protocol("lock set kept changing during release".into()))
    }

    /// Leave every queue the user is in for a block. Idempotent.
    pub async fn leave_waitlist(&self, user_id: i64, block_id: i64) -> sqlx::Result<u64> {
        let set = LockSet::new().user(user_id);
        let _held = self.locks.acquire(&set).await;
        let mut tx = self.pool.begin().await?;
        row_locks::touch_rows(&mut tx, &set).await?;
        let removed = waitlist_repo::delete_for_user_in_block(&mut tx, user_id, block_id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Drop one entry after its offer was declined.
    pub async fn drop_waitlist_entry(&self, user_id: i64, scheduled_activity_id: i64) -> sqlx::Result<u64> {
        let set = LockSet::new().user(user_id).scheduled_activity(scheduled_activity_id);
        let _held = self.locks.acquire(&set).await;
        let mut tx = self.pool.begin().await?;
        row_locks::touch_rows(&mut tx, &set).await?;
        let removed = waitlist_repo::delete_entry(&mut tx, user_id, scheduled_activity_id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Empty the queue of a scheduled activity that can no longer take members.
    pub async fn drop_waitlist(&self, scheduled_activity_id: i64) -> sqlx::Result<u64> {
        let set = LockSet::new().scheduled_activity(scheduled_activity_id);
        let _held = self.locks.acquire(&set).await;
        let mut tx = self.pool.begin().await?;
        row_locks::touch_rows(&mut tx, &set).await?;
        let removed = waitlist_repo::delete_for_scheduled(&mut tx, scheduled_activity_id).await?;
        tx.commit().await?;
        Ok(removed)
    }
}

// Waiting for one activity replaces any other wait in the same block, but
// re-requesting the same activity keeps the original place in line.
async fn enqueue(
    conn: &mut SqliteConnection,
    user_id: i64,
    target: ClaimTarget,
    now: NaiveDateTime,
) -> sqlx::Result<i64> {
    for other in waitlist_repo::scheduled_ids_for_user_in_block(conn, user_id, target.block_id).await? {
        if other != target.scheduled_activity_id {
            waitlist_repo::delete_entry(conn, user_id, other).await?;
        }
    }
    waitlist_repo::insert_entry(conn, user_id, target.block_id, target.scheduled_activity_id, now).await?;
    let position = waitlist_repo::position(conn, user_id, target.scheduled_activity_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(position)
}

/// The user's signups in the given blocks, plus the other half of any
/// both-blocks signup among them.
async fn affected_signups(
    conn: &mut SqliteConnection,
    user_id: i64,
    block_ids: &[i64],
) -> sqlx::Result<Vec<SignupDetailRow>> {
    let mut found: Vec<SignupDetailRow> = Vec::new();
    for &block_id in block_ids {
        if let Some(signup) = signup_repo::load_in_block(conn, user_id, block_id).await? {
            if !found.iter().any(|f| f.id == signup.id) {
                found.push(signup);
            }
        }
    }

    let halves: Vec<_> = found
        .iter()
        .filter(|s| s.both_blocks)
        .map(|s| (s.activity_id, s.block_date))
        .collect();
    for (activity_id, date) in halves {
        for other in signup_repo::list_on_date(conn, user_id, date).await? {
            if other.activity_id == activity_id && !found.iter().any(|f| f.id == other.id) {
                found.push(other);
            }
        }
    }
    Ok(found)
}

fn lock_set(user_id: i64, targets: &[i64], signups: &[SignupDetailRow]) -> LockSet {
    LockSet::new()
        .user(user_id)
        .scheduled_activities(targets.iter().copied())
        .scheduled_activities(signups.iter().map(|s| s.scheduled_activity_id))
}
