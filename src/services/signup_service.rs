use std::sync::Arc;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::database::row_locks::{self, LockSet, RowLockRegistry};
use crate::database::{activity_repo, favorite_repo};
use crate::error::{AppError, AppResult};
use crate::models::UsersRow;
use crate::services::archive_service::ArchiveReason;
use crate::services::capacity_ledger::{
    CapacityLedger, ClaimOutcome, ClaimReport, ClaimRequest, ClaimTarget, ReleaseReport, ReleaseRequest,
};
use crate::services::notification_service::{NotificationEvent, Notifier};
use crate::services::rules::{RuleCatalog, SignupContext};
use crate::services::signup_context::{self, ContextRequest};
use crate::services::violations::{Audience, ViolationKind, ViolationReport, ViolationSet};
use crate::services::waitlist_service;

#[derive(Debug, Clone)]
pub enum SignupOutcome {
    SignedUp { message: String },
    Waitlisted { position: i64, message: String },
    Rejected(ViolationReport),
}

#[derive(Debug, Clone)]
pub enum UnsignupOutcome {
    Removed { message: String },
    NotSignedUp,
    Rejected(ViolationReport),
}

pub(crate) enum CheckedClaim {
    Rejected { ctx: SignupContext, violations: ViolationSet },
    AlreadySignedUp { ctx: SignupContext },
    Claimed { ctx: SignupContext, report: ClaimReport },
}

/// Entry point for every signup mutation. Built once per process from an
/// explicit [`EngineConfig`].
pub struct SignupEngine {
    pub(crate) pool: SqlitePool,
    pub(crate) ledger: CapacityLedger,
    pub(crate) rules: RuleCatalog,
    pub(crate) config: EngineConfig,
    pub(crate) notifier: Notifier,
}

impl SignupEngine {
    pub fn new(pool: SqlitePool, config: EngineConfig, notifier: Notifier) -> Self {
        let locks = Arc::new(RowLockRegistry::new());
        Self {
            ledger: CapacityLedger::new(pool.clone(), locks, &config),
            rules: RuleCatalog::new(&config),
            pool,
            config,
            notifier,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn signup(
        &self,
        actor_id: i64,
        user_id: Option<i64>,
        block_id: i64,
        activity_id: i64,
        force: bool,
        now: NaiveDateTime,
    ) -> AppResult<SignupOutcome> {
        let user_id = user_id.unwrap_or(actor_id);
        let req = ContextRequest {
            actor_id,
            user_id,
            block_id,
            force,
            now,
        };

        match self.checked_claim(req, activity_id, false).await? {
            CheckedClaim::Rejected { ctx, violations } => {
                debug!(
                    actor_id,
                    user_id,
                    block_id,
                    activity_id,
                    violations = ?violations.kinds().collect::<Vec<_>>(),
                    "signup rejected"
                );
                let diagnostics = ctx.diagnostics(self.rules.presign_window_days());
                Ok(SignupOutcome::Rejected(
                    violations.report(Some(&diagnostics), audience_for(&ctx.actor)),
                ))
            }
            CheckedClaim::AlreadySignedUp { ctx } => Ok(SignupOutcome::SignedUp {
                message: format!("You are already signed up for {}.", ctx.target.activity_name),
            }),
            CheckedClaim::Claimed { ctx, report } => {
                self.promote_freed(report.freed, now).await;
                let name = &ctx.target.activity_name;
                match report.outcome {
                    ClaimOutcome::Claimed { .. } => {
                        for target in claim_targets(&ctx) {
                            self.notifier
                                .notify(NotificationEvent::SignedUp, user_id, target.scheduled_activity_id);
                        }
                        Ok(SignupOutcome::SignedUp {
                            message: format!("Successfully signed up for {name}."),
                        })
                    }
                    ClaimOutcome::AlreadySignedUp => Ok(SignupOutcome::SignedUp {
                        message: format!("You are already signed up for {name}."),
                    }),
                    ClaimOutcome::Waitlisted { position } => {
                        self.notifier
                            .notify(NotificationEvent::Waitlisted, user_id, ctx.target.id);
                        Ok(SignupOutcome::Waitlisted {
                            position,
                            message: format!("{name} is full. You are number {position} on the waitlist."),
                        })
                    }
                    ClaimOutcome::Full { .. } => {
                        let violations: ViolationSet = [ViolationKind::ActivityFull].into_iter().collect();
                        let diagnostics = ctx.diagnostics(self.rules.presign_window_days());
                        Ok(SignupOutcome::Rejected(
                            violations.report(Some(&diagnostics), audience_for(&ctx.actor)),
                        ))
                    }
                }
            }
        }
    }

    /// Run the rule catalog and claim the seat. Rules are checked once on an
    /// unlocked read to turn obvious rejections away cheaply, then again on a
    /// re-read inside the locked transaction the claim commits in, so a
    /// concurrent request for the same user cannot slip past sticky or
    /// one-a-day between the check and the write.
    pub(crate) async fn checked_claim(
        &self,
        req: ContextRequest,
        activity_id: i64,
        from_waitlist: bool,
    ) -> AppResult<CheckedClaim> {
        let mut targets = {
            let mut conn = self.pool.acquire().await?;
            let ctx = signup_context::load_signup_context(&mut conn, req, activity_id).await?;
            let violations = self.rules.evaluate(&ctx);
            if !violations.is_empty() {
                return Ok(CheckedClaim::Rejected { ctx, violations });
            }
            if ctx.is_noop() {
                return Ok(CheckedClaim::AlreadySignedUp { ctx });
            }
            claim_targets(&ctx)
        };

        for attempt in 1..=self.config.lock_retry_limit.max(1) {
            let mut locked = self.ledger.lock_claim(req.user_id, &targets).await?;
            let ctx = signup_context::load_signup_context(locked.conn(), req, activity_id).await?;
            let wanted = claim_targets(&ctx);
            if !locked.covers(&wanted) {
                locked.rollback().await?;
                debug!(user_id = req.user_id, attempt, "claim targets moved while locking, retrying");
                targets = wanted;
                continue;
            }

            let violations = self.rules.evaluate(&ctx);
            if !violations.is_empty() {
                locked.rollback().await?;
                return Ok(CheckedClaim::Rejected { ctx, violations });
            }
            if ctx.is_noop() {
                locked.rollback().await?;
                return Ok(CheckedClaim::AlreadySignedUp { ctx });
            }

            let claim = ClaimRequest {
                user_id: req.user_id,
                targets: wanted,
                force: ctx.force,
                allow_waitlist: !from_waitlist && self.rules.waitlist_applies(&ctx),
                after_deadline: ctx.block.deadline_passed(req.now),
                own_signup: req.actor_id == req.user_id,
                now: req.now,
            };
            let report = self.ledger.claim_locked(locked, &claim).await?;
            return Ok(CheckedClaim::Claimed { ctx, report });
        }

        warn!(user_id = req.user_id, "claim targets kept moving, giving up");
        Err(sqlx::Error::Protocol("claim targets kept changing".into()).into())
    }

    pub async fn unsignup(
        &self,
        actor_id: i64,
        user_id: Option<i64>,
        block_id: i64,
        force: bool,
        now: NaiveDateTime,
    ) -> AppResult<UnsignupOutcome> {
        let user_id = user_id.unwrap_or(actor_id);
        let ctx = {
            let mut conn = self.pool.acquire().await?;
            let actor = signup_context::load_user(&mut conn, actor_id).await?;
            if actor_id != user_id && !actor.is_admin() {
                let violations: ViolationSet = [ViolationKind::SignupForbidden].into_iter().collect();
                return Ok(UnsignupOutcome::Rejected(violations.report(None, Audience::User)));
            }
            let req = ContextRequest {
                actor_id,
                user_id,
                block_id,
                force,
                now,
            };
            match signup_context::load_removal_context(&mut conn, req).await? {
                Some(ctx) => ctx,
                None => return Ok(UnsignupOutcome::NotSignedUp),
            }
        };

        let violations = self.rules.evaluate_removal(&ctx);
        if !violations.is_empty() {
            debug!(actor_id, user_id, block_id, "unsignup rejected");
            return Ok(UnsignupOutcome::Rejected(
                violations.report(None, audience_for(&ctx.actor)),
            ));
        }

        let release = ReleaseRequest {
            user_id,
            block_id,
            only_scheduled_activity_id: None,
            force: ctx.force,
            reason: if actor_id == user_id {
                ArchiveReason::Unsignup
            } else {
                ArchiveReason::Removed
            },
            now,
        };
        match self.ledger.release(&release).await? {
            ReleaseReport::NotSignedUp => Ok(UnsignupOutcome::NotSignedUp),
            ReleaseReport::Sticky => {
                let violations: ViolationSet = [ViolationKind::Sticky].into_iter().collect();
                Ok(UnsignupOutcome::Rejected(
                    violations.report(None, audience_for(&ctx.actor)),
                ))
            }
            ReleaseReport::Released { freed } => {
                for sa_id in &freed {
                    self.notifier.notify(NotificationEvent::Removed, user_id, *sa_id);
                }
                self.promote_freed(freed, now).await;
                Ok(UnsignupOutcome::Removed {
                    message: format!("Successfully removed signup for {}.", ctx.current.activity_name),
                })
            }
        }
    }

    /// Flip the favorite flag on an activity. Serialized on the user's row.
    pub async fn toggle_favorite(&self, actor_id: i64, activity_id: i64) -> AppResult<bool> {
        {
            let mut conn = self.pool.acquire().await?;
            activity_repo::load_activity(&mut conn, activity_id)
                .await?
                .ok_or(AppError::NotFound("activity"))?;
        }

        let set = LockSet::new().user(actor_id);
        let _held = self.ledger.locks().acquire(&set).await;
        let mut tx = self.pool.begin().await?;
        row_locks::touch_rows(&mut tx, &set).await?;
        let favorited = if favorite_repo::is_favorite(&mut tx, actor_id, activity_id).await? {
            favorite_repo::delete_favorite(&mut tx, actor_id, activity_id).await?;
            false
        } else {
            favorite_repo::insert_favorite(&mut tx, actor_id, activity_id).await?;
            true
        };
        tx.commit().await?;
        Ok(favorited)
    }

    pub async fn leave_waitlist(&self, actor_id: i64, user_id: Option<i64>, block_id: i64) -> AppResult<u64> {
        let user_id = user_id.unwrap_or(actor_id);
        if user_id != actor_id {
            self.require_admin(actor_id).await?;
        }
        let removed = self.ledger.leave_waitlist(user_id, block_id).await?;
        info!(user_id, block_id, removed, "left waitlist");
        Ok(removed)
    }

    pub(crate) async fn require_admin(&self, actor_id: i64) -> AppResult<UsersRow> {
        let mut conn = self.pool.acquire().await?;
        let actor = signup_context::load_user(&mut conn, actor_id).await?;
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(actor)
    }

    /// Offer freed slots to their queues. The triggering change has already
    /// committed, so failures are logged rather than returned.
    pub(crate) async fn promote_freed(&self, freed: Vec<i64>, now: NaiveDateTime) {
        if freed.is_empty() || !self.config.enable_waitlist {
            return;
        }
        if let Err(e) = waitlist_service::promote(self, freed, now).await {
            warn!(error = %e, "waitlist promotion failed");
        }
    }
}

fn claim_targets(ctx: &SignupContext) -> Vec<ClaimTarget> {
    let mut targets = vec![ClaimTarget {
        block_id: ctx.block.id,
        scheduled_activity_id: ctx.target.id,
    }];
    if let Some(sibling) = &ctx.sibling {
        targets.push(ClaimTarget {
            block_id: sibling.block.id,
            scheduled_activity_id: sibling.scheduled.id,
        });
    }
    targets
}

fn audience_for(actor: &UsersRow) -> Audience {
    if actor.is_admin() {
        Audience::Admin
    } else {
        Audience::User
    }
}
