//! Offers freed slots to the head of each queue.
//!
//! A promotion is the head user's own signup request replayed on their
//! behalf: the rule catalog runs with the head acting as themselves, and an
//! accepted offer goes through the ledger like any other claim. A locked block
//! freezes the queue; any other violation drops the head and the next one is
//! tried.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::database::{scheduled_activity_repo, waitlist_repo};
use crate::error::{AppError, AppResult};
use crate::services::capacity_ledger::ClaimOutcome;
use crate::services::notification_service::NotificationEvent;
use crate::services::signup_context::ContextRequest;
use crate::services::signup_service::{CheckedClaim, SignupEngine};
use crate::services::violations::ViolationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub user_id: i64,
    pub scheduled_activity_id: i64,
}

/// Run promotion passes for every freed scheduled activity. A promoted user
/// who switched out of another activity frees that one too, so it joins the
/// work list.
pub async fn promote(engine: &SignupEngine, freed: Vec<i64>, now: NaiveDateTime) -> AppResult<Vec<Promotion>> {
    let mut pending: VecDeque<i64> = freed.into_iter().collect();
    let mut promoted = Vec::new();
    while let Some(scheduled_activity_id) = pending.pop_front() {
        let (accepted, cascade) = promote_one(engine, scheduled_activity_id, now).await?;
        promoted.extend(accepted);
        pending.extend(cascade);
    }
    Ok(promoted)
}

async fn promote_one(
    engine: &SignupEngine,
    scheduled_activity_id: i64,
    now: NaiveDateTime,
) -> AppResult<(Vec<Promotion>, Vec<i64>)> {
    let mut promoted = Vec::new();
    let mut cascade = Vec::new();

    for _ in 0..engine.config.waitlist_max_offers {
        let (entry, scheduled) = {
            let mut conn = engine.pool.acquire().await?;
            let entry = waitlist_repo::head(&mut conn, scheduled_activity_id).await?;
            let scheduled = scheduled_activity_repo::load_by_id(&mut conn, scheduled_activity_id).await?;
            (entry, scheduled)
        };
        let (Some(entry), Some(scheduled)) = (entry, scheduled) else {
            break;
        };
        if scheduled.is_full() {
            break;
        }

        let req = ContextRequest {
            actor_id: entry.user_id,
            user_id: entry.user_id,
            block_id: entry.block_id,
            force: false,
            now,
        };
        let checked = match engine.checked_claim(req, scheduled.activity_id, true).await {
            Ok(checked) => checked,
            Err(AppError::NotFound(what)) => {
                debug!(user_id = entry.user_id, what, "waitlist head vanished, dropping entry");
                engine.ledger.drop_waitlist_entry(entry.user_id, scheduled_activity_id).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let report = match checked {
            CheckedClaim::Rejected { violations, .. } if violations.contains(ViolationKind::BlockLocked) => {
                debug!(scheduled_activity_id, "block locked, waitlist frozen");
                break;
            }
            CheckedClaim::Rejected { violations, .. } => {
                debug!(
                    user_id = entry.user_id,
                    scheduled_activity_id,
                    violations = ?violations.kinds().collect::<Vec<_>>(),
                    "waitlist offer declined"
                );
                engine.ledger.drop_waitlist_entry(entry.user_id, scheduled_activity_id).await?;
                continue;
            }
            CheckedClaim::AlreadySignedUp { .. } => {
                engine.ledger.drop_waitlist_entry(entry.user_id, scheduled_activity_id).await?;
                continue;
            }
            CheckedClaim::Claimed { report, .. } => report,
        };

        cascade.extend(report.freed);
        match report.outcome {
            ClaimOutcome::Claimed { .. } => {
                info!(user_id = entry.user_id, scheduled_activity_id, "promoted from waitlist");
                engine
                    .notifier
                    .notify(NotificationEvent::Promoted, entry.user_id, scheduled_activity_id);
                promoted.push(Promotion {
                    user_id: entry.user_id,
                    scheduled_activity_id,
                });
            }
            ClaimOutcome::AlreadySignedUp => {
                engine.ledger.drop_waitlist_entry(entry.user_id, scheduled_activity_id).await?;
            }
            ClaimOutcome::Full { .. } | ClaimOutcome::Waitlisted { .. } => break,
        }
    }

    Ok((promoted, cascade))
}
