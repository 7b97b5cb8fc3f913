//! Signup eligibility rules.
//!
//! Each rule is a total function over an immutable [`SignupContext`] snapshot
//! and answers one question: does this violation apply? All rules run on every
//! request; the catalog never stops at the first failure.

use chrono::{Duration, NaiveDate};

use crate::config::EngineConfig;
use crate::models::{AllowList, BlocksRow, ScheduledActivitiesRow, SignupDetailRow, UsersRow};
use crate::services::violations::{Diagnostics, ViolationKind, ViolationSet};

/// The other half of a both-blocks activity on the same day.
#[derive(Debug, Clone)]
pub struct SiblingContext {
    pub block: BlocksRow,
    pub scheduled: ScheduledActivitiesRow,
    pub current: Option<SignupDetailRow>,
}

#[derive(Debug, Clone)]
pub struct SignupContext {
    pub actor: UsersRow,
    pub user: UsersRow,
    pub user_group_ids: Vec<i64>,
    pub block: BlocksRow,
    pub target: ScheduledActivitiesRow,
    pub allow_list: AllowList,
    pub current: Option<SignupDetailRow>,
    pub sibling: Option<SiblingContext>,
    pub same_day: Vec<SignupDetailRow>,
    pub today: NaiveDate,
    /// Already restricted to admin actors by the caller.
    pub force: bool,
}

impl SignupContext {
    /// True when the user already holds exactly what is being requested.
    pub fn is_noop(&self) -> bool {
        let target_held = self
            .current
            .as_ref()
            .is_some_and(|c| c.scheduled_activity_id == self.target.id);
        let sibling_held = self.sibling.as_ref().map_or(true, |s| {
            s.current
                .as_ref()
                .is_some_and(|c| c.scheduled_activity_id == s.scheduled.id)
        });
        target_held && sibling_held
    }

    pub fn claims_both_blocks(&self) -> bool {
        self.sibling.is_some()
    }

    fn needs_target_slot(&self) -> bool {
        self.current
            .as_ref()
            .map_or(true, |c| c.scheduled_activity_id != self.target.id)
    }

    fn replaced_block(&self, block_id: i64) -> bool {
        block_id == self.block.id || self.sibling.as_ref().is_some_and(|s| s.block.id == block_id)
    }

    // Both-blocks activities whose other half disappears with this claim.
    fn dropped_both_blocks_activity(&self, activity_id: i64) -> bool {
        let current = self.current.iter();
        let sibling_current = self.sibling.iter().filter_map(|s| s.current.as_ref());
        current
            .chain(sibling_current)
            .any(|c| c.both_blocks && c.activity_id == activity_id)
    }

    pub fn diagnostics(&self, presign_window_days: i64) -> Diagnostics {
        Diagnostics {
            user_label: self.user.label().to_string(),
            activity_name: self.target.activity_name.clone(),
            block_label: self.block.label(),
            capacity_label: self.target.capacity_label(),
            presign_window_days,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemovalContext {
    pub actor: UsersRow,
    pub user: UsersRow,
    pub block: BlocksRow,
    pub current: SignupDetailRow,
    pub sibling_block: Option<BlocksRow>,
    pub force: bool,
}

type SignupRule = fn(&RuleCatalog, &SignupContext) -> bool;
type RemovalRule = fn(&RemovalContext) -> bool;

const SIGNUP_RULES: [(ViolationKind, SignupRule); 9] = [
    (ViolationKind::SignupForbidden, signup_forbidden),
    (ViolationKind::ScheduledActivityCancelled, scheduled_activity_cancelled),
    (ViolationKind::ActivityDeleted, activity_deleted),
    (ViolationKind::ActivityFull, activity_full),
    (ViolationKind::BlockLocked, block_locked),
    (ViolationKind::Presign, presign),
    (ViolationKind::Sticky, sticky),
    (ViolationKind::OneADay, one_a_day),
    (ViolationKind::Restricted, restricted),
];

const REMOVAL_RULES: [(ViolationKind, RemovalRule); 3] = [
    (ViolationKind::SignupForbidden, removal_forbidden),
    (ViolationKind::BlockLocked, removal_block_locked),
    (ViolationKind::Sticky, removal_sticky),
];

#[derive(Debug, Clone)]
pub struct RuleCatalog {
    presign_window_days: i64,
    enable_waitlist: bool,
}

impl RuleCatalog {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            presign_window_days: config.presign_window_days,
            enable_waitlist: config.enable_waitlist,
        }
    }

    pub fn presign_window_days(&self) -> i64 {
        self.presign_window_days
    }

    pub fn evaluate(&self, ctx: &SignupContext) -> ViolationSet {
        SIGNUP_RULES
            .iter()
            .filter(|(_, rule)| rule(self, ctx))
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn evaluate_removal(&self, ctx: &RemovalContext) -> ViolationSet {
        REMOVAL_RULES
            .iter()
            .filter(|(_, rule)| rule(ctx))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Whether a full target may queue instead of being refused.
    pub fn waitlist_applies(&self, ctx: &SignupContext) -> bool {
        self.enable_waitlist && !ctx.force && !ctx.claims_both_blocks()
    }
}

fn signup_forbidden(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    let admin = ctx.actor.is_admin();
    (ctx.actor.id != ctx.user.id && !admin) || (ctx.target.administrative && !admin)
}

fn scheduled_activity_cancelled(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    ctx.target.cancelled || ctx.sibling.as_ref().is_some_and(|s| s.scheduled.cancelled)
}

fn activity_deleted(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    ctx.target.activity_deleted
}

fn activity_full(catalog: &RuleCatalog, ctx: &SignupContext) -> bool {
    if ctx.force || catalog.waitlist_applies(ctx) {
        return false;
    }
    let target_full = ctx.needs_target_slot() && ctx.target.is_full();
    let sibling_full = ctx.sibling.as_ref().is_some_and(|s| {
        let needs_slot = s
            .current
            .as_ref()
            .map_or(true, |c| c.scheduled_activity_id != s.scheduled.id);
        needs_slot && s.scheduled.is_full()
    });
    target_full || sibling_full
}

fn block_locked(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    !ctx.force && (ctx.block.locked || ctx.sibling.as_ref().is_some_and(|s| s.block.locked))
}

fn presign(catalog: &RuleCatalog, ctx: &SignupContext) -> bool {
    !ctx.force
        && ctx.target.presign
        && ctx.block.date > ctx.today + Duration::days(catalog.presign_window_days)
}

fn sticky(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    if ctx.force {
        return false;
    }
    let leaving_target = ctx
        .current
        .as_ref()
        .is_some_and(|c| c.sticky && c.scheduled_activity_id != ctx.target.id);
    let leaving_sibling = ctx.sibling.as_ref().is_some_and(|s| {
        s.current
            .as_ref()
            .is_some_and(|c| c.sticky && c.scheduled_activity_id != s.scheduled.id)
    });
    leaving_target || leaving_sibling
}

fn one_a_day(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    if ctx.force || !ctx.target.one_a_day {
        return false;
    }
    ctx.same_day.iter().any(|s| {
        s.one_a_day
            && !ctx.replaced_block(s.block_id)
            && !(s.both_blocks && ctx.dropped_both_blocks_activity(s.activity_id))
    })
}

fn restricted(_: &RuleCatalog, ctx: &SignupContext) -> bool {
    !ctx.force
        && ctx.target.is_restricted()
        && !ctx
            .allow_list
            .admits(ctx.user.id, &ctx.user_group_ids, ctx.user.grade)
}

fn removal_forbidden(ctx: &RemovalContext) -> bool {
    ctx.actor.id != ctx.user.id && !ctx.actor.is_admin()
}

fn removal_block_locked(ctx: &RemovalContext) -> bool {
    !ctx.force && (ctx.block.locked || ctx.sibling_block.as_ref().is_some_and(|b| b.locked))
}

fn removal_sticky(ctx: &RemovalContext) -> bool {
    !ctx.force && ctx.current.sticky
}
