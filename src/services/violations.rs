//! Every reason a signup can be refused, and how the refusal is shown.
//!
//! Rules never fail fast: each failed rule adds one [`ViolationKind`] to a
//! [`ViolationSet`], and the whole set is reported at once. Iteration order is
//! the enum's declaration order, so the same failures always render the same
//! way.

use std::collections::BTreeSet;

use askama::Template;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    SignupForbidden,
    ScheduledActivityCancelled,
    ActivityDeleted,
    ActivityFull,
    BlockLocked,
    Presign,
    Sticky,
    OneADay,
    Restricted,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 9] = [
        ViolationKind::SignupForbidden,
        ViolationKind::ScheduledActivityCancelled,
        ViolationKind::ActivityDeleted,
        ViolationKind::ActivityFull,
        ViolationKind::BlockLocked,
        ViolationKind::Presign,
        ViolationKind::Sticky,
        ViolationKind::OneADay,
        ViolationKind::Restricted,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ViolationKind::SignupForbidden => "signup_forbidden",
            ViolationKind::ScheduledActivityCancelled => "scheduled_activity_cancelled",
            ViolationKind::ActivityDeleted => "activity_deleted",
            ViolationKind::ActivityFull => "activity_full",
            ViolationKind::BlockLocked => "block_locked",
            ViolationKind::Presign => "presign",
            ViolationKind::Sticky => "sticky",
            ViolationKind::OneADay => "one_a_day",
            ViolationKind::Restricted => "restricted",
        }
    }

    pub fn user_message(self) -> &'static str {
        catalog(self).0
    }

    pub fn admin_message(self) -> &'static str {
        catalog(self).1
    }
}

// (user sentence, administrator sentence)
fn catalog(kind: ViolationKind) -> (&'static str, &'static str) {
    match kind {
        ViolationKind::SignupForbidden => (
            "You are not allowed to make this signup.",
            "The acting user may not sign this student up. Only administrators may act for other users or join administrative activities.",
        ),
        ViolationKind::ScheduledActivityCancelled => (
            "This activity has been cancelled for this block.",
            "The scheduled activity is cancelled. Uncancel it before signing anyone up.",
        ),
        ViolationKind::ActivityDeleted => (
            "This activity has been deleted.",
            "The parent activity is deleted and cannot take signups.",
        ),
        ViolationKind::ActivityFull => (
            "This activity is full. Please choose another activity.",
            "The activity is at capacity. Force the signup to admit over capacity.",
        ),
        ViolationKind::BlockLocked => (
            "Signups for this block are locked. Please contact the eighth period office.",
            "The block is locked. Force the signup to change it after the deadline.",
        ),
        ViolationKind::Presign => (
            "Signups for this activity are not open yet. Try again closer to the block date.",
            "The activity is presign-only and the block is outside the presign window.",
        ),
        ViolationKind::Sticky => (
            "You are in a sticky activity for this block and cannot switch out of it.",
            "The student holds a sticky signup in this block. Force the change to move them.",
        ),
        ViolationKind::OneADay => (
            "You may only sign up for one one-a-day activity per day.",
            "The student already has a one-a-day activity on this day.",
        ),
        ViolationKind::Restricted => (
            "This activity is restricted. Contact the sponsor of this activity to be added.",
            "The student is not on the user, group or grade allow-list of this restricted activity.",
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    User,
    Admin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationSet {
    kinds: BTreeSet<ViolationKind>,
}

impl ViolationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ViolationKind) {
        self.kinds.insert(kind);
    }

    pub fn contains(&self, kind: ViolationKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn kinds(&self) -> impl Iterator<Item = ViolationKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn messages(&self, audience: Audience) -> Vec<&'static str> {
        self.kinds()
            .map(|k| match audience {
                Audience::User => k.user_message(),
                Audience::Admin => k.admin_message(),
            })
            .collect()
    }

    pub fn render_text(&self, audience: Audience) -> String {
        let messages = self.messages(audience);
        match messages.as_slice() {
            [] => String::new(),
            [single] => (*single).to_string(),
            many => many
                .iter()
                .enumerate()
                .map(|(i, m)| format!("{}. {}", i + 1, m))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn render_html(&self, audience: Audience) -> String {
        let messages = self.messages(audience);
        let template = ViolationListTemplate {
            single: match messages.as_slice() {
                [single] => Some(single),
                _ => None,
            },
            items: &messages,
        };
        match template.render() {
            Ok(html) => html.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "violation template failed, falling back to text");
                self.render_text(audience)
            }
        }
    }

    pub fn report(&self, diagnostics: Option<&Diagnostics>, audience: Audience) -> ViolationReport {
        let admin_detail = (audience == Audience::Admin).then(|| {
            let mut detail = self.render_text(Audience::Admin);
            if let Some(d) = diagnostics {
                detail.push_str("\n\n");
                detail.push_str(&d.summary());
            }
            detail
        });
        ViolationReport {
            violations: self.kinds().collect(),
            messages: self
                .messages(Audience::User)
                .into_iter()
                .map(str::to_string)
                .collect(),
            message: self.render_text(Audience::User),
            message_html: self.render_html(Audience::User),
            admin_detail,
        }
    }
}

impl FromIterator<ViolationKind> for ViolationSet {
    fn from_iter<I: IntoIterator<Item = ViolationKind>>(iter: I) -> Self {
        Self {
            kinds: iter.into_iter().collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "violations.html")]
struct ViolationListTemplate<'a> {
    single: Option<&'a &'static str>,
    items: &'a [&'static str],
}

/// Extra facts shown to administrators next to the catalog sentences.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub user_label: String,
    pub activity_name: String,
    pub block_label: String,
    pub capacity_label: String,
    pub presign_window_days: i64,
}

impl Diagnostics {
    pub fn summary(&self) -> String {
        format!(
            "{} in {} for {}: {} members, presign window {} days",
            self.activity_name,
            self.block_label,
            self.user_label,
            self.capacity_label,
            self.presign_window_days
        )
    }
}

/// Serializable refusal returned to the web layer, always with 403.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationReport {
    pub violations: Vec<ViolationKind>,
    pub messages: Vec<String>,
    pub message: String,
    pub message_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_detail: Option<String>,
}
