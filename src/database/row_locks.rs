//! Row locking for every path that mutates membership.
//!
//! A lock set is a set of `(table, id)` keys. Keys are always acquired in
//! their `Ord` order: users before scheduled activities, ascending id within a
//! table. Every mutating path goes through [`RowLockRegistry::acquire`] and
//! then [`touch_rows`], so two requests can only ever wait on each other in one
//! direction.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use sqlx::SqliteConnection;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

// Declaration order is the canonical table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockTable {
    User,
    ScheduledActivity,
}

impl LockTable {
    fn touch_sql(self) -> &'static str {
        match self {
            LockTable::User => "UPDATE users SET lock_version = lock_version + 1 WHERE id = ?1",
            LockTable::ScheduledActivity => {
                "UPDATE scheduled_activities SET lock_version = lock_version + 1 WHERE id = ?1"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey {
    pub table: LockTable,
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet {
    keys: BTreeSet<LockKey>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: i64) -> Self {
        self.keys.insert(LockKey {
            table: LockTable::User,
            id,
        });
        self
    }

    pub fn scheduled_activity(mut self, id: i64) -> Self {
        self.keys.insert(LockKey {
            table: LockTable::ScheduledActivity,
            id,
        });
        self
    }

    pub fn scheduled_activities(self, ids: impl IntoIterator<Item = i64>) -> Self {
        ids.into_iter()
            .fold(self, |set, id| set.scheduled_activity(id))
    }

    pub fn covers(&self, other: &LockSet) -> bool {
        other.keys.is_subset(&self.keys)
    }

    /// Keys in acquisition order.
    pub fn ordered(&self) -> impl Iterator<Item = LockKey> + '_ {
        self.keys.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// In-process half of the lock: one async mutex per key.
#[derive(Default)]
pub struct RowLockRegistry {
    slots: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

pub struct HeldLocks {
    set: LockSet,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl HeldLocks {
    pub fn set(&self) -> &LockSet {
        &self.set
    }
}

impl RowLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, set: &LockSet) -> HeldLocks {
        let mut guards = Vec::with_capacity(set.len());
        for key in set.ordered() {
            let slot = self.slot(key);
            guards.push(slot.lock_owned().await);
        }
        HeldLocks {
            set: set.clone(),
            _guards: guards,
        }
    }

    fn slot(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Drop slots nobody is holding or waiting on.
        if slots.len() > 1024 {
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Store half of the lock: bump `lock_version` on each row, in canonical
/// order, as the first writes of the transaction.
pub async fn touch_rows(conn: &mut SqliteConnection, set: &LockSet) -> sqlx::Result<()> {
    for key in set.ordered() {
        sqlx::query(key.table.touch_sql())
            .bind(key.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
