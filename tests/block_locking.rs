mod common;

use chrono::Duration;
use sqlx::Row;

use common::*;
use eighth::error::AppError;
use eighth::services::block_lock_service::{self, BlockLockState};
use eighth::services::signup_service::SignupOutcome;
use eighth::services::violations::ViolationKind;
use eighth::services::admin_service;

#[tokio::test]
async fn deadline_locks_once_and_admin_unlock_sticks() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let student = user(&pool, "sam", "student").await;
    let blk = block(&pool, today(), "A").await;
    set_deadline(&pool, blk, now() - Duration::hours(1)).await;
    let chess = activity(&pool, "Chess").await;
    schedule(&pool, blk, chess, None).await;

    match engine.signup(student, None, blk, chess, false, now()).await.unwrap() {
        SignupOutcome::Rejected(report) => assert_eq!(report.violations, vec![ViolationKind::BlockLocked]),
        other => panic!("expected a rejection, got {other:?}"),
    }
    let row = sqlx::query("SELECT locked, auto_locked_at IS NOT NULL AS fired FROM blocks WHERE id = ?1")
        .bind(blk)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(row.get::<bool, _>("locked"));
    assert!(row.get::<bool, _>("fired"));

    let state = admin_service::unlock_block(&engine, admin, blk).await.unwrap();
    assert_eq!(state, BlockLockState::Unlocked);

    let outcome = engine.signup(student, None, blk, chess, false, now()).await.unwrap();
    assert!(matches!(outcome, SignupOutcome::SignedUp { .. }));

    // The job must not re-lock a block whose deadline already fired.
    let locked = block_lock_service::lock_due_blocks(&pool, now()).await.unwrap();
    assert!(locked.is_empty());
}

#[tokio::test]
async fn lock_job_locks_due_blocks_only() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let due = block(&pool, today(), "A").await;
    let later = block(&pool, today(), "B").await;
    let open = block(&pool, today(), "C").await;
    set_deadline(&pool, due, now() - Duration::minutes(5)).await;
    set_deadline(&pool, later, now() + Duration::hours(2)).await;

    let locked = block_lock_service::lock_due_blocks(&pool, now()).await.unwrap();
    assert_eq!(locked, vec![due]);

    let again = block_lock_service::lock_due_blocks(&pool, now()).await.unwrap();
    assert!(again.is_empty());

    let states: Vec<(i64, bool)> = sqlx::query("SELECT id, locked FROM blocks ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.get("id"), r.get("locked")))
        .collect();
    assert_eq!(states, vec![(due, true), (later, false), (open, false)]);
}

#[tokio::test]
async fn admin_lock_requires_admin() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let student = user(&pool, "sam", "student").await;
    let blk = block(&pool, today(), "A").await;

    let err = admin_service::lock_block(&engine, student, blk).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let state = admin_service::lock_block(&engine, admin, blk).await.unwrap();
    assert_eq!(state, BlockLockState::Locked);

    let err = admin_service::lock_block(&engine, admin, 4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("block")));
}

#[tokio::test]
async fn raising_capacity_promotes_the_queue() {
    let engine = engine(config(true)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;
    let c = user(&pool, "carol", "student").await;
    let blk = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    let sa = schedule(&pool, blk, chess, Some(1)).await;

    engine.signup(a, None, blk, chess, false, now()).await.unwrap();
    engine.signup(b, None, blk, chess, false, now()).await.unwrap();
    engine.signup(c, None, blk, chess, false, now()).await.unwrap();
    assert_eq!(waitlist_len(&pool, sa).await, 2);

    admin_service::set_capacity(&engine, admin, sa, Some(3), now()).await.unwrap();
    assert_eq!(member_count(&pool, sa).await, 3);
    assert_eq!(waitlist_len(&pool, sa).await, 0);
}

#[tokio::test]
async fn locked_block_freezes_the_queue() {
    let engine = engine(config(true)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;
    let blk = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    let sa = schedule(&pool, blk, chess, Some(1)).await;

    engine.signup(a, None, blk, chess, false, now()).await.unwrap();
    engine.signup(b, None, blk, chess, false, now()).await.unwrap();
    lock(&pool, blk).await;

    engine.unsignup(admin, Some(a), blk, true, now()).await.unwrap();
    assert_eq!(member_count(&pool, sa).await, 0);
    assert_eq!(held(&pool, b, blk).await, None);
    assert_eq!(waitlist_len(&pool, sa).await, 1);
}

#[tokio::test]
async fn cancelling_drops_the_queue() {
    let engine = engine(config(true)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;
    let blk = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    let sa = schedule(&pool, blk, chess, Some(1)).await;

    engine.signup(a, None, blk, chess, false, now()).await.unwrap();
    engine.signup(b, None, blk, chess, false, now()).await.unwrap();

    admin_service::set_cancelled(&engine, admin, sa, true).await.unwrap();
    assert_eq!(waitlist_len(&pool, sa).await, 0);
    assert_eq!(member_count(&pool, sa).await, 1);
}
