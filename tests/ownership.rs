mod common;

use chrono::Duration;
use sqlx::Row;

use common::*;
use eighth::error::AppError;
use eighth::services::ownership_service;
use eighth::services::signup_service::SignupOutcome;
use eighth::services::violations::ViolationKind;

#[tokio::test]
async fn deleting_a_user_keeps_history_under_the_placeholder() {
    let engine = engine(config(true)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let student = user(&pool, "sam", "student").await;
    let other = user(&pool, "olga", "student").await;
    let yesterday = block(&pool, today() - Duration::days(1), "A").await;
    let current = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    let past_sa = schedule(&pool, yesterday, chess, None).await;
    let full_sa = schedule(&pool, current, chess, Some(1)).await;

    engine.signup(student, None, yesterday, chess, false, now()).await.unwrap();
    engine.signup(other, None, current, chess, false, now()).await.unwrap();
    // Full, so the student waits.
    let queued = engine.signup(student, None, current, chess, false, now()).await.unwrap();
    assert!(matches!(queued, SignupOutcome::Waitlisted { .. }));
    engine.toggle_favorite(student, chess).await.unwrap();

    let before = member_count(&pool, past_sa).await + archived_count(&pool, past_sa).await;

    let summary = ownership_service::delete_user(&engine, admin, student, now()).await.unwrap();
    assert_eq!(summary.released_signups, 1);
    assert_eq!(summary.reassigned_archive_rows, 1);

    assert_eq!(member_count(&pool, past_sa).await, 0);
    assert_eq!(archived_count(&pool, past_sa).await, 1);
    let after = member_count(&pool, past_sa).await + archived_count(&pool, past_sa).await;
    assert_eq!(before, after);
    assert_eq!(waitlist_len(&pool, full_sa).await, 0);

    let archive = sqlx::query("SELECT user_id, original_user_id, reason FROM signup_archive")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(archive.get::<i64, _>("user_id"), summary.placeholder_user_id);
    assert_eq!(archive.get::<i64, _>("original_user_id"), student);
    assert_eq!(archive.get::<String, _>("reason"), "user_deleted");

    let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE id = ?1")
        .bind(student)
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(remaining, 0);

    let placeholder = sqlx::query("SELECT username, is_placeholder FROM users WHERE id = ?1")
        .bind(summary.placeholder_user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(placeholder.get::<String, _>("username"), "deleted");
    assert!(placeholder.get::<bool, _>("is_placeholder"));
}

#[tokio::test]
async fn placeholder_is_reused_across_deletions() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;

    let first = ownership_service::delete_user(&engine, admin, a, now()).await.unwrap();
    let second = ownership_service::delete_user(&engine, admin, b, now()).await.unwrap();
    assert_eq!(first.placeholder_user_id, second.placeholder_user_id);

    let err = ownership_service::delete_user(&engine, admin, first.placeholder_user_id, now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn only_admins_delete_users() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;

    let err = ownership_service::delete_user(&engine, a, b, now()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn deleting_an_activity_releases_only_upcoming_signups() {
    let engine = engine(config(true)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let a = user(&pool, "alice", "student").await;
    let b = user(&pool, "bob", "student").await;
    let yesterday = block(&pool, today() - Duration::days(1), "A").await;
    let current = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    let past_sa = schedule(&pool, yesterday, chess, None).await;
    let current_sa = schedule(&pool, current, chess, Some(1)).await;

    engine.signup(a, None, yesterday, chess, false, now()).await.unwrap();
    engine.signup(a, None, current, chess, false, now()).await.unwrap();
    engine.signup(b, None, current, chess, false, now()).await.unwrap();
    assert_eq!(waitlist_len(&pool, current_sa).await, 1);

    let summary = ownership_service::delete_activity(&engine, admin, chess, now()).await.unwrap();
    assert_eq!(summary.released_signups, 1);
    assert_eq!(summary.dropped_waitlist_entries, 1);

    assert_eq!(member_count(&pool, past_sa).await, 1);
    assert_eq!(held(&pool, a, yesterday).await, Some(past_sa));
    assert_eq!(member_count(&pool, current_sa).await, 0);
    assert_eq!(held(&pool, b, current).await, None);

    match engine.signup(b, None, current, chess, false, now()).await.unwrap() {
        SignupOutcome::Rejected(report) => {
            assert!(report.violations.contains(&ViolationKind::ActivityDeleted))
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn placeholder_name_held_by_a_real_account_blocks_deletion() {
    let engine = engine(config(false)).await;
    let pool = engine.pool().clone();
    let admin = user(&pool, "root", "admin").await;
    let squatter = user(&pool, "deleted", "student").await;
    let student = user(&pool, "sam", "student").await;
    let blk = block(&pool, today(), "A").await;
    let chess = activity(&pool, "Chess").await;
    let sa = schedule(&pool, blk, chess, None).await;
    engine.signup(squatter, None, blk, chess, false, now()).await.unwrap();
    engine.signup(student, None, blk, chess, false, now()).await.unwrap();

    for target in [squatter, student] {
        let err = ownership_service::delete_user(&engine, admin, target, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
    }

    // Nothing was applied.
    assert_eq!(member_count(&pool, sa).await, 2);
    assert_eq!(held(&pool, squatter, blk).await, Some(sa));
    assert_eq!(held(&pool, student, blk).await, Some(sa));
    let archived: i64 = sqlx::query("SELECT COUNT(*) AS n FROM signup_archive")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(archived, 0);
    let flagged: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE is_placeholder = 1")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(flagged, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deleting_a_user_while_they_sign_up_is_all_or_nothing() {
    for round in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        let engine = file_engine(&dir, config(false)).await;
        let pool = engine.pool().clone();
        let admin = user(&pool, "root", "admin").await;
        let student = user(&pool, "sam", "student").await;
        let mut scheduled = Vec::new();
        for letter in ["A", "B", "C", "D", "E"] {
            let blk = block(&pool, today(), letter).await;
            let chess = activity(&pool, &format!("Chess {letter}")).await;
            scheduled.push((blk, chess, schedule(&pool, blk, chess, None).await));
        }

        let mut signups = Vec::new();
        for &(blk, chess, _) in &scheduled {
            let engine = engine.clone();
            signups.push(tokio::spawn(async move {
                engine.signup(student, None, blk, chess, false, now()).await
            }));
        }
        let deletion = {
            let engine = engine.clone();
            tokio::spawn(async move { ownership_service::delete_user(&engine, admin, student, now()).await })
        };

        let summary = deletion.await.unwrap();
        assert!(summary.is_ok(), "round {round}: {summary:?}");
        for handle in signups {
            match handle.await.unwrap() {
                Ok(_) | Err(AppError::NotFound("user")) => {}
                Err(e) => panic!("round {round}: unexpected signup error {e:?}"),
            }
        }

        let users: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE id = ?1")
            .bind(student)
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(users, 0, "round {round}");
        let live: i64 = sqlx::query("SELECT COUNT(*) AS n FROM signups WHERE user_id = ?1")
            .bind(student)
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(live, 0, "round {round}");
        for &(_, _, sa) in &scheduled {
            assert_eq!(member_count(&pool, sa).await, 0, "round {round}");
        }
    }
}
