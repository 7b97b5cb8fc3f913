#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Row, SqlitePool};

use eighth::config::EngineConfig;
use eighth::database;
use eighth::services::notification_service::Notifier;
use eighth::services::signup_service::SignupEngine;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn now() -> NaiveDateTime {
    today().and_hms_opt(10, 0, 0).unwrap()
}

pub fn config(enable_waitlist: bool) -> EngineConfig {
    EngineConfig {
        enable_waitlist,
        ..EngineConfig::default()
    }
}

pub async fn engine(config: EngineConfig) -> SignupEngine {
    let pool = database::connect_in_memory().await.unwrap();
    SignupEngine::new(pool, config, Notifier::disabled())
}

/// Engine over a WAL file database, for tests that race several connections.
pub async fn file_engine(dir: &tempfile::TempDir, config: EngineConfig) -> Arc<SignupEngine> {
    let url = format!("sqlite://{}", dir.path().join("eighth.db").display());
    let pool = database::connect(&url).await.unwrap();
    Arc::new(SignupEngine::new(pool, config, Notifier::disabled()))
}

pub async fn user(pool: &SqlitePool, username: &str, role: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, role, grade) VALUES (?1, ?2, 10)")
        .bind(username)
        .bind(role)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn block(pool: &SqlitePool, date: NaiveDate, letter: &str) -> i64 {
    sqlx::query("INSERT INTO blocks (date, block_letter) VALUES (?1, ?2)")
        .bind(date)
        .bind(letter)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn set_deadline(pool: &SqlitePool, block_id: i64, deadline: NaiveDateTime) {
    sqlx::query("UPDATE blocks SET signup_deadline = ?1 WHERE id = ?2")
        .bind(deadline)
        .bind(block_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn lock(pool: &SqlitePool, block_id: i64) {
    sqlx::query("UPDATE blocks SET locked = 1 WHERE id = ?1")
        .bind(block_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn activity(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO activities (name) VALUES (?1)")
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// `flag` is one of the boolean activity columns.
pub async fn flag(pool: &SqlitePool, activity_id: i64, flag: &str) {
    let sql = format!("UPDATE activities SET {flag} = 1 WHERE id = ?1");
    sqlx::query(&sql).bind(activity_id).execute(pool).await.unwrap();
}

pub async fn schedule(pool: &SqlitePool, block_id: i64, activity_id: i64, capacity: Option<i64>) -> i64 {
    sqlx::query("INSERT INTO scheduled_activities (block_id, activity_id, capacity) VALUES (?1, ?2, ?3)")
        .bind(block_id)
        .bind(activity_id)
        .bind(capacity)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn sponsor(pool: &SqlitePool, activity_id: i64, name: &str) {
    let sponsor_id = sqlx::query("INSERT INTO sponsors (name) VALUES (?1)")
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
    sqlx::query("INSERT INTO activity_sponsors (activity_id, sponsor_id) VALUES (?1, ?2)")
        .bind(activity_id)
        .bind(sponsor_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn member_count(pool: &SqlitePool, scheduled_activity_id: i64) -> i64 {
    sqlx::query("SELECT member_count FROM scheduled_activities WHERE id = ?1")
        .bind(scheduled_activity_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("member_count")
}

pub async fn archived_count(pool: &SqlitePool, scheduled_activity_id: i64) -> i64 {
    sqlx::query("SELECT archived_member_count FROM scheduled_activities WHERE id = ?1")
        .bind(scheduled_activity_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("archived_member_count")
}

pub async fn signup_rows(pool: &SqlitePool, scheduled_activity_id: i64) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM signups WHERE scheduled_activity_id = ?1")
        .bind(scheduled_activity_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

/// Scheduled activity the user holds in a block, if any.
pub async fn held(pool: &SqlitePool, user_id: i64, block_id: i64) -> Option<i64> {
    sqlx::query("SELECT scheduled_activity_id FROM signups WHERE user_id = ?1 AND block_id = ?2")
        .bind(user_id)
        .bind(block_id)
        .fetch_optional(pool)
        .await
        .unwrap()
        .map(|r| r.get("scheduled_activity_id"))
}

pub async fn waitlist_len(pool: &SqlitePool, scheduled_activity_id: i64) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM waitlist_entries WHERE scheduled_activity_id = ?1")
        .bind(scheduled_activity_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}
