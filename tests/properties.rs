mod common;

use proptest::prelude::*;
use sqlx::{Row, SqlitePool};

use common::*;
use eighth::services::signup_service::SignupEngine;

#[derive(Debug, Clone)]
enum Op {
    Signup { user: usize, block: usize, activity: usize },
    Unsignup { user: usize, block: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..3usize, 0..2usize, 0..3usize)
            .prop_map(|(user, block, activity)| Op::Signup { user, block, activity }),
        1 => (0..3usize, 0..2usize).prop_map(|(user, block)| Op::Unsignup { user, block }),
    ]
}

struct World {
    engine: SignupEngine,
    users: Vec<i64>,
    blocks: Vec<i64>,
    activities: Vec<i64>,
    tutoring: i64,
}

async fn world(enable_waitlist: bool) -> World {
    let engine = engine(config(enable_waitlist)).await;
    let pool = engine.pool().clone();
    let mut users = Vec::new();
    for name in ["alice", "bob", "carol"] {
        users.push(user(&pool, name, "student").await);
    }
    let blocks = vec![block(&pool, today(), "A").await, block(&pool, today(), "B").await];

    let chess = activity(&pool, "Chess").await;
    let robotics = activity(&pool, "Robotics").await;
    let tutoring = activity(&pool, "Tutoring").await;
    flag(&pool, tutoring, "one_a_day").await;
    for &blk in &blocks {
        schedule(&pool, blk, chess, Some(2)).await;
        schedule(&pool, blk, robotics, Some(1)).await;
        schedule(&pool, blk, tutoring, None).await;
    }

    World {
        engine,
        users,
        blocks,
        activities: vec![chess, robotics, tutoring],
        tutoring,
    }
}

async fn check_invariants(pool: &SqlitePool, tutoring: i64) {
    let rows = sqlx::query(
        r#"
SELECT sa.id, sa.capacity, sa.member_count,
       (SELECT COUNT(*) FROM signups s WHERE s.scheduled_activity_id = sa.id) AS actual
FROM scheduled_activities sa
        "#,
    )
    .fetch_all(pool)
    .await
    .unwrap();
    for row in rows {
        let members: i64 = row.get("member_count");
        let actual: i64 = row.get("actual");
        let capacity: Option<i64> = row.get("capacity");
        assert_eq!(members, actual, "counter drifted for {}", row.get::<i64, _>("id"));
        if let Some(cap) = capacity {
            assert!(members <= cap, "over capacity: {members} > {cap}");
        }
    }

    let per_block: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM (SELECT user_id, block_id FROM signups GROUP BY user_id, block_id HAVING COUNT(*) > 1)",
    )
    .fetch_one(pool)
    .await
    .unwrap()
    .get("n");
    assert_eq!(per_block, 0);

    let one_a_day: i64 = sqlx::query(
        r#"
SELECT COUNT(*) AS n FROM (
  SELECT s.user_id, b.date
  FROM signups s
  JOIN scheduled_activities sa ON sa.id = s.scheduled_activity_id
  JOIN blocks b ON b.id = s.block_id
  WHERE sa.activity_id = ?1
  GROUP BY s.user_id, b.date
  HAVING COUNT(*) > 1
)
        "#,
    )
    .bind(tutoring)
    .fetch_one(pool)
    .await
    .unwrap()
    .get("n");
    assert_eq!(one_a_day, 0);
}

async fn run(ops: Vec<Op>, enable_waitlist: bool) {
    let w = world(enable_waitlist).await;
    let pool = w.engine.pool().clone();
    for op in ops {
        match op {
            Op::Signup { user, block, activity } => {
                w.engine
                    .signup(w.users[user], None, w.blocks[block], w.activities[activity], false, now())
                    .await
                    .unwrap();
            }
            Op::Unsignup { user, block } => {
                w.engine
                    .unsignup(w.users[user], None, w.blocks[block], false, now())
                    .await
                    .unwrap();
            }
        }
        check_invariants(&pool, w.tutoring).await;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any sequence of ordinary requests keeps counters exact, capacity
    /// respected and at most one signup per block and one-a-day per day.
    #[test]
    fn prop_request_sequences_keep_ledger_invariants(
        ops in prop::collection::vec(arb_op(), 1..25),
        enable_waitlist in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(run(ops, enable_waitlist));
    }
}
