pub mod admin_service;
pub mod archive_service;
pub mod block_lock_service;
pub mod capacity_ledger;
pub mod notification_service;
pub mod ownership_service;
pub mod rules;
pub mod signup_context;
pub mod signup_service;
pub mod violations;
pub mod waitlist_service;
