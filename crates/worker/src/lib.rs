//! Background worker that drains the Plateful notification queues.
//!
//! Two independent Redis queues feed this process: staff notification
//! jobs and completed-order emails. The scheduler alternates bounded
//! batch runs across both, sleeping between cycles according to a
//! three-tier backoff policy (drain fast when productive, idle slow,
//! back off harder on broker errors). The loop never exits on a
//! processing error — only on a shutdown signal.

pub mod backoff;
pub mod batch;
pub mod dedup;
pub mod delivery;
pub mod processor;
pub mod scheduler;
