//! Queue broker abstraction and its Redis implementation.
//!
//! The worker only ever talks to a broker through the [`QueueClient`]
//! trait: enqueue, fetch a bounded batch, acknowledge, reject. The
//! Redis adapter implements the reliable-queue pattern (ready /
//! processing / dead lists) on top of plain lists.

mod client;
mod redis_queue;

pub use client::QueueClient;
pub use redis_queue::RedisQueueClient;
