//! GreenMate core: domain types for the client-side offline sync queue.
//!
//! This crate is deliberately free of I/O. It defines the queued mutation
//! model, the durable key-value storage contract, and the network
//! availability signal that the offline sync crate builds on.

pub mod errors;
pub mod network;
pub mod storage;
pub mod sync;

pub use errors::{Error, Result, StorageError};
