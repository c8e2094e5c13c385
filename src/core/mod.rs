//! Core functionality for the batch gateway
//!
//! This module contains the batch protocol engine, the dispatcher contract
//! and the in-memory reference store.

pub mod batch;
pub mod store;
pub mod traits;
