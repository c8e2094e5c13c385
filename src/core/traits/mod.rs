//! Core traits module
//!
//! Contains the abstract interfaces the batch engine depends on

pub mod dispatcher;

pub use dispatcher::*;
