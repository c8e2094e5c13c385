//! HTTP route modules

pub mod batch;
