//! visawatch -- visa-application status watcher.
//!
//! This crate provides the core library for the status check cycle: the
//! persisted status history, change detection, the active-hours gate for the
//! sensitive status, and multi-channel notification dispatch.

pub mod config;
pub mod detect;
pub mod gate;
pub mod manager;
pub mod notify;
pub mod source;
pub mod store;
