//! Shared modules used by both the control clients and the daemon

pub mod config;
pub mod paths;
