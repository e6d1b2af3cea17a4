//! Command handlers

pub mod config;
pub mod emit;
pub mod replay;
pub mod watch;
