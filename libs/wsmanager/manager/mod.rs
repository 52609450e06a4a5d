//! # Connection manager
//!
//! Owns the connection lifecycle and the reconnect schedule.

pub mod manager;

pub use manager::WsManager;
