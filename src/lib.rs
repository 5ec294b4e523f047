//! autolockd - screen lock daemon for X11 sessions.
//!
//! Locks the screen after a period of inactivity, before the system sleeps
//! and when the lid closes. Other programs can suppress automatic locking
//! with inhibitions, and the daemon is controlled over the session bus as
//! `net.zombofant.autolockd`.

pub mod config;
pub mod control;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod idle;
pub mod inhibit;
pub mod locker;
pub mod power;
