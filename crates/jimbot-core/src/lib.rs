//! Core domain + application logic for jimbot.
//!
//! This crate is framework-agnostic. Telegram and the HTTP lookups live behind
//! ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod decider;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod history;
pub mod logging;
pub mod memdate;
pub mod messaging;
pub mod ports;
pub mod responder;
pub mod security;
pub mod utils;

pub use errors::{Error, Result};
