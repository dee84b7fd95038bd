#![allow(clippy::manual_unwrap_or_default)]
#![allow(clippy::manual_unwrap_or)]

pub mod constants;
pub mod events;
pub mod frames;
pub mod health;
pub mod logging;
pub mod main_helper;
pub mod processor;
pub mod proxy;
pub mod spindle_log;
pub mod str_utils;
pub mod types;

pub use types::*;

pub use main_helper::{AppState, Args};
