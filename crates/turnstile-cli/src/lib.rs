//! # turnstile-cli
//!
//! Command-line harness for the Turnstile runtime.
//!
//! ## Commands
//!
//! - `turnstile config`: Show the effective configuration
//! - `turnstile exec`: Drive a command through the shell session manager
//! - `turnstile simulate`: Push jobs through the lane scheduler and watch the events

pub mod commands;

pub use commands::Cli;
