//! pty-tunnel CLI library
//!
//! Argument parsing and the glue between flags, the config file and the
//! two endpoint crates. The binary in `main.rs` only dispatches.

pub mod cli;
pub mod commands;
