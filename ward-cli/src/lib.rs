//! Ward CLI - Command-line interface for the ward migration safety engine.
//!
//! This crate provides the `ward` binary: it loads project configuration,
//! wires the terminal reporter and prompter into the engine and maps engine
//! errors onto process exit codes.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
