//! The `dailypaper` command line.
//!
//! Wires the SQLite store, the HTTP collaborators and the recommendation
//! engine together behind a clap interface. Settings come from
//! `~/.dailypaper/config.toml`, `DAILYPAPER_*` variables and flags, in
//! increasing order of precedence.

mod app;
mod cli;
mod commands;
pub mod config;

pub use app::run;
