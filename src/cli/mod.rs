//! CLI command implementations.

pub mod accounts;
pub mod client;
pub mod config;
pub mod generate;
pub mod parsers;
pub mod switch;
