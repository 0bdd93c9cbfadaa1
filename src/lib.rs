// ABOUTME: Library module for sqlite-merge
// ABOUTME: Exports the dump rewrite pipeline, merge driver, and supporting modules

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod migration;
pub mod rewrite;
pub mod utils;
