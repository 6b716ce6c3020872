//! Command-line front end for review-harvest: Chromium-backed browsing,
//! the GigaChat client, configuration loading and the subcommands.

pub mod commands;
pub mod config;
pub mod gigachat;
pub mod renderer;
