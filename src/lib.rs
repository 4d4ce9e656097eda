pub mod cli;
pub mod commands;
pub mod compose;
pub mod config;
pub mod docker;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod pipeline;
pub mod platform;
pub mod ready;
pub mod ui;
