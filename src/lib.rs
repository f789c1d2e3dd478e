pub mod api;
pub mod app;
pub mod captions;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod global;
pub mod notify;
pub mod tracker;
