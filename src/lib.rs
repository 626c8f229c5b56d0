//! Extracts ChatGPT and Claude conversations from page snapshots, watches
//! pages for rate-limit notices and produces summaries that carry a
//! conversation over into a fresh session.

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod render;
pub mod services;
pub mod session;
pub mod watcher;
