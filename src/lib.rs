//! Automated content pipeline: polls each user's RSS feeds, generates
//! draft articles with a configurable AI provider and publishes them to
//! WordPress, tracking every post through a lifecycle state machine with
//! a per-post audit log.

pub mod ai;
pub mod config;
pub mod db;
pub mod feed;
pub mod generator;
pub mod pipeline;
pub mod publisher;
pub mod scheduler;
