//! Adaptive batched retention for redirect-hit and 404 logs.
//!
//! The [`retention::LogFlusher`] keeps both log tables bounded without large
//! deletion bursts. It runs on a recurring trigger, deletes one bounded batch
//! per dataset, and escalates to larger batches on a short cadence only while
//! a large backlog remains.

pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod observability;
pub mod retention;
