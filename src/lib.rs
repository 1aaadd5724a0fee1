//! Earnings-announcement reconciliation and abnormal-return outcomes.
//!
//! Raw announcements from two providers are classified against the US
//! session (America/New_York, DST-aware), merged into one canonical event per
//! ticker and effective date, and scored against a benchmark over 1-day,
//! 3-day and 1-week trading horizons.

pub mod config;
pub mod models;
pub mod service;
