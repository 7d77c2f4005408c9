//! Alert lifecycle engine for a smart home
//!
//! Polls a Prometheus exposition endpoint, evaluates threshold rules against
//! it and keeps a single chat message per alert episode up to date: sent when
//! the first alert fires, edited while the set of alerts changes, followed by
//! an all-clear once everything is back to normal.

pub mod actors;
pub mod alerts;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notification;
pub mod render;
pub mod rules;
pub mod tracker;
pub mod transport;
pub mod util;
pub mod ventilation;
