//! Long-running tasks of the alerter
//!
//! ```text
//!                   ┌──────────────┐
//!                   │  main (bin)  │
//!                   └──────┬───────┘
//!               spawns     │
//!       ┌──────────────────┼──────────────────────┐
//!       │                  │                      │
//! ┌─────▼───────┐   ┌──────▼────────┐   ┌─────────▼──────┐
//! │ PollerActor │   │ ReminderActor │   │ CommandWatcher │
//! └─────┬───────┘   └──────┬────────┘   └─────────┬──────┘
//!       │ fetch / send     │ fetch / weather      │ getUpdates / weather
//!       │ / edit           │ / send               │ / reply (Telegram only)
//!       ▼                  ▼                      ▼
//!  MetricsSource + ChatTransport (shared)
//! ```
//!
//! Each actor runs as its own tokio task and is controlled through a handle
//! wrapping its mpsc command channel. Request/response commands carry a
//! oneshot sender.

pub mod commands;
pub mod messages;
pub mod poller;
pub mod reminder;

pub use commands::CommandWatchHandle;
pub use messages::CycleReport;
pub use poller::{PollerHandle, PollerSettings};
pub use reminder::ReminderHandle;
