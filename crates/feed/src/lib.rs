//! Everything involved in getting DocIds from an [`adaptor_domain::Adaptor`]
//! onto the Appliance: composing and sending feed XML, batching with
//! retry, the one-shot gate that keeps a full listing from overlapping
//! itself, the incremental poller, and the cron scheduler glue.

pub mod compose;
pub mod cron;
pub mod gate;
pub mod poll;
pub mod push;
pub mod schedule;
pub mod send;
mod xml_writer;

pub use compose::{compose_feed, compose_named_resources_feed, FeedType};
pub use cron::{CronParseError, CronSchedule};
pub use gate::OneShotGate;
pub use poll::{spawn_incremental_poll, PollHandle};
pub use push::{push_named_resources, FeedPusher, PushOutcome};
pub use schedule::ScheduleHandle;
pub use send::{BackoffPolicy, ErrorHandler, FeedSender, RetryDecision};
