pub use flume;
#[cfg(feature = "select_rs")]
pub use select;
#[cfg(feature = "select_rs")]
mod select_document;

mod _prelude;
pub mod prelude;

mod state;
mod task_processor;
mod task_queue;
mod task_scheduler;

pub mod config;
pub mod payload;
pub mod pipeline;
pub mod stages;
pub mod transport;
pub mod types;

mod crawler;
pub use crawler::*;
pub use pipeline::{Action, Stage};
pub use state::CrawlStats;
pub use task_queue::TaskQueue;
