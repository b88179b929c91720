//! # mailhook
//!
//! Polls an IMAP mailbox on a fixed interval and forwards new, unread mail from
//! allowed sender domains to a chat webhook as one summary per poll.
//!
//! The crate is organised around a single poll cycle:
//!
//! - [`session`]: one connect → authenticate → select → search → fetch → close
//!   sequence against the mail store, every step bounded by a timeout
//! - [`filter`]: pure sender-domain and unread filtering
//! - [`pipeline`]: runs a cycle and hands qualifying messages to a [`Notifier`]
//! - [`scheduler`]: fires cycles on a timer, never two at once
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailhook::{CheckPipeline, ImapStore, PollConfig, Scheduler, WebhookNotifier};
//! use std::sync::Arc;
//!
//! # async fn example() -> mailhook::Result<()> {
//! let config = Arc::new(PollConfig::load()?);
//!
//! let pipeline = Arc::new(CheckPipeline::new(
//!     &config,
//!     ImapStore::new(Arc::clone(&config)),
//!     WebhookNotifier::new(&config),
//! ));
//!
//! let scheduler = Scheduler::start(config.interval, move || {
//!     let pipeline = Arc::clone(&pipeline);
//!     async move { pipeline.run_cycle().await }
//! })?;
//!
//! tokio::signal::ctrl_c().await.ok();
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Only configuration errors are fatal ([`Error::is_fatal`]). Everything that
//! goes wrong inside a cycle is logged with its [`ErrorCategory`] and the next
//! cycle runs as scheduled.
//!
//! ## Observability
//!
//! All operations emit `tracing` spans:
//!
//! - `pipeline::run_cycle` - one poll cycle
//! - `scheduler::tick` - one timer tick
//! - `session::open`, `session::authenticate`, `session::select`,
//!   `session::search_since`, `session::fetch`, `session::close`
//! - `connection::open` - TCP/TLS handshake
//! - `notifier::deliver` - webhook delivery

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod error;
pub mod filter;
pub mod message;
pub mod notifier;
pub mod pipeline;
pub mod proxy;
pub mod scheduler;
pub mod session;

// Internal modules
mod connection;
mod parser;

// Re-exports for ergonomic API
pub use config::{PollConfig, PollConfigBuilder, TimeoutConfig};
pub use error::{Error, ErrorCategory, Result};
pub use filter::DomainAllowList;
pub use message::{MailMessage, NotificationBatch};
pub use notifier::{Notifier, WebhookNotifier};
pub use parser::SkipReason;
pub use pipeline::{CheckPipeline, CycleReport};
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use scheduler::{Scheduler, SchedulerState};
pub use session::{FetchOutcome, FetchSkip, ImapStore, MailSession, MailStore, SessionGuard};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _ = PollConfig::builder();
        let _ = Socks5Proxy::new("localhost", 1080);
        let _ = DomainAllowList::new(["example.com"]);
        let _ = NotificationBatch::default();
    }
}
