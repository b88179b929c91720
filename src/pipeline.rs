//! One poll-and-notify cycle.
//!
//! [`CheckPipeline::run_cycle`] opens a session, searches the
//! [search window](PollConfig::search_window), fetches candidates, closes the session, filters, and hands any
//! qualifying messages to the notifier as a single batch.
//!
//! Every error is returned to the caller and belongs to this cycle only; the
//! pipeline holds no state between cycles.

use crate::config::PollConfig;
use crate::error::Result;
use crate::filter::{self, DomainAllowList};
use crate::message::NotificationBatch;
use crate::notifier::Notifier;
use crate::session::{FetchOutcome, MailSession, MailStore, SessionGuard};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// What a completed cycle did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// UIDs returned by the search.
    pub candidates: usize,
    /// Messages successfully fetched.
    pub fetched: usize,
    /// Messages dropped during fetch.
    pub skipped: usize,
    /// Fetched messages older than the cutoff (same day, earlier time).
    pub outside_window: usize,
    /// Messages delivered in the notification (0 when none was sent).
    pub notified: usize,
}

/// Orchestrates a poll cycle against a [`MailStore`] and a [`Notifier`].
#[derive(Debug)]
pub struct CheckPipeline<M, N> {
    store: M,
    notifier: N,
    mailbox: String,
    window: Duration,
    allow_list: DomainAllowList,
    logout_timeout: Duration,
}

impl<M: MailStore, N: Notifier> CheckPipeline<M, N> {
    /// Creates a pipeline reading mailbox, search window and allow-list from `config`.
    #[must_use]
    pub fn new(config: &PollConfig, store: M, notifier: N) -> Self {
        Self {
            store,
            notifier,
            mailbox: config.mailbox.clone(),
            window: config.search_window(),
            allow_list: config.allow_list.clone(),
            logout_timeout: config.timeouts.logout,
        }
    }

    /// Runs one cycle.
    ///
    /// The session is closed on every path once it has been opened.
    ///
    /// # Errors
    ///
    /// Returns the first connection, authentication, mailbox, search, fetch or
    /// delivery error. None of them affect later cycles.
    #[instrument(name = "pipeline::run_cycle", skip(self), fields(mailbox = %self.mailbox))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cutoff = self.cutoff();
        debug!(cutoff = %cutoff, "Starting cycle");

        let session = self.store.open().await?;
        let mut guard = SessionGuard::new(session, self.logout_timeout);
        let collected = collect(guard.session(), &self.mailbox, cutoff).await;
        guard.close().await;
        let (candidates, outcome) = collected?;

        let mut report = CycleReport {
            candidates,
            fetched: outcome.messages.len(),
            skipped: outcome.skipped.len(),
            ..CycleReport::default()
        };

        let (recent, older): (Vec<_>, Vec<_>) = outcome
            .messages
            .into_iter()
            .partition(|message| message.received_at >= cutoff);
        report.outside_window = older.len();

        let batch = NotificationBatch::new(filter::filter(recent, &self.allow_list));

        if !batch.is_empty() {
            self.notifier.deliver(&batch).await?;
            report.notified = batch.len();
        }

        info!(
            candidates = report.candidates,
            fetched = report.fetched,
            skipped = report.skipped,
            notified = report.notified,
            "Cycle complete"
        );

        Ok(report)
    }

    /// Start of the search window; saturates at the earliest representable time.
    fn cutoff(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Select, search and fetch; returns the candidate count with the fetch result.
async fn collect<S: MailSession>(
    session: &mut S,
    mailbox: &str,
    cutoff: DateTime<Utc>,
) -> Result<(usize, FetchOutcome)> {
    session.select_mailbox(mailbox).await?;

    let uids = session.search_since(cutoff).await?;
    if uids.is_empty() {
        debug!("No candidate messages");
        return Ok((0, FetchOutcome::default()));
    }

    let outcome = session.fetch_messages(&uids).await?;
    Ok((uids.len(), outcome))
}
