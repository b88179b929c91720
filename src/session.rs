//! Mailbox sessions: one connect → authenticate → select → search → fetch →
//! close sequence per poll cycle.
//!
//! The poll pipeline only talks to the [`MailStore`] and [`MailSession`]
//! traits. [`ImapStore`] implements them over IMAP with TLS, bounding every
//! network round-trip with the matching [`TimeoutConfig`] entry.
//!
//! Sessions are never reused across cycles. Wrap one in a [`SessionGuard`] so
//! it is logged out even when the cycle is abandoned before reaching
//! [`SessionGuard::close`].

use crate::config::{PollConfig, TimeoutConfig};
use crate::connection::{self, Endpoint, TlsStream};
use crate::error::{Error, Result};
use crate::message::MailMessage;
use crate::parser::{self, SkipReason};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Items requested for every message: enough for filtering and notification,
/// without touching the body (which would set `\Seen`).
const FETCH_QUERY: &str = "(UID FLAGS ENVELOPE INTERNALDATE)";

/// Opens authenticated sessions against a mail store.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Session type produced by [`open`](Self::open).
    type Session: MailSession;

    /// Connects and authenticates.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the network or TLS handshake fails, or
    /// an authentication error if the credentials are rejected.
    async fn open(&self) -> Result<Self::Session>;
}

/// One authenticated session.
#[async_trait]
pub trait MailSession: Send + 'static {
    /// Selects `name` for the following search and fetch.
    ///
    /// # Errors
    ///
    /// Returns a mailbox error if the mailbox is missing or inaccessible.
    async fn select_mailbox(&mut self, name: &str) -> Result<()>;

    /// Returns UIDs of messages received on or after `cutoff`, ascending.
    ///
    /// The server may only honour the date part of `cutoff`, so results can
    /// include earlier messages from the same day. An empty result is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a search error if the server rejects the search.
    async fn search_since(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<u32>>;

    /// Fetches envelope and flags for `uids`.
    ///
    /// Messages that cannot be read individually are reported in
    /// [`FetchOutcome::skipped`] instead of failing the batch.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the fetch as a whole fails or times out.
    async fn fetch_messages(&mut self, uids: &[u32]) -> Result<FetchOutcome>;

    /// Releases the session. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a logout error if the server does not acknowledge the logout.
    async fn close(&mut self) -> Result<()>;
}

/// Result of a batch fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Successfully read messages, ordered by UID.
    pub messages: Vec<MailMessage>,
    /// Messages that were dropped, with the reason.
    pub skipped: Vec<FetchSkip>,
}

/// A message dropped during fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSkip {
    /// UID, when the server reported one.
    pub uid: Option<u32>,
    /// Why the message was dropped.
    pub reason: SkipReason,
}

// ─────────────────────────────────────────────────────────────────────────────
// IMAP implementation
// ─────────────────────────────────────────────────────────────────────────────

/// [`MailStore`] backed by an IMAP server over TLS.
#[derive(Debug, Clone)]
pub struct ImapStore {
    config: Arc<PollConfig>,
}

impl ImapStore {
    /// Creates a store that connects with `config` on every [`open`](MailStore::open).
    #[must_use]
    pub fn new(config: Arc<PollConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailStore for ImapStore {
    type Session = ImapMailSession;

    #[instrument(
        name = "session::open",
        skip_all,
        fields(imap_host = %self.config.host, username = %self.config.username)
    )]
    async fn open(&self) -> Result<ImapMailSession> {
        let config = &self.config;
        let connection = ImapConnection::connect(
            &config.host,
            config.port,
            config.proxy.as_ref(),
            &config.timeouts,
        )
        .await?;

        connection
            .authenticate(&config.username, config.password())
            .await
    }
}

/// An unauthenticated TLS connection to an IMAP server.
pub struct ImapConnection {
    client: async_imap::Client<TlsStream>,
    timeouts: TimeoutConfig,
}

impl ImapConnection {
    /// Opens the TCP/TLS connection, optionally through a SOCKS5 proxy.
    ///
    /// # Errors
    ///
    /// Returns a connection error on network or TLS failure, or after
    /// `timeouts.connect`.
    pub async fn connect(
        host: &str,
        port: u16,
        proxy: Option<&crate::Socks5Proxy>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self> {
        let endpoint = Endpoint { host, port, proxy };
        let stream = connection::open(&endpoint, timeouts.connect).await?;

        debug!("TLS connection established");

        Ok(Self {
            client: async_imap::Client::new(stream),
            timeouts: timeouts.clone(),
        })
    }

    /// Logs in, turning the connection into a session.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the credentials are rejected or
    /// the server does not answer within `timeouts.auth`.
    #[instrument(name = "session::authenticate", skip_all, fields(username = %username))]
    pub async fn authenticate(self, username: &str, password: &str) -> Result<ImapMailSession> {
        let timeout = self.timeouts.auth;

        let session = tokio::time::timeout(timeout, self.client.login(username, password))
            .await
            .map_err(|_| Error::AuthTimeout {
                username: username.to_string(),
                timeout,
            })?
            .map_err(|(source, _client)| Error::ImapLogin {
                username: username.to_string(),
                source,
            })?;

        debug!("Authenticated");

        Ok(ImapMailSession {
            session,
            timeouts: self.timeouts,
            closed: false,
        })
    }
}

impl std::fmt::Debug for ImapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnection").finish_non_exhaustive()
    }
}

/// Authenticated IMAP session.
pub struct ImapMailSession {
    session: async_imap::Session<TlsStream>,
    timeouts: TimeoutConfig,
    closed: bool,
}

impl std::fmt::Debug for ImapMailSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailSession")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MailSession for ImapMailSession {
    #[instrument(name = "session::select", skip(self))]
    async fn select_mailbox(&mut self, name: &str) -> Result<()> {
        let timeout = self.timeouts.select;

        // EXAMINE keeps the mailbox read-only, so nothing we do changes flags.
        let mailbox = tokio::time::timeout(timeout, self.session.examine(name))
            .await
            .map_err(|_| Error::SelectTimeout {
                mailbox: name.to_string(),
                timeout,
            })?
            .map_err(|source| Error::SelectMailbox {
                mailbox: name.to_string(),
                source,
            })?;

        debug!(exists = mailbox.exists, "Mailbox selected");
        Ok(())
    }

    #[instrument(name = "session::search_since", skip(self), fields(cutoff = %cutoff))]
    async fn search_since(&mut self, cutoff: DateTime<Utc>) -> Result<Vec<u32>> {
        let timeout = self.timeouts.search;
        let query = since_query(cutoff);

        let uids = tokio::time::timeout(timeout, self.session.uid_search(&query))
            .await
            .map_err(|_| Error::SearchTimeout { timeout })?
            .map_err(|source| Error::ImapSearch {
                query: query.clone(),
                source,
            })?;

        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();

        debug!(candidates = uids.len(), query = %query, "Search complete");
        Ok(uids)
    }

    #[instrument(name = "session::fetch", skip_all, fields(requested = uids.len()))]
    async fn fetch_messages(&mut self, uids: &[u32]) -> Result<FetchOutcome> {
        if uids.is_empty() {
            return Ok(FetchOutcome::default());
        }

        let timeout = self.timeouts.fetch;
        let uid_set = uid_set(uids);

        let mut outcome = tokio::time::timeout(timeout, collect_fetch(&mut self.session, &uid_set))
            .await
            .map_err(|_| Error::FetchTimeout {
                uid_set: uid_set.clone(),
                timeout,
            })??;

        outcome.messages.sort_by_key(|m| m.uid);

        debug!(
            fetched = outcome.messages.len(),
            skipped = outcome.skipped.len(),
            "Fetch complete"
        );
        Ok(outcome)
    }

    #[instrument(name = "session::close", skip(self))]
    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let timeout = self.timeouts.logout;
        tokio::time::timeout(timeout, self.session.logout())
            .await
            .map_err(|_| Error::LogoutTimeout { timeout })?
            .map_err(|source| Error::ImapLogout { source })
    }
}

async fn collect_fetch(
    session: &mut async_imap::Session<TlsStream>,
    uid_set: &str,
) -> Result<FetchOutcome> {
    let mut stream = session
        .uid_fetch(uid_set, FETCH_QUERY)
        .await
        .map_err(|source| Error::ImapFetch {
            uid_set: uid_set.to_string(),
            source,
        })?
        .boxed();

    let mut outcome = FetchOutcome::default();

    while let Some(item) = stream.next().await {
        let skip = match item {
            Ok(fetch) => match parser::message_from_fetch(&fetch) {
                Ok(message) => {
                    outcome.messages.push(message);
                    continue;
                }
                Err(reason) => FetchSkip {
                    uid: fetch.uid,
                    reason,
                },
            },
            Err(e) => FetchSkip {
                uid: None,
                reason: SkipReason::Stream(e.to_string()),
            },
        };

        warn!(uid = ?skip.uid, reason = %skip.reason, "Skipping message");
        outcome.skipped.push(skip);
    }

    Ok(outcome)
}

/// IMAP `SINCE` takes a date only (e.g. `SINCE 07-Dec-2025`).
fn since_query(cutoff: DateTime<Utc>) -> String {
    format!("SINCE {}", cutoff.date_naive().format("%d-%b-%Y"))
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ─────────────────────────────────────────────────────────────────────────────
// Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Owns a session and guarantees it is closed.
///
/// Call [`close`](Self::close) on every normal exit path. If the guard is
/// dropped first (a cancelled or panicking cycle), the close is spawned on the
/// current tokio runtime, bounded by the logout timeout.
pub struct SessionGuard<S: MailSession> {
    inner: Option<S>,
    logout_timeout: Duration,
}

impl<S: MailSession> SessionGuard<S> {
    /// Takes ownership of `session`.
    #[must_use]
    pub fn new(session: S, logout_timeout: Duration) -> Self {
        Self {
            inner: Some(session),
            logout_timeout,
        }
    }

    /// Borrows the guarded session.
    ///
    /// # Panics
    ///
    /// Never in practice: the session is only taken by `close` and `drop`,
    /// which both end the guard's life.
    pub fn session(&mut self) -> &mut S {
        self.inner.as_mut().expect("session taken before guard ended")
    }

    /// Closes the session, logging (not returning) any failure.
    pub async fn close(mut self) {
        if let Some(mut session) = self.inner.take() {
            close_logged(&mut session, self.logout_timeout).await;
        }
    }
}

async fn close_logged<S: MailSession>(session: &mut S, timeout: Duration) {
    match tokio::time::timeout(timeout, session.close()).await {
        Ok(Ok(())) => debug!("Session closed"),
        Ok(Err(e)) => warn!(error = %e, "Session logout failed"),
        Err(_) => warn!(timeout_secs = timeout.as_secs(), "Session logout timed out"),
    }
}

impl<S: MailSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        let Some(mut session) = self.inner.take() else {
            return;
        };
        let timeout = self.logout_timeout;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    close_logged(&mut session, timeout).await;
                });
            }
            Err(_) => {
                warn!(
                    "SessionGuard dropped outside of a tokio runtime; \
                     connection closed without IMAP logout"
                );
            }
        }
    }
}

impl<S: MailSession> std::fmt::Debug for SessionGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("open", &self.inner.is_some())
            .field("logout_timeout", &self.logout_timeout)
            .finish()
    }
}
