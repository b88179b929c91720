//! Error types for the mailhook crate.
//!
//! Errors are grouped by the stage of a poll cycle that produced them - see
//! [`Error::category`]. Only configuration errors are fatal; every other error
//! aborts the current cycle and leaves the next one unaffected (see
//! [`Error::is_fatal`]).

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling the mailbox or delivering notifications.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration errors (FATAL - refuse to start)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid or missing configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Configuration file could not be read.
    #[error("failed to read configuration file {path}")]
    ConfigRead {
        /// Path of the configuration file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for the expected schema.
    #[error("failed to parse configuration file {path}")]
    ConfigParse {
        /// Path of the configuration file.
        path: String,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Connection errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect via SOCKS5 proxy.
    #[error("failed to connect via SOCKS5 proxy {proxy_host} to {target}")]
    Socks5Connect {
        /// The SOCKS5 proxy hostname.
        proxy_host: String,
        /// The target address.
        target: String,
        /// The underlying SOCKS5 error.
        #[source]
        source: tokio_socks::Error,
    },

    /// Connection timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication errors
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP login rejected.
    #[error("IMAP login failed for {username}")]
    ImapLogin {
        /// The username used for login.
        username: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {username} after {timeout:?}")]
    AuthTimeout {
        /// The username used for authentication.
        username: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Mailbox selection errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Search errors
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP search failed.
    #[error("IMAP search failed for query '{query}'")]
    ImapSearch {
        /// The search query sent to the server.
        query: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Search timeout.
    #[error("IMAP search timeout after {timeout:?}")]
    SearchTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Fetch errors
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP fetch command rejected.
    #[error("IMAP fetch failed for UID set {uid_set}")]
    ImapFetch {
        /// The UID set that failed.
        uid_set: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Message fetch timeout.
    #[error("message fetch timeout for UID set {uid_set} after {timeout:?}")]
    FetchTimeout {
        /// The UID set being fetched.
        uid_set: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Logout errors (not critical - the connection is dropped regardless)
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Logout timeout.
    #[error("logout timeout after {timeout:?}")]
    LogoutTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Delivery errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Webhook request could not be sent.
    #[error("failed to send webhook request")]
    WebhookRequest {
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// Webhook answered with a non-success status.
    #[error("webhook returned status {status}: {body}")]
    WebhookStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Webhook delivery timeout.
    #[error("webhook delivery timeout after {timeout:?}")]
    DeliveryTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Scheduling errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Polling interval is zero.
    #[error("polling interval must be greater than zero")]
    InvalidInterval,

    /// No tokio runtime available to register the timer on.
    #[error("scheduler requires a running tokio runtime")]
    NoRuntime,
}

impl Error {
    /// Returns `true` if this error must stop the process from starting.
    ///
    /// Everything except configuration errors is cycle-local: the cycle is
    /// aborted and logged, and the next tick proceeds normally.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfig { .. }
            | Error::ConfigRead { .. }
            | Error::ConfigParse { .. }
            | Error::InvalidDnsName { .. } => ErrorCategory::Configuration,

            Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::Socks5Connect { .. }
            | Error::ConnectTimeout { .. } => ErrorCategory::Connection,

            Error::ImapLogin { .. } | Error::AuthTimeout { .. } => ErrorCategory::Authentication,

            Error::SelectMailbox { .. } | Error::SelectTimeout { .. } => ErrorCategory::Mailbox,

            Error::ImapSearch { .. } | Error::SearchTimeout { .. } => ErrorCategory::Search,

            Error::ImapFetch { .. } | Error::FetchTimeout { .. } => ErrorCategory::Fetch,

            Error::ImapLogout { .. } | Error::LogoutTimeout { .. } => ErrorCategory::Logout,

            Error::WebhookRequest { .. }
            | Error::WebhookStatus { .. }
            | Error::DeliveryTimeout { .. } => ErrorCategory::Delivery,

            Error::InvalidInterval | Error::NoRuntime => ErrorCategory::Schedule,
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Error categories, one per stage of a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid or missing settings.
    Configuration,
    /// Network handshake or TLS negotiation failures.
    Connection,
    /// Rejected credentials.
    Authentication,
    /// Missing or inaccessible mailbox.
    Mailbox,
    /// Message search failures.
    Search,
    /// Message fetch failures.
    Fetch,
    /// Session release failures.
    Logout,
    /// Notification delivery failures.
    Delivery,
    /// Timer registration failures.
    Schedule,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Connection => write!(f, "connection"),
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::Mailbox => write!(f, "mailbox"),
            ErrorCategory::Search => write!(f, "search"),
            ErrorCategory::Fetch => write!(f, "fetch"),
            ErrorCategory::Logout => write!(f, "logout"),
            ErrorCategory::Delivery => write!(f, "delivery"),
            ErrorCategory::Schedule => write!(f, "schedule"),
        }
    }
}
