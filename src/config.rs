//! Process-wide polling configuration.
//!
//! A [`PollConfig`] is built once at startup, validated, and then shared
//! read-only with the session, notifier and scheduler. Use
//! [`PollConfigBuilder`] directly, or [`PollConfig::load`] to read a YAML file
//! with an environment-variable fallback:
//!
//! ```
//! use mailhook::PollConfig;
//! use std::time::Duration;
//!
//! let config = PollConfig::builder()
//!     .host("imap.example.com")
//!     .username("bot@example.com")
//!     .password("app-password")
//!     .webhook_url("https://discord.com/api/webhooks/1/abc")
//!     .interval(Duration::from_secs(300))
//!     .allowed_domains(["example.com"])
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.server_address(), "imap.example.com:993");
//! ```

use crate::error::{Error, Result};
use crate::filter::DomainAllowList;
use crate::proxy::Socks5Proxy;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default IMAPS port.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Mailbox polled when none is configured.
pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Polling interval used when none is configured.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Lower bound on the search lookback window.
pub const MIN_LOOKBACK: Duration = Duration::from_secs(60);

/// Upper bound on the interval, lookback and every timeout.
pub const MAX_DURATION: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Configuration file read by [`PollConfig::load`] unless overridden.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "MAILHOOK_CONFIG";

const DEFAULT_DESCRIPTION: &str = "Check your inbox for unread emails";

/// Validated polling configuration.
///
/// Create using [`PollConfig::builder()`] or [`PollConfig::load()`].
#[derive(Clone)]
pub struct PollConfig {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    pub port: u16,
    /// Login name.
    pub username: String,
    password: SecretString,
    /// Mailbox to poll.
    pub mailbox: String,
    /// Time between poll cycles.
    pub interval: Duration,
    lookback: Option<Duration>,
    /// Sender domains eligible for notification.
    pub allow_list: DomainAllowList,
    /// Chat webhook receiving the notifications.
    pub webhook_url: Url,
    /// Description line shown under the notification title.
    pub description: String,
    /// Optional SOCKS5 proxy for the IMAP connection.
    pub proxy: Option<Socks5Proxy>,
    /// Per-operation network timeouts.
    pub timeouts: TimeoutConfig,
}

impl std::fmt::Debug for PollConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("mailbox", &self.mailbox)
            .field("interval", &self.interval)
            .field("lookback", &self.lookback())
            .field("allow_list", &self.allow_list)
            .field("webhook_url", &redact_url(&self.webhook_url))
            .field("proxy", &self.proxy)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl PollConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> PollConfigBuilder {
        PollConfigBuilder::default()
    }

    /// Returns the password as a string slice.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Search window for a cycle: the configured lookback, or the interval,
    /// never shorter than [`MIN_LOOKBACK`].
    #[must_use]
    pub fn lookback(&self) -> Duration {
        self.lookback.unwrap_or(self.interval).max(MIN_LOOKBACK)
    }

    /// How far back a cycle looks: [`lookback`](Self::lookback) widened by
    /// the longest a cycle can take ([`TimeoutConfig::cycle_budget`]).
    ///
    /// A late or slow cycle therefore still covers everything that arrived
    /// since the previous cycle searched.
    #[must_use]
    pub fn search_window(&self) -> Duration {
        self.lookback().saturating_add(self.timeouts.cycle_budget())
    }

    /// Loads configuration the way the binary does.
    ///
    /// Reads the YAML file named by `MAILHOOK_CONFIG` (or `config.yaml`); if the
    /// file is missing or invalid, falls back to environment variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither source yields a valid config.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        match Self::from_yaml_file(&path) {
            Ok(config) => {
                debug!(path = %path, "Loaded configuration file");
                Ok(config)
            }
            Err(e) => {
                if !matches!(&e, Error::ConfigRead { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
                {
                    warn!(path = %path, error = %e, "Ignoring configuration file, using environment");
                }
                Self::from_env()
            }
        }
    }

    /// Reads and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_yaml(&contents, &path.display().to_string())
    }

    /// Parses and validates YAML configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Self::parse_yaml(contents, "<inline>")
    }

    fn parse_yaml(contents: &str, origin: &str) -> Result<Self> {
        let file: FileConfig =
            serde_yaml::from_str(contents).map_err(|source| Error::ConfigParse {
                path: origin.to_string(),
                source,
            })?;
        file.into_builder().build()
    }

    /// Builds configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if required variables are missing.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Recognised keys: `MAIL_HOST`, `MAIL_PORT`, `MAIL_USERNAME`,
    /// `MAIL_PASSWORD`, `MAIL_MAILBOX`, `MAIL_CHECK_INTERVAL`,
    /// `MAIL_ALLOWED_DOMAINS` (comma-separated) and `DISCORD_WEBHOOK_URL`.
    /// An unparsable port or interval falls back to its default.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if required variables are missing.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = PollConfig::builder();

        if let Some(host) = lookup("MAIL_HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = lookup("MAIL_PORT").and_then(|p| p.trim().parse().ok()) {
            builder = builder.port(port);
        }
        if let Some(username) = lookup("MAIL_USERNAME") {
            builder = builder.username(username);
        }
        if let Some(password) = lookup("MAIL_PASSWORD") {
            builder = builder.password(password);
        }
        if let Some(mailbox) = lookup("MAIL_MAILBOX") {
            builder = builder.mailbox(mailbox);
        }
        if let Some(interval) = lookup("MAIL_CHECK_INTERVAL").and_then(|i| parse_duration(&i)) {
            builder = builder.interval(interval);
        }
        if let Some(domains) = lookup("MAIL_ALLOWED_DOMAINS") {
            builder = builder.allowed_domains(domains.split(','));
        }
        if let Some(url) = lookup("DISCORD_WEBHOOK_URL") {
            builder = builder.webhook_url(url);
        }

        builder.build()
    }
}

/// Network timeouts, one per bounded operation.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// TCP connect plus TLS handshake.
    pub connect: Duration,
    /// IMAP LOGIN.
    pub auth: Duration,
    /// IMAP SELECT.
    pub select: Duration,
    /// IMAP UID SEARCH.
    pub search: Duration,
    /// IMAP UID FETCH, including draining the response.
    pub fetch: Duration,
    /// IMAP LOGOUT.
    pub logout: Duration,
    /// Webhook delivery.
    pub notify: Duration,
}

impl TimeoutConfig {
    /// Longest a single cycle can run: every bounded step added up.
    #[must_use]
    pub fn cycle_budget(&self) -> Duration {
        self.entries()
            .iter()
            .fold(Duration::ZERO, |total, (_, timeout)| total.saturating_add(*timeout))
    }

    fn entries(&self) -> [(&'static str, Duration); 7] {
        [
            ("connect", self.connect),
            ("auth", self.auth),
            ("select", self.select),
            ("search", self.search),
            ("fetch", self.fetch),
            ("logout", self.logout),
            ("notify", self.notify),
        ]
    }

    fn validate(&self) -> Result<()> {
        for (name, timeout) in self.entries() {
            if timeout.is_zero() {
                return Err(Error::invalid_config(format!(
                    "{name} timeout must be greater than zero"
                )));
            }
            if timeout > MAX_DURATION {
                return Err(Error::invalid_config(format!(
                    "{name} timeout must not exceed {} days",
                    MAX_DURATION.as_secs() / 86_400
                )));
            }
        }
        Ok(())
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(30),
            search: Duration::from_secs(30),
            fetch: Duration::from_secs(30),
            logout: Duration::from_secs(5),
            notify: Duration::from_secs(30),
        }
    }
}

/// Builder for [`PollConfig`].
#[derive(Debug, Default)]
pub struct PollConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    mailbox: Option<String>,
    interval: Option<Duration>,
    lookback: Option<Duration>,
    allowed_domains: Vec<String>,
    webhook_url: Option<String>,
    description: Option<String>,
    proxy: Option<Socks5Proxy>,
    timeouts: Option<TimeoutConfig>,
}

impl PollConfigBuilder {
    /// Sets the IMAP server hostname (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default is 993.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the login name (required).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password (required).
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the mailbox to poll. Default is `INBOX`.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = Some(mailbox.into());
        self
    }

    /// Sets the polling interval. Default is one hour.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Overrides the search lookback window (defaults to the interval).
    #[must_use]
    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.lookback = Some(lookback);
        self
    }

    /// Sets the sender domains eligible for notification.
    #[must_use]
    pub fn allowed_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the webhook URL (required).
    #[must_use]
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Sets the description line of the notification.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Routes the IMAP connection through a SOCKS5 proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets all network timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the webhook delivery timeout.
    #[must_use]
    pub fn notify_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .notify = timeout;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a required field is missing or
    /// empty, the webhook URL is not an absolute http(s) URL, the interval or
    /// any timeout is zero, or a duration exceeds [`MAX_DURATION`].
    pub fn build(self) -> Result<PollConfig> {
        let host = required(self.host, "mail host")?;
        let username = required(self.username, "mail username")?;
        let password = required(self.password, "mail password")?;
        let webhook_raw = required(self.webhook_url, "discord webhook URL")?;
        let webhook_url = parse_webhook_url(&webhook_raw)?;

        let interval = self.interval.unwrap_or(DEFAULT_CHECK_INTERVAL);
        if interval.is_zero() {
            return Err(Error::invalid_config("check interval must be greater than zero"));
        }
        if interval > MAX_DURATION {
            return Err(Error::invalid_config("check interval is too long"));
        }
        if self.lookback.is_some_and(|l| l > MAX_DURATION) {
            return Err(Error::invalid_config("lookback is too long"));
        }

        let timeouts = self.timeouts.unwrap_or_default();
        timeouts.validate()?;

        let port = self.port.unwrap_or(DEFAULT_IMAP_PORT);
        if port == 0 {
            return Err(Error::invalid_config("mail port must be non-zero"));
        }

        let mailbox = self
            .mailbox
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MAILBOX.to_string());

        Ok(PollConfig {
            host: host.trim().to_string(),
            port,
            username,
            password: SecretString::from(password),
            mailbox,
            interval,
            lookback: self.lookback.filter(|l| !l.is_zero()),
            allow_list: DomainAllowList::new(&self.allowed_domains),
            webhook_url,
            description: self
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            proxy: self.proxy,
            timeouts,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::invalid_config(format!("{name} is required")))
}

fn parse_webhook_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::invalid_config(format!("discord webhook URL is invalid: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::invalid_config(format!(
            "discord webhook URL must use http or https, not '{other}'"
        ))),
    }
}

/// Webhook URLs embed their token in the path; only the origin is safe to print.
fn redact_url(url: &Url) -> String {
    format!("{}://{}/[REDACTED]", url.scheme(), url.host_str().unwrap_or(""))
}

/// Parses a Go-style duration such as `1h`, `1h30m`, `45s` or `500ms`.
///
/// Returns `None` for empty input, unknown units, or a number without a unit
/// (except the bare `0`).
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_end] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total = total.checked_add(Duration::try_from_secs_f64(value * seconds_per_unit).ok()?)?;
        rest = &rest[unit_end..];
    }

    Some(total)
}

// ─────────────────────────────────────────────────────────────────────────────
// File schema
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FileConfig {
    mail: MailSection,
    discord: DiscordSection,
    #[serde(default)]
    timeouts: TimeoutSection,
}

#[derive(Debug, Deserialize)]
struct MailSection {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    mailbox: Option<String>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    check_interval: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    lookback: Option<Duration>,
    #[serde(default)]
    allowed_domains: Vec<String>,
    proxy: Option<ProxySection>,
}

#[derive(Debug, Deserialize)]
struct DiscordSection {
    webhook_url: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxySection {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeoutSection {
    #[serde(default, deserialize_with = "deserialize_duration")]
    connect: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    auth: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    select: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    search: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    fetch: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    logout: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration")]
    notify: Option<Duration>,
}

impl TimeoutSection {
    fn into_timeouts(self) -> TimeoutConfig {
        let defaults = TimeoutConfig::default();
        TimeoutConfig {
            connect: self.connect.unwrap_or(defaults.connect),
            auth: self.auth.unwrap_or(defaults.auth),
            select: self.select.unwrap_or(defaults.select),
            search: self.search.unwrap_or(defaults.search),
            fetch: self.fetch.unwrap_or(defaults.fetch),
            logout: self.logout.unwrap_or(defaults.logout),
            notify: self.notify.unwrap_or(defaults.notify),
        }
    }
}

impl FileConfig {
    fn into_builder(self) -> PollConfigBuilder {
        let mail = self.mail;
        PollConfigBuilder {
            host: mail.host,
            port: mail.port,
            username: mail.username,
            password: mail.password,
            mailbox: mail.mailbox,
            interval: mail.check_interval,
            lookback: mail.lookback,
            allowed_domains: mail.allowed_domains,
            webhook_url: self.discord.webhook_url,
            description: self.discord.description,
            proxy: mail.proxy.map(|p| match (p.username, p.password) {
                (Some(user), Some(pass)) => Socks5Proxy::with_auth(p.host, p.port, user, pass),
                _ => Socks5Proxy::new(p.host, p.port),
            }),
            timeouts: Some(self.timeouts.into_timeouts()),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|text| {
        parse_duration(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{text}'")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> PollConfigBuilder {
        PollConfig::builder()
            .host("imap.example.com")
            .username("bot@example.com")
            .password("secret")
            .webhook_url("https://discord.com/api/webhooks/123/token-abc")
    }

    #[test]
    fn test_builder_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.port, 993);
        assert_eq!(config.mailbox, "INBOX");
        assert_eq!(config.interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(config.lookback(), DEFAULT_CHECK_INTERVAL);
        assert!(config.allow_list.is_empty());
        assert_eq!(config.password(), "secret");
        assert_eq!(config.timeouts.connect, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_missing_required_fields() {
        assert!(PollConfig::builder().build().is_err());
        assert!(minimal().host("  ").build().is_err());
        assert!(minimal().username("").build().is_err());
        assert!(minimal().password("").build().is_err());
        assert!(minimal().webhook_url("").build().is_err());
    }

    #[test]
    fn test_builder_errors_are_fatal() {
        let err = minimal().host("").build().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("mail host is required"));
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let err = minimal().interval(Duration::ZERO).build().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_builder_rejects_bad_webhook() {
        assert!(minimal().webhook_url("not a url").build().is_err());
        assert!(minimal().webhook_url("ftp://example.com/hook").build().is_err());
    }

    #[test]
    fn test_lookback_clamped() {
        let config = minimal().interval(Duration::from_secs(10)).build().unwrap();
        assert_eq!(config.lookback(), MIN_LOOKBACK);

        let config = minimal()
            .interval(Duration::from_secs(300))
            .lookback(Duration::from_secs(900))
            .build()
            .unwrap();
        assert_eq!(config.lookback(), Duration::from_secs(900));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let err = minimal()
            .connect_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("connect timeout"));

        let timeouts = TimeoutConfig {
            fetch: Duration::ZERO,
            ..TimeoutConfig::default()
        };
        assert!(minimal().timeouts(timeouts).build().is_err());
    }

    #[test]
    fn test_builder_rejects_oversized_durations() {
        let too_long = MAX_DURATION + Duration::from_secs(1);
        assert!(minimal().interval(too_long).build().is_err());
        assert!(minimal().lookback(too_long).build().is_err());
        assert!(minimal().notify_timeout(too_long).build().is_err());
        assert!(minimal().interval(MAX_DURATION).build().is_ok());
    }

    #[test]
    fn test_search_window_adds_cycle_budget() {
        let config = minimal().interval(Duration::from_secs(60)).build().unwrap();

        // 6 x 30s + 5s logout
        assert_eq!(config.timeouts.cycle_budget(), Duration::from_secs(185));
        assert_eq!(config.search_window(), Duration::from_secs(245));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = minimal().password("super-secret-password").build().unwrap();
        let debug_str = format!("{config:?}");

        assert!(!debug_str.contains("super-secret-password"));
        assert!(!debug_str.contains("token-abc"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration("h"), None);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r"
mail:
  host: imap.example.com
  port: 994
  username: bot@example.com
  password: secret
  check_interval: 15m
  allowed_domains:
    - Example.com
    - partner.org
  proxy:
    host: 127.0.0.1
    port: 1080
discord:
  webhook_url: https://discord.com/api/webhooks/1/abc
  description: Check the shared inbox
timeouts:
  connect: 10s
";
        let config = PollConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.port, 994);
        assert_eq!(config.interval, Duration::from_secs(900));
        assert_eq!(
            config.allow_list.iter().collect::<Vec<_>>(),
            ["example.com", "partner.org"]
        );
        assert_eq!(config.description, "Check the shared inbox");
        assert!(config.proxy.is_some());
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.timeouts.logout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_yaml_invalid_duration() {
        let yaml = r"
mail:
  host: imap.example.com
  username: bot
  password: secret
  check_interval: soon
discord:
  webhook_url: https://discord.com/api/webhooks/1/abc
";
        let err = PollConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_yaml_zero_timeout_rejected() {
        let yaml = r"
mail:
  host: imap.example.com
  username: bot
  password: secret
discord:
  webhook_url: https://discord.com/api/webhooks/1/abc
timeouts:
  connect: 0s
";
        let err = PollConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_yaml_file_missing() {
        let err = PollConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_from_env() {
        let vars: HashMap<&str, &str> = [
            ("MAIL_HOST", "imap.example.com"),
            ("MAIL_PORT", "not-a-port"),
            ("MAIL_USERNAME", "bot"),
            ("MAIL_PASSWORD", "secret"),
            ("MAIL_CHECK_INTERVAL", "5m"),
            ("MAIL_ALLOWED_DOMAINS", "example.com, partner.org"),
            ("DISCORD_WEBHOOK_URL", "https://discord.com/api/webhooks/1/abc"),
        ]
        .into_iter()
        .collect();

        let config =
            PollConfig::from_env_with(|key| vars.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(config.port, 993);
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.allow_list.len(), 2);
    }

    #[test]
    fn test_from_env_missing_webhook() {
        let result = PollConfig::from_env_with(|key| match key {
            "MAIL_HOST" => Some("imap.example.com".into()),
            "MAIL_USERNAME" => Some("bot".into()),
            "MAIL_PASSWORD" => Some("secret".into()),
            _ => None,
        });
        assert!(result.unwrap_err().is_fatal());
    }
}
