//! Integration tests against a real IMAP server.
//!
//! Disabled by default. To run them:
//!
//! ```bash
//! export MAILHOOK_TEST_HOST="imap.example.com"
//! export MAILHOOK_TEST_USERNAME="bot@example.com"
//! export MAILHOOK_TEST_PASSWORD="your-app-password"
//!
//! cargo test --features integration-tests -- --ignored
//! ```

use chrono::Utc;
use mailhook::{ErrorCategory, ImapStore, MailSession, MailStore, PollConfig};
use std::env;
use std::sync::Arc;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Test Configuration Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get_test_config() -> Option<PollConfig> {
    dotenvy::dotenv().ok();
    let host = env::var("MAILHOOK_TEST_HOST").ok()?;
    let username = env::var("MAILHOOK_TEST_USERNAME").ok()?;
    let password = env::var("MAILHOOK_TEST_PASSWORD").ok()?;

    PollConfig::builder()
        .host(host)
        .username(username)
        .password(password)
        .webhook_url("http://127.0.0.1:9/unused")
        .build()
        .ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_full_session_cycle() {
    let config = Arc::new(get_test_config().expect("Test config from environment variables"));
    let store = ImapStore::new(Arc::clone(&config));

    let mut session = store.open().await.expect("Failed to open session");
    session
        .select_mailbox(&config.mailbox)
        .await
        .expect("Failed to select mailbox");

    let cutoff = Utc::now() - chrono::Duration::hours(24);
    let uids = session.search_since(cutoff).await.expect("Search failed");

    let outcome = session.fetch_messages(&uids).await.expect("Fetch failed");
    assert_eq!(outcome.messages.len() + outcome.skipped.len(), uids.len());
    assert!(outcome.messages.windows(2).all(|w| w[0].uid < w[1].uid));

    session.close().await.expect("Failed to logout");
    session.close().await.expect("Second close is a no-op");
}

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_missing_mailbox() {
    let config = Arc::new(get_test_config().expect("Test config from environment variables"));
    let store = ImapStore::new(config);

    let mut session = store.open().await.expect("Failed to open session");
    let err = session
        .select_mailbox("Definitely/Not/A/Mailbox")
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Mailbox);

    session.close().await.ok();
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires real IMAP server"]
async fn test_invalid_credentials() {
    let base = get_test_config().expect("Test config from environment variables");
    let config = PollConfig::builder()
        .host(base.host)
        .username(base.username)
        .password("wrong-password")
        .webhook_url("http://127.0.0.1:9/unused")
        .build()
        .expect("valid config structure");

    let err = ImapStore::new(Arc::new(config)).open().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authentication);
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let config = PollConfig::builder()
        .host("127.0.0.1")
        .port(9)
        .username("bot")
        .password("secret")
        .webhook_url("http://127.0.0.1:9/unused")
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("valid config structure");

    let err = ImapStore::new(Arc::new(config)).open().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(!err.is_fatal());
}
