//! Sender-domain and unread filtering for fetched messages.
//!
//! The filter is pure: it only looks at the messages it is given and the
//! allow-list, and never reorders its input.
//!
//! # Example
//!
//! ```
//! use mailhook::filter::{is_allowed, DomainAllowList};
//!
//! let allow_list = DomainAllowList::new(["example.com"]);
//! assert!(is_allowed("user@Example.com", &allow_list));
//! assert!(!is_allowed("user@evilexample.com", &allow_list));
//! assert!(!is_allowed("user@mail.example.com", &allow_list));
//! ```
//!
//! An empty allow-list rejects every sender.

use crate::message::MailMessage;

/// Ordered, case-insensitive set of sender domains eligible for notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainAllowList {
    domains: Vec<String>,
}

impl DomainAllowList {
    /// Builds an allow-list, lowercasing entries and dropping blanks and duplicates.
    ///
    /// A leading `@` on an entry is ignored, so `@example.com` and `example.com`
    /// are the same entry.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Vec::new();
        for domain in domains {
            let normalized = domain
                .as_ref()
                .trim()
                .trim_start_matches('@')
                .to_lowercase();
            if !normalized.is_empty() && !list.contains(&normalized) {
                list.push(normalized);
            }
        }
        Self { domains: list }
    }

    /// Returns `true` if `domain` exactly matches an entry (case-insensitive,
    /// including non-ASCII letters).
    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.domains.iter().any(|allowed| *allowed == domain)
    }

    /// Returns `true` if no domains are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Number of configured domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Iterates over the normalized domains in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}

/// Returns `true` iff the text after the last `@` of `sender_address` exactly
/// matches an allow-list entry, ignoring case.
///
/// Subdomains do not match their parent domain.
#[must_use]
pub fn is_allowed(sender_address: &str, allow_list: &DomainAllowList) -> bool {
    match sender_address.trim().rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => allow_list.contains(domain),
        _ => false,
    }
}

/// Returns `true` iff the message was not `\Seen` when fetched.
#[must_use]
pub fn passes_unread_policy(message: &MailMessage) -> bool {
    !message.is_seen
}

/// Keeps unread messages from allowed domains, in input order.
///
/// Messages without a sender address are dropped.
#[must_use]
pub fn filter(messages: Vec<MailMessage>, allow_list: &DomainAllowList) -> Vec<MailMessage> {
    messages
        .into_iter()
        .filter(|message| qualifies(message, allow_list))
        .collect()
}

fn qualifies(message: &MailMessage, allow_list: &DomainAllowList) -> bool {
    let Some(sender) = message.sender_address.as_deref() else {
        return false;
    };
    is_allowed(sender, allow_list) && passes_unread_policy(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(uid: u32, sender: Option<&str>, is_seen: bool) -> MailMessage {
        MailMessage {
            uid,
            sender_address: sender.map(str::to_string),
            subject: format!("message {uid}"),
            received_at: Utc::now(),
            is_seen,
        }
    }

    fn uids(messages: &[MailMessage]) -> Vec<u32> {
        messages.iter().map(|m| m.uid).collect()
    }

    #[test]
    fn test_allow_list_normalizes_entries() {
        let list = DomainAllowList::new(["Example.COM", " @partner.org ", "", "example.com"]);
        assert_eq!(list.iter().collect::<Vec<_>>(), ["example.com", "partner.org"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_is_allowed_case_insensitive() {
        let list = DomainAllowList::new(["example.com"]);
        assert!(is_allowed("user@Example.com", &list));
        assert!(is_allowed("USER@EXAMPLE.COM", &list));
    }

    #[test]
    fn test_is_allowed_unicode_domain() {
        let list = DomainAllowList::new(["BÜCHER.de"]);
        assert_eq!(list.iter().collect::<Vec<_>>(), ["bücher.de"]);
        assert!(is_allowed("leser@Bücher.DE", &list));
        assert!(!is_allowed("leser@bucher.de", &list));
    }

    #[test]
    fn test_is_allowed_exact_domain_only() {
        let list = DomainAllowList::new(["example.com"]);
        assert!(!is_allowed("user@evilexample.com", &list));
        assert!(!is_allowed("user@mail.example.com", &list));
        assert!(!is_allowed("user@example.com.evil.net", &list));
        assert!(!is_allowed("example.com", &list));
        assert!(!is_allowed("user@", &list));
    }

    #[test]
    fn test_empty_allow_list_rejects_all() {
        let list = DomainAllowList::default();
        assert!(list.is_empty());
        assert!(!is_allowed("user@example.com", &list));

        let kept = filter(vec![message(1, Some("user@example.com"), false)], &list);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_seen_message_excluded() {
        let list = DomainAllowList::new(["example.com"]);
        let seen = message(1, Some("user@example.com"), true);
        assert!(!passes_unread_policy(&seen));
        assert!(filter(vec![seen], &list).is_empty());
    }

    #[test]
    fn test_missing_sender_dropped() {
        let list = DomainAllowList::new(["example.com"]);
        let kept = filter(
            vec![message(1, None, false), message(2, Some("a@example.com"), false)],
            &list,
        );
        assert_eq!(uids(&kept), [2]);
    }

    #[test]
    fn test_filter_preserves_order() {
        let list = DomainAllowList::new(["example.com", "partner.org"]);
        let input = vec![
            message(9, Some("a@partner.org"), false),
            message(3, Some("b@other.net"), false),
            message(5, Some("c@example.com"), false),
            message(1, Some("d@example.com"), true),
            message(7, Some("e@Partner.org"), false),
        ];

        let kept = filter(input, &list);
        assert_eq!(uids(&kept), [9, 5, 7]);
    }

    #[test]
    fn test_filter_idempotent() {
        let list = DomainAllowList::new(["example.com"]);
        let input = vec![
            message(1, Some("a@example.com"), false),
            message(2, Some("b@evil.com"), false),
            message(3, Some("c@example.com"), true),
            message(4, Some("d@EXAMPLE.com"), false),
        ];

        let once = filter(input, &list);
        let twice = filter(once.clone(), &list);
        assert_eq!(once, twice);
    }
}
