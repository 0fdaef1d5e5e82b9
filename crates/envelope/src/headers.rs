/// Reserved and well-known header names.
pub mod header {
    /// Effective application timestamp; overrides arrival time for ordering.
    pub const TRANSPORT_DATE: &str = "X-Transport-Date";

    /// Broker-assigned sequence number, stamped on fetch.
    pub const ARTICLE_NUMBER: &str = "X-Transport-ArticleNumber";

    /// Chunk marker for payloads split across envelopes, `index/total`.
    pub const PART: &str = "X-Transport-Part";

    /// Chunk group identifier (the original file stem).
    pub const FILENAME: &str = "X-Transport-Filename";

    /// Checksum of the original, unsplit payload.
    pub const CHECKSUM: &str = "X-Transport-md5";

    /// Target topics, comma separated.
    pub const NEWSGROUPS: &str = "Newsgroups";

    /// Sender identity.
    pub const FROM: &str = "From";

    /// Free-text subject.
    pub const SUBJECT: &str = "Subject";

    /// Arrival timestamp assigned by the broker.
    pub const POSTING_DATE: &str = "NNTP-Posting-Date";

    /// Publish timestamp assigned by the producer.
    pub const DATE: &str = "Date";

    /// Unique message identifier.
    pub const MESSAGE_ID: &str = "Message-ID";

    /// Administrative command carried by a control message.
    pub const CONTROL: &str = "Control";

    /// Approval marker required on control messages.
    pub const APPROVED: &str = "Approved";
}

/// An ordered header map.
///
/// Keys keep the case they were published with; lookups are case-insensitive,
/// matching how RFC 822 consumers treat headers. Insertion order is preserved
/// on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Creates an empty header map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the first value for `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces every occurrence of `name` with a single entry.
    ///
    /// Appending without removing would leave the stale value first in
    /// encounter order, so a replace is always delete-then-append.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Appends an entry, keeping any existing values for `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Removes every occurrence of `name`.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.set("Subject", "status report");

        assert_eq!(headers.get("subject"), Some("status report"));
        assert_eq!(headers.get("SUBJECT"), Some("status report"));
        assert!(headers.get("From").is_none());
    }

    #[test]
    fn set_replaces_all_occurrences() {
        let mut headers = HeaderMap::new();
        headers.append("X-Extra", "one");
        headers.append("x-extra", "two");
        headers.set("X-Extra", "three");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-Extra"), Some("three"));
    }

    #[test]
    fn keys_keep_published_case() {
        let mut headers = HeaderMap::new();
        headers.set("X-Transport-md5", "abc123");

        let (name, _) = headers.iter().next().unwrap();
        assert_eq!(name, "X-Transport-md5");
    }
}
