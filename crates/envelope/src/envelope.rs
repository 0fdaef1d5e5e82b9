use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use mime::Mime;

use crate::content::extension_for;
use crate::error::Error;
use crate::headers::{HeaderMap, header};

/// One attached payload inside a multipart envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    /// Declared attachment file name, if any.
    pub filename: Option<String>,
    /// Declared or inferred content type.
    pub content_type: Mime,
    /// Decoded payload bytes.
    pub content: Bytes,
}

/// The body of an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// One opaque payload.
    Single(Bytes),
    /// Multiple named parts with an optional free-text preamble.
    Multipart {
        /// Free text preceding the first part.
        preamble: Option<String>,
        /// Attached parts in wire order.
        parts: Vec<Part>,
    },
}

/// Chunk marker parsed from the reserved part header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartMarker {
    /// One-based chunk index.
    pub index: u32,
    /// Total number of chunks in the group.
    pub total: u32,
}

/// A named view of one body payload, see [`Envelope::attachments`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Declared or generated file name.
    pub name: String,
    /// Content type of the payload.
    pub content_type: Mime,
    /// Payload bytes.
    pub content: Bytes,
}

/// The unit stored in a topic: headers plus a single or multipart body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    headers: HeaderMap,
    body: Body,
}

impl Envelope {
    /// Creates an envelope with the given headers and body.
    #[must_use]
    pub const fn new(headers: HeaderMap, body: Body) -> Self {
        Self { headers, body }
    }

    /// Creates a text-only envelope with empty headers.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            headers: HeaderMap::new(),
            body: Body::Single(Bytes::from(text.into())),
        }
    }

    /// The header map.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the header map.
    pub const fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// The broker-assigned sequence number, if the envelope was fetched.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.headers
            .get(header::ARTICLE_NUMBER)
            .and_then(|value| value.trim().parse().ok())
    }

    /// Stamps the broker-assigned sequence number.
    ///
    /// Any previously stamped value is removed first so at most one
    /// occurrence survives a refetch.
    pub fn set_sequence(&mut self, seq: u64) {
        self.headers.set(header::ARTICLE_NUMBER, seq.to_string());
    }

    /// The effective timestamp used for ordering.
    ///
    /// Prefers the application-supplied transport date, then the broker
    /// arrival date, then the producer date. Falls back to the current time
    /// when none parse.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        [header::TRANSPORT_DATE, header::POSTING_DATE, header::DATE]
            .iter()
            .filter_map(|name| self.headers.get(name))
            .find_map(parse_date)
            .unwrap_or_else(Utc::now)
    }

    /// The chunk marker, when this envelope carries one piece of a split
    /// payload.
    #[must_use]
    pub fn part_marker(&self) -> Option<PartMarker> {
        let value = self.headers.get(header::PART)?;
        let (index, total) = value.split_once('/')?;

        Some(PartMarker {
            index: index.trim().parse().ok()?,
            total: total.trim().parse().ok()?,
        })
    }

    /// The chunk group identifier, when present.
    #[must_use]
    pub fn group_name(&self) -> Option<&str> {
        self.headers.get(header::FILENAME)
    }

    /// The checksum of the original, unsplit payload, verbatim.
    #[must_use]
    pub fn checksum(&self) -> Option<&str> {
        self.headers.get(header::CHECKSUM)
    }

    /// The body as UTF-8 text, when it is a single valid-UTF-8 payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            Body::Single(bytes) => std::str::from_utf8(bytes).ok(),
            Body::Multipart { .. } => None,
        }
    }

    /// Returns the body as a list of named attachments.
    ///
    /// A non-multipart body becomes one implicit attachment named
    /// `default_name`. Parts without a declared file name get a generated
    /// `part-NNN.<ext>` name; the counter runs over all parts so generated
    /// names line up with wire positions.
    #[must_use]
    pub fn attachments(&self, default_name: &str) -> Vec<Attachment> {
        match &self.body {
            Body::Single(bytes) => vec![Attachment {
                name: default_name.to_string(),
                content_type: mime::TEXT_PLAIN,
                content: bytes.clone(),
            }],
            Body::Multipart { parts, .. } => parts
                .iter()
                .enumerate()
                .map(|(index, part)| {
                    let name = part.filename.clone().unwrap_or_else(|| {
                        format!("part-{:03}{}", index + 1, extension_for(&part.content_type))
                    });

                    Attachment {
                        name,
                        content_type: part.content_type.clone(),
                        content: part.content.clone(),
                    }
                })
                .collect(),
        }
    }

    /// Encodes the envelope into wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        crate::codec::encode(self)
    }

    /// Decodes an envelope from wire bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the header block or multipart structure is
    /// malformed.
    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        crate::codec::decode(wire)
    }
}

/// Parses a header date, accepting RFC 2822, RFC 3339, and the plain
/// `YYYY-MM-DD HH:MM:SS[.frac][+offset]` rendering older producers used.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.with_timezone(&Utc));
    }

    // Naive timestamps are taken as UTC.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
