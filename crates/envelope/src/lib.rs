//! Message envelopes and the wire codec for the newspool transport.
//!
//! An [`Envelope`] is the unit stored in a topic: RFC 822 style headers plus
//! either one opaque body or multiple named parts. The codec turns envelopes
//! into wire bytes and back. Sequence numbers, effective timestamps, and the
//! chunk/checksum markers ride in the reserved `X-Transport-*` headers.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod codec;
mod content;
mod envelope;
mod error;
mod headers;

pub use content::{content_type_for_name, extension_for};
pub use envelope::{Attachment, Body, Envelope, Part, PartMarker};
pub use error::Error;
pub use headers::{HeaderMap, header};
