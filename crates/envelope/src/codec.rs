//! RFC 822 / MIME-subset wire codec.
//!
//! Structural headers (`Content-Type`, `MIME-Version`,
//! `Content-Transfer-Encoding`) are owned by the codec: `decode` consumes
//! them into the body representation instead of the header map, and `encode`
//! regenerates them from the body shape. Everything else passes through the
//! header map verbatim, so encode and decode compose to the identity.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use mime::Mime;
use uuid::Uuid;

use crate::envelope::{Body, Envelope, Part};
use crate::error::Error;
use crate::headers::HeaderMap;

const CONTENT_TYPE: &str = "Content-Type";
const MIME_VERSION: &str = "MIME-Version";
const TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
const DISPOSITION: &str = "Content-Disposition";

pub(crate) fn encode(envelope: &Envelope) -> Bytes {
    let mut out: Vec<u8> = Vec::new();

    for (name, value) in envelope.headers().iter() {
        if is_structural(name) {
            continue;
        }
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    match envelope.body() {
        Body::Single(bytes) => encode_single(&mut out, bytes),
        Body::Multipart { preamble, parts } => encode_multipart(&mut out, preamble.as_deref(), parts),
    }

    Bytes::from(out)
}

fn encode_single(out: &mut Vec<u8>, bytes: &Bytes) {
    out.extend_from_slice(b"MIME-Version: 1.0\r\n");

    if std::str::from_utf8(bytes).is_ok() {
        out.extend_from_slice(b"Content-Type: text/plain; charset=\"utf-8\"\r\n\r\n");
        out.extend_from_slice(bytes);
    } else {
        out.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n\r\n");
        write_base64(out, bytes);
    }
}

fn encode_multipart(out: &mut Vec<u8>, preamble: Option<&str>, parts: &[Part]) {
    let boundary = format!("=_newspool_{}", Uuid::new_v4().simple());

    out.extend_from_slice(b"MIME-Version: 1.0\r\n");
    out.extend_from_slice(
        format!("Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n").as_bytes(),
    );

    if let Some(text) = preamble {
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(format!("Content-Type: {}\r\n", part.content_type).as_bytes());

        let as_text =
            part.content_type.type_() == mime::TEXT && std::str::from_utf8(&part.content).is_ok();

        if !as_text {
            out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n");
        }

        if let Some(filename) = &part.filename {
            out.extend_from_slice(
                format!("Content-Disposition: attachment; filename=\"{filename}\"\r\n").as_bytes(),
            );
        }

        out.extend_from_slice(b"\r\n");

        if as_text {
            out.extend_from_slice(&part.content);
            out.extend_from_slice(b"\r\n");
        } else {
            write_base64(out, &part.content);
        }
    }

    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
}

fn write_base64(out: &mut Vec<u8>, bytes: &[u8]) {
    let encoded = BASE64.encode(bytes);
    for chunk in encoded.as_bytes().chunks(76) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
}

pub(crate) fn decode(wire: &[u8]) -> Result<Envelope, Error> {
    let (header_block, body) = split_header_block(wire);
    let raw_headers = parse_headers(header_block)?;

    let mut headers = HeaderMap::new();
    let mut content_type: Option<Mime> = None;
    let mut transfer_encoding: Option<String> = None;

    for (name, value) in raw_headers {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            content_type =
                Some(value.parse().map_err(|_| Error::ContentType(value.clone()))?);
        } else if name.eq_ignore_ascii_case(TRANSFER_ENCODING) {
            transfer_encoding = Some(value.trim().to_ascii_lowercase());
        } else if !name.eq_ignore_ascii_case(MIME_VERSION) {
            headers.append(name, value);
        }
    }

    let body = match content_type {
        Some(ref mime) if mime.type_() == mime::MULTIPART => {
            let boundary = mime
                .get_param(mime::BOUNDARY)
                .ok_or(Error::MissingBoundary)?
                .to_string();
            decode_multipart(body, &boundary)?
        }
        _ => Body::Single(decode_payload(body, transfer_encoding.as_deref())?),
    };

    Ok(Envelope::new(headers, body))
}

fn decode_payload(raw: &[u8], transfer_encoding: Option<&str>) -> Result<Bytes, Error> {
    match transfer_encoding {
        Some("base64") => {
            let compact: Vec<u8> = raw
                .iter()
                .copied()
                .filter(|byte| !byte.is_ascii_whitespace())
                .collect();
            Ok(Bytes::from(BASE64.decode(compact)?))
        }
        _ => Ok(Bytes::copy_from_slice(raw)),
    }
}

fn decode_multipart(body: &[u8], boundary: &str) -> Result<Body, Error> {
    let delimiter = format!("--{boundary}");

    let first = find_delimiter(body, delimiter.as_bytes(), 0)
        .ok_or(Error::UnterminatedMultipart)?;

    let preamble = {
        let text = strip_trailing_newline(&body[..first]);
        if text.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(text).into_owned())
        }
    };

    let mut parts = Vec::new();
    let mut cursor = first;

    loop {
        cursor += delimiter.len();

        // A trailing "--" marks the closing delimiter.
        if body[cursor..].starts_with(b"--") {
            break;
        }

        let Some(line_end) = next_line_start(&body[cursor..]) else {
            return Err(Error::UnterminatedMultipart);
        };
        let block_start = cursor + line_end;

        let block_end = find_delimiter(body, delimiter.as_bytes(), block_start)
            .ok_or(Error::UnterminatedMultipart)?;

        parts.push(decode_part(&body[block_start..block_end])?);
        cursor = block_end;
    }

    Ok(Body::Multipart { preamble, parts })
}

fn decode_part(block: &[u8]) -> Result<Part, Error> {
    let (header_block, content) = split_header_block(block);
    let content = strip_trailing_newline(content);

    let mut content_type = mime::TEXT_PLAIN;
    let mut transfer_encoding: Option<String> = None;
    let mut filename = None;

    for (name, value) in parse_headers(header_block)? {
        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            content_type = value.parse().map_err(|_| Error::ContentType(value.clone()))?;
        } else if name.eq_ignore_ascii_case(TRANSFER_ENCODING) {
            transfer_encoding = Some(value.trim().to_ascii_lowercase());
        } else if name.eq_ignore_ascii_case(DISPOSITION) {
            filename = parse_filename(&value);
        }
    }

    Ok(Part {
        filename,
        content_type,
        content: decode_payload(content, transfer_encoding.as_deref())?,
    })
}

/// Splits a block into its header bytes and body bytes at the first blank
/// line. A block without a blank line is all headers.
fn split_header_block(block: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = find_subslice(block, b"\r\n\r\n") {
        (&block[..pos], &block[pos + 4..])
    } else if let Some(pos) = find_subslice(block, b"\n\n") {
        (&block[..pos], &block[pos + 2..])
    } else {
        (block, &[])
    }
}

/// Parses a header block, unfolding continuation lines.
fn parse_headers(block: &[u8]) -> Result<Vec<(String, String)>, Error> {
    let text = String::from_utf8_lossy(block);
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let (_, value) = headers
                .last_mut()
                .ok_or(Error::DanglingContinuation)?;
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::MalformedHeader(line.to_string()))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(headers)
}

fn parse_filename(disposition: &str) -> Option<String> {
    let lower = disposition.to_ascii_lowercase();
    let start = lower.find("filename=")? + "filename=".len();
    let rest = &disposition[start..];

    if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next().map(String::from)
    } else {
        let end = rest.find(';').unwrap_or(rest.len());
        let token = rest[..end].trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// Finds the next occurrence of `delimiter` at the start of a line, at or
/// after `from`.
fn find_delimiter(haystack: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut search = from;

    while let Some(offset) = find_subslice(&haystack[search..], delimiter) {
        let pos = search + offset;
        if pos == 0 || haystack[pos - 1] == b'\n' {
            return Some(pos);
        }
        search = pos + delimiter.len();
    }

    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Offset just past the first line break, if any.
fn next_line_start(block: &[u8]) -> Option<usize> {
    block
        .iter()
        .position(|&byte| byte == b'\n')
        .map(|pos| pos + 1)
}

/// Strips the single trailing line break that belongs to the following
/// boundary delimiter.
fn strip_trailing_newline(block: &[u8]) -> &[u8] {
    if block.ends_with(b"\r\n") {
        &block[..block.len() - 2]
    } else if block.ends_with(b"\n") {
        &block[..block.len() - 1]
    } else {
        block
    }
}

fn is_structural(name: &str) -> bool {
    name.eq_ignore_ascii_case(CONTENT_TYPE)
        || name.eq_ignore_ascii_case(MIME_VERSION)
        || name.eq_ignore_ascii_case(TRANSFER_ENCODING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::header;

    fn named_part(filename: &str, content_type: Mime, content: &'static [u8]) -> Part {
        Part {
            filename: Some(filename.to_string()),
            content_type,
            content: Bytes::from_static(content),
        }
    }

    #[test]
    fn three_part_round_trip_is_lossless() {
        let mut headers = HeaderMap::new();
        headers.set(header::FROM, "station@field.site");
        headers.set(header::SUBJECT, "hourly readings");
        headers.set(header::TRANSPORT_DATE, "2024-03-08 06:00:00+00:00");

        let original = Envelope::new(
            headers,
            Body::Multipart {
                preamble: Some("Attached instrument output".to_string()),
                parts: vec![
                    named_part("readings.csv", mime::TEXT_CSV, b"t,v\n0,1.5\n1,1.7"),
                    named_part("plot.png", mime::IMAGE_PNG, b"\x89PNG\r\n\x1a\n\x00\x00"),
                    named_part("raw.bin", mime::APPLICATION_OCTET_STREAM, b"\x00\xff\x10\x80"),
                ],
            },
        );

        let decoded = Envelope::decode(&original.encode()).unwrap();

        assert_eq!(decoded.headers(), original.headers());

        let Body::Multipart { preamble, parts } = decoded.body() else {
            panic!("expected a multipart body");
        };
        assert_eq!(preamble.as_deref(), Some("Attached instrument output"));
        assert_eq!(parts.len(), 3);
        let names: Vec<_> = parts.iter().map(|p| p.filename.as_deref()).collect();
        assert_eq!(
            names,
            vec![Some("readings.csv"), Some("plot.png"), Some("raw.bin")]
        );

        let Body::Multipart { parts: sent, .. } = original.body() else {
            unreachable!();
        };
        for (sent, received) in sent.iter().zip(parts) {
            assert_eq!(sent.content, received.content);
            assert_eq!(sent.content_type, received.content_type);
        }
    }

    #[test]
    fn text_round_trip_is_lossless() {
        let mut envelope = Envelope::text("status: nominal\n");
        envelope.headers_mut().set(header::SUBJECT, "heartbeat");

        let decoded = Envelope::decode(&envelope.encode()).unwrap();

        assert_eq!(decoded.headers().get(header::SUBJECT), Some("heartbeat"));
        assert_eq!(decoded.as_text(), Some("status: nominal\n"));
    }

    #[test]
    fn binary_single_body_round_trips_via_base64() {
        let payload = Bytes::from_static(b"\x00\x01\x02\xfe\xff");
        let envelope = Envelope::new(HeaderMap::new(), Body::Single(payload.clone()));

        let wire = envelope.encode();
        assert!(find_subslice(&wire, b"base64").is_some());

        let decoded = Envelope::decode(&wire).unwrap();
        let Body::Single(received) = decoded.body() else {
            panic!("expected a single body");
        };
        assert_eq!(received, &payload);
    }

    #[test]
    fn folded_headers_are_unfolded() {
        let wire = b"Subject: a very\r\n  long subject\r\nFrom: a@b\r\n\r\nbody";
        let decoded = Envelope::decode(wire).unwrap();

        assert_eq!(decoded.headers().get("Subject"), Some("a very long subject"));
        assert_eq!(decoded.as_text(), Some("body"));
    }

    #[test]
    fn reserved_headers_survive_decode_verbatim() {
        let wire = b"X-Transport-Part: 2/5\r\nX-Transport-Filename: archive.dat\r\n\
X-Transport-md5: 0cc175b9c0f1b6a831c399e269772661\r\n\r\nchunk";
        let decoded = Envelope::decode(wire).unwrap();

        assert_eq!(decoded.headers().get(header::PART), Some("2/5"));
        assert_eq!(decoded.checksum(), Some("0cc175b9c0f1b6a831c399e269772661"));
        assert_eq!(decoded.group_name(), Some("archive.dat"));
    }

    #[test]
    fn body_without_mime_structure_is_opaque() {
        let wire = b"Subject: plain\r\n\r\njust text";
        let decoded = Envelope::decode(wire).unwrap();

        assert_eq!(decoded.as_text(), Some("just text"));
    }

    #[test]
    fn multipart_without_boundary_is_rejected() {
        let wire = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(matches!(
            Envelope::decode(wire),
            Err(Error::MissingBoundary)
        ));
    }

    #[test]
    fn missing_closing_delimiter_is_rejected() {
        let wire = b"Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n--b\r\n\r\npart one\r\n";
        assert!(matches!(
            Envelope::decode(wire),
            Err(Error::UnterminatedMultipart)
        ));
    }
}
