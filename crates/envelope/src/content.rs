use mime::Mime;

/// Guesses a content type from a file name, falling back to octet-stream.
#[must_use]
pub fn content_type_for_name(name: &str) -> Mime {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let value = match ext.as_str() {
        "txt" | "log" | "cfg" | "conf" | "ini" | "dat" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "gz" | "tgz" => "application/gzip",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        _ => "application/octet-stream",
    };

    value.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// Returns a file extension (with leading dot) for a content type.
///
/// Used when generating `part-NNN.<ext>` names for unnamed attachments.
#[must_use]
pub fn extension_for(content_type: &Mime) -> &'static str {
    match (content_type.type_(), content_type.subtype()) {
        (mime::TEXT, mime::PLAIN) => ".txt",
        (mime::TEXT, mime::CSV) => ".csv",
        (mime::TEXT, mime::HTML) => ".html",
        (mime::TEXT, mime::XML) | (mime::APPLICATION, mime::XML) => ".xml",
        (mime::APPLICATION, mime::JSON) => ".json",
        (mime::APPLICATION, mime::PDF) => ".pdf",
        (mime::IMAGE, mime::PNG) => ".png",
        (mime::IMAGE, mime::JPEG) => ".jpg",
        (mime::IMAGE, mime::GIF) => ".gif",
        (mime::AUDIO, subtype) if subtype == "mpeg" => ".mp3",
        (mime::APPLICATION, subtype) if subtype == "gzip" => ".gz",
        (mime::APPLICATION, subtype) if subtype == "zip" => ".zip",
        _ => ".bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_both_ways() {
        let ct = content_type_for_name("plot.png");
        assert_eq!(ct, mime::IMAGE_PNG);
        assert_eq!(extension_for(&ct), ".png");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        let ct = content_type_for_name("readings.xyz");
        assert_eq!(ct, mime::APPLICATION_OCTET_STREAM);
        assert_eq!(extension_for(&ct), ".bin");
    }

    #[test]
    fn names_without_extension_are_binary() {
        assert_eq!(
            content_type_for_name("corefile"),
            mime::APPLICATION_OCTET_STREAM
        );
    }
}
