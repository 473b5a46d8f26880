//! Content-Type resolution.
//!
//! # Precedence
//! 1. Upstream `Content-Type` header
//! 2. Extension of the target URL path
//! 3. Sniffing the first bytes of the body
//! 4. `application/octet-stream`

pub const OCTET_STREAM: &str = "application/octet-stream";

const SNIFF_LEN: usize = 512;

/// Pick the content type to send back for a fetched resource.
pub fn resolve_content_type(header: Option<&str>, path: &str, body: &[u8]) -> String {
    if let Some(value) = header.map(str::trim).filter(|v| !v.is_empty()) {
        return value.to_string();
    }

    if let Some(mime) = by_extension(path) {
        return mime.to_string();
    }

    if body.is_empty() {
        return OCTET_STREAM.to_string();
    }

    sniff(body).to_string()
}

/// Only HTML and CSS bodies have their references rewritten.
pub fn is_rewritable(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("text/css")
}

/// Look up a MIME type by the extension of the last path segment.
pub fn by_extension(path: &str) -> Option<&'static str> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    let ext = segment.rsplit_once('.')?.1.to_ascii_lowercase();

    let mime = match ext.as_str() {
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "ico" => "image/x-icon",
        "html" | "htm" => "text/html; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => return None,
    };
    Some(mime)
}

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// (signature, mime) pairs matched at offset zero.
const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", "text/plain; charset=utf-8"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"BM", "image/bmp"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"OTTO", "font/otf"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x00asm", "application/wasm"),
];

/// Guess a MIME type from the leading bytes of a body.
pub fn sniff(body: &[u8]) -> &'static str {
    let data = &body[..body.len().min(SNIFF_LEN)];

    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    let trimmed = &data[start..];

    if HTML_TAGS.iter().any(|tag| starts_with_tag(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some(&(_, mime)) = MAGIC.iter().find(|(sig, _)| data.starts_with(sig)) {
        return mime;
    }

    if data.len() >= 14 && &data[..4] == b"RIFF" && &data[8..14] == b"WEBPVP" {
        return "image/webp";
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM
    } else {
        "text/plain; charset=utf-8"
    }
}

/// Case-insensitive tag match followed by a tag-terminating byte.
fn starts_with_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(data[tag.len()], b' ' | b'>')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wins() {
        assert_eq!(
            resolve_content_type(Some("text/plain"), "/app.css", b"<html>"),
            "text/plain"
        );
    }

    #[test]
    fn test_blank_header_is_ignored() {
        assert_eq!(resolve_content_type(Some("  "), "/app.css", b""), "text/css");
    }

    #[test]
    fn test_extension_beats_sniffing() {
        assert_eq!(
            resolve_content_type(None, "/styles/app.CSS", b"<html><body></body></html>"),
            "text/css"
        );
        assert_eq!(resolve_content_type(None, "/lib/mod.mjs", b"export {}"), "application/javascript");
        assert_eq!(resolve_content_type(None, "/f/a.woff2", b"wOF2"), "font/woff2");
    }

    #[test]
    fn test_extension_only_from_last_segment() {
        assert_eq!(by_extension("/v1.2/download"), None);
        assert_eq!(by_extension("/"), None);
        assert_eq!(by_extension("/favicon.ico"), Some("image/x-icon"));
    }

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff(b"  \n<!doctype html><html>"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<p>hello</p>"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        assert_eq!(sniff(b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00"), "image/png");
        assert_eq!(sniff(b"GIF89a..."), "image/gif");
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff(b"plain words"), "text/plain; charset=utf-8");
        assert_eq!(sniff(b"\x01\x02\x03binary"), OCTET_STREAM);
    }

    #[test]
    fn test_html_tag_needs_terminator() {
        // "<a" followed by a letter is not an anchor tag.
        assert_eq!(sniff(b"<abc>"), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_empty_body_falls_back() {
        assert_eq!(resolve_content_type(None, "/download", b""), OCTET_STREAM);
    }

    #[test]
    fn test_is_rewritable() {
        assert!(is_rewritable("text/html; charset=utf-8"));
        assert!(is_rewritable("TEXT/CSS"));
        assert!(!is_rewritable("application/javascript"));
        assert!(!is_rewritable("image/svg+xml"));
    }
}
