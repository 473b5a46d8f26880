//! Reference resolution against the fetched document's URL.

use url::Url;

/// Inline data and same-document anchors are never proxied.
pub fn is_inline(reference: &str) -> bool {
    reference.starts_with("data:") || reference.starts_with('#')
}

/// Resolve `reference` against `base`.
///
/// - `data:` and `#...` come back unchanged
/// - `//host/path` borrows the base scheme
/// - anything that already parses as an absolute URL comes back unchanged
/// - everything else is resolved as a relative reference (dot segments,
///   absolute-path and relative-path forms)
///
/// A reference that cannot be resolved is returned as-is.
pub fn resolve_reference(base: &Url, reference: &str) -> String {
    if is_inline(reference) {
        return reference.to_string();
    }

    if reference.starts_with("//") {
        return format!("{}:{}", base.scheme(), reference);
    }

    if Url::parse(reference).is_ok() {
        return reference.to_string();
    }

    match base.join(reference) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => reference.to_string(),
    }
}
