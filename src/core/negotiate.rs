//! Media type helpers shared by the request API, formatters and the accept parser.

use std::borrow::Cow;

/// Expand shorthand types (`json`, `html`) into full media types.
///
/// Anything already containing a `/` is returned as is.
pub fn normalize_type(t: &str) -> Cow<'_, str> {
    let t = t.trim();
    if t.contains('/') {
        return Cow::Borrowed(t);
    }
    match mime_guess::from_ext(t).first() {
        Some(mime) => Cow::Owned(mime.essence_str().to_string()),
        None => Cow::Borrowed(t),
    }
}

/// Strip parameters (`; charset=...`) and lowercase.
pub fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Check whether `actual` satisfies `pattern`; either side may use `*` wildcards.
pub fn type_matches(pattern: &str, actual: &str) -> bool {
    let pattern = essence(pattern);
    let actual = essence(actual);

    if pattern == "*/*" || pattern == "*" || actual == "*/*" {
        return true;
    }

    let (p_type, p_sub) = pattern.split_once('/').unwrap_or((pattern.as_str(), "*"));
    let (a_type, a_sub) = actual.split_once('/').unwrap_or((actual.as_str(), "*"));

    (p_type == a_type || p_type == "*" || a_type == "*")
        && (p_sub == a_sub || p_sub == "*" || a_sub == "*")
}

/// One entry of an `Accept`-style header.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptEntry {
    pub media_type: String,
    pub quality: f32,
}

/// Parse an `Accept` header into entries ordered by quality (stable for ties).
///
/// Entries with `q=0` are dropped.
pub fn parse_accept(header: &str) -> Vec<AcceptEntry> {
    let mut entries: Vec<AcceptEntry> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let media_type = pieces.next()?.trim().to_ascii_lowercase();
            if media_type.is_empty() {
                return None;
            }
            let quality = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(AcceptEntry {
                media_type,
                quality,
            })
        })
        .filter(|e| e.quality > 0.0)
        .collect();

    entries.sort_by(|a, b| {
        b.quality
            .partial_cmp(&a.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries
}

/// Pick the first of `offered` the client accepts, honoring header order by quality.
///
/// A missing or empty header accepts the first offer.
pub fn negotiate<'a>(accept: Option<&str>, offered: &'a [String]) -> Option<&'a str> {
    let accept = match accept {
        Some(a) if !a.trim().is_empty() => a,
        _ => return offered.first().map(|s| s.as_str()),
    };

    for entry in parse_accept(accept) {
        if let Some(found) = offered
            .iter()
            .find(|o| type_matches(&entry.media_type, o))
        {
            return Some(found.as_str());
        }
    }
    None
}
