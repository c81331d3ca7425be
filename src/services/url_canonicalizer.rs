use log::debug;
use url::Url;

/// Query parameters that only carry campaign tracking
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
];

/// Reduce a scheme-qualified URL to its aggregation key.
///
/// Drops the fragment and tracking parameters, lower-cases the host, elides
/// default ports and trailing slashes (except a root path). Returns `None`
/// when the input does not parse.
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            debug!("[UrlCanonicalizer] Invalid url {}: {}", raw, e);
            return None;
        }
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.iter().any(|param| key == param))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    // host case and default ports are normalized by the parser

    let path = url.path();
    if path != "/" && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&trimmed);
    }

    Some(url.to_string())
}

/// Hostname of a URL, or the input itself when it does not parse
pub fn safe_hostname(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
