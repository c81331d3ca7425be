use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Only matches that start with a scheme or `www.` are considered;
/// bare domains in prose ("go to example.com") are ignored on purpose.
static URL_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:https?://|www\.)(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}(?:/\S*)?",
    )
    .expect("url candidate pattern is valid")
});

static NUMERIC_SECOND_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+\.[a-z]+$").expect("numeric host pattern is valid"));

/// Turkish verb forms that show up glued to a dot in chat ("test.ediyorum")
const CONVERSATIONAL_WORDS: &[&str] = &[
    "test",
    "ediyorum",
    "yapıyorum",
    "biliyorum",
    "geliyorum",
    "gidiyorum",
];

const FALSE_POSITIVE_HOSTS: &[&str] = &[
    "test.com",
    "localhost.com",
    "test.test",
    "deneme.com",
];

/// Generic words rejected as the only label in front of the TLD.
/// Non-ASCII words such as "örnek" are left out: the candidate pattern is
/// ASCII-only and hosts are punycoded, so they could never match.
const GENERIC_DOMAIN_WORDS: &[&str] = &["test", "deneme", "sample", "demo"];

/// Extract likely links from message text, in order of appearance.
///
/// Every returned string is scheme-qualified (`https://` is prepended to
/// `www.` matches). Repeated links are returned once per occurrence.
pub fn extract_urls(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    URL_CANDIDATE
        .find_iter(text)
        .filter(|m| !touches_letter(text, m.start(), m.end()))
        .map(|m| m.as_str())
        .filter(|candidate| !is_conversational(candidate))
        .map(with_scheme)
        .filter(|url| {
            let keep = has_plausible_host(url);
            if !keep {
                debug!("[UrlExtractor] Rejected candidate {}", url);
            }
            keep
        })
        .collect()
}

fn touches_letter(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(char::is_alphabetic) || after.is_some_and(char::is_alphabetic)
}

fn is_conversational(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    candidate.split('.').count() == 2 && CONVERSATIONAL_WORDS.iter().any(|w| lower.contains(w))
}

fn with_scheme(candidate: &str) -> String {
    let lower = candidate.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        candidate.to_string()
    } else {
        format!("https://{}", candidate)
    }
}

fn has_plausible_host(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    // IP hosts have no domain
    let Some(host) = parsed.domain() else {
        return false;
    };
    let host = host.to_lowercase();

    if NUMERIC_SECOND_LEVEL.is_match(&host) || !host.contains('.') {
        return false;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels
        .iter()
        .any(|label| label.is_empty() || label.chars().all(|c| c.is_ascii_digit()))
    {
        return false;
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }

    if FALSE_POSITIVE_HOSTS.contains(&host.as_str()) {
        return false;
    }

    !(labels.len() == 2 && GENERIC_DOMAIN_WORDS.contains(&labels[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_scheme_and_www_links() {
        assert_eq!(
            extract_urls("check this out https://Example.com/Page/?utm_source=x#frag"),
            vec!["https://Example.com/Page/?utm_source=x#frag"]
        );
        assert_eq!(
            extract_urls("docs at www.rust-lang.org/learn and http://kick.com"),
            vec!["https://www.rust-lang.org/learn", "http://kick.com"]
        );
    }

    #[test]
    fn test_bare_domains_are_ignored() {
        assert!(extract_urls("go to kick.com for more").is_empty());
        assert!(extract_urls("bu bir test.com değil").is_empty());
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        assert_eq!(
            extract_urls("https://a.io https://a.io"),
            vec!["https://a.io", "https://a.io"]
        );
    }

    #[test]
    fn test_letters_glued_to_match_are_rejected() {
        assert!(extract_urls("xhttps://kick.com").is_empty());
        assert!(extract_urls("see https://kick.comé").is_empty());
        assert_eq!(extract_urls("(https://kick.com)"), vec!["https://kick.com"]);
    }

    #[test]
    fn test_conversational_false_positives() {
        assert!(extract_urls("https://test.ediyorum").is_empty());
        assert_eq!(
            extract_urls("www.geliyorum.com"),
            vec!["https://www.geliyorum.com"]
        );
        assert!(extract_urls("https://test.com").is_empty());
    }

    #[test]
    fn test_host_validation() {
        assert!(extract_urls("https://123.com").is_empty());
        assert!(extract_urls("https://a.123.com").is_empty());
        assert_eq!(extract_urls("https://www.example.com/x").len(), 1);
        assert_eq!(extract_urls("https://example.com/x"), vec!["https://example.com/x"]);
        assert!(extract_urls("https://localhost.com/x").is_empty());
        assert!(extract_urls("https://demo.io").is_empty());
        assert!(extract_urls("https://sample.net/page").is_empty());
        assert_eq!(extract_urls("https://demo.kick.com"), vec!["https://demo.kick.com"]);
    }

    #[test]
    fn test_uppercase_scheme_is_not_doubled() {
        assert_eq!(extract_urls("HTTPS://KICK.COM"), vec!["HTTPS://KICK.COM"]);
        assert_eq!(extract_urls("WWW.KICK.COM"), vec!["https://WWW.KICK.COM"]);
    }
}
