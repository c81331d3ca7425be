use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Live aggregate of one canonical URL's sightings
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkStat {
    pub url: String,
    pub hostname: String,
    pub count: u64,
    pub last_at: String,
    pub last_sender: String,
}

impl LinkStat {
    /// `last_at` as epoch milliseconds, 0 when it does not parse
    pub fn last_at_millis(&self) -> i64 {
        timestamp_millis(&self.last_at)
    }
}

/// Links sharing one hostname. Derived, never stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupedLink {
    pub hostname: String,
    pub links: Vec<LinkStat>,
    pub total_count: u64,
    /// Epoch milliseconds of the most recent `last_at` in the group
    pub last_activity: i64,
}

/// Persisted counterpart of [`LinkStat`], scoped per channel slug
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredLink {
    pub url: String,
    pub hostname: String,
    pub count: u64,
    pub last_at: String,
    pub last_sender: String,
    pub first_seen_at: String,
}

impl StoredLink {
    pub fn from_stat(stat: &LinkStat, first_seen_at: String) -> Self {
        Self {
            url: stat.url.clone(),
            hostname: stat.hostname.clone(),
            count: stat.count,
            last_at: stat.last_at.clone(),
            last_sender: stat.last_sender.clone(),
            first_seen_at,
        }
    }

    pub fn to_stat(&self) -> LinkStat {
        LinkStat {
            url: self.url.clone(),
            hostname: self.hostname.clone(),
            count: self.count,
            last_at: self.last_at.clone(),
            last_sender: self.last_sender.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkSort {
    /// Most recent activity first
    #[default]
    Recent,
    /// Highest count first, ties broken by recency
    Popular,
}

impl std::str::FromStr for LinkSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recent" => Ok(LinkSort::Recent),
            "popular" => Ok(LinkSort::Popular),
            other => Err(format!("Unknown sort order: {}", other)),
        }
    }
}

/// Summary counters for the active mapping
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LinkStats {
    pub unique_links: usize,
    pub total_shares: u64,
    pub hostnames: usize,
}

/// Epoch milliseconds of an ISO-8601 timestamp. Date-times without an
/// offset are read as UTC.
pub fn parse_millis(iso: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Epoch milliseconds of an ISO-8601 timestamp, 0 when it does not parse
pub fn timestamp_millis(iso: &str) -> i64 {
    parse_millis(iso).unwrap_or(0)
}
