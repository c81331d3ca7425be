use crate::models::links::{parse_millis, LinkStat, StoredLink};
use crate::services::link_aggregator::LinkMap;
use crate::services::storage_backend::KeyValueStore;
use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const STORAGE_KEY_PREFIX: &str = "kick_chat_links_";

/// Links kept per channel
pub const MAX_STORED_LINKS: usize = 10;

/// Capped, recency-ranked link history per channel slug.
///
/// Storage failures never escape: reads degrade to "no data" and writes to
/// a logged no-op. An empty slug means "no channel".
pub struct LinkStorageService<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> LinkStorageService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn storage_key(slug: &str) -> String {
        format!("{}{}", STORAGE_KEY_PREFIX, slug)
    }

    /// Load stored links, dropping malformed records
    pub fn load(&self, slug: &str) -> Vec<StoredLink> {
        if slug.is_empty() {
            return Vec::new();
        }

        let raw = match self.store.get(&Self::storage_key(slug)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("[LinkStorage] Failed to read links for {}: {:#}", slug, e);
                return Vec::new();
            }
        };

        let items = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!("[LinkStorage] Stored links for {} are not a list", slug);
                return Vec::new();
            }
            Err(e) => {
                warn!("[LinkStorage] Corrupt link storage for {}: {}", slug, e);
                return Vec::new();
            }
        };

        items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<StoredLink>(item).ok())
            .take(MAX_STORED_LINKS)
            .collect()
    }

    pub fn add_or_update(&self, slug: &str, stat: &LinkStat) -> Vec<StoredLink> {
        if slug.is_empty() {
            return Vec::new();
        }

        let mut links = self.load(slug);
        match links.iter_mut().find(|link| link.url == stat.url) {
            Some(existing) => {
                existing.count = stat.count;
                existing.last_at = stat.last_at.clone();
                existing.last_sender = stat.last_sender.clone();
            }
            None => links.insert(0, StoredLink::from_stat(stat, Utc::now().to_rfc3339())),
        }

        self.save(slug, links)
    }

    pub fn remove(&self, slug: &str, url: &str) -> Vec<StoredLink> {
        if slug.is_empty() {
            return Vec::new();
        }
        let links: Vec<StoredLink> = self
            .load(slug)
            .into_iter()
            .filter(|link| link.url != url)
            .collect();
        self.save(slug, links)
    }

    pub fn clear(&self, slug: &str) {
        if slug.is_empty() {
            return;
        }
        match self.store.remove(&Self::storage_key(slug)) {
            Ok(()) => debug!("[LinkStorage] Cleared links for {}", slug),
            Err(e) => warn!("[LinkStorage] Failed to clear links for {}: {:#}", slug, e),
        }
    }

    pub fn count(&self, slug: &str) -> usize {
        self.load(slug).len()
    }

    /// Stored links of a channel as a live link map
    pub fn load_link_map(&self, slug: &str) -> LinkMap {
        to_link_stats(&self.load(slug))
    }

    /// Rank, truncate and persist. Returns the kept links even when the
    /// write fails.
    fn save(&self, slug: &str, links: Vec<StoredLink>) -> Vec<StoredLink> {
        let kept = most_recent(links, MAX_STORED_LINKS);
        match serde_json::to_string(&kept) {
            Ok(json) => {
                if let Err(e) = self.store.set(&Self::storage_key(slug), &json) {
                    warn!("[LinkStorage] Failed to save links for {}: {:#}", slug, e);
                } else {
                    debug!("[LinkStorage] Saved {} links for {}", kept.len(), slug);
                }
            }
            Err(e) => warn!("[LinkStorage] Failed to serialize links: {}", e),
        }
        kept
    }
}

pub fn to_link_stats(links: &[StoredLink]) -> LinkMap {
    links
        .iter()
        .map(|link| (link.url.clone(), link.to_stat()))
        .collect()
}

/// Keep the `cap` most recently active links, newest first.
///
/// Bounded min-heap over (last_at, earlier position). Links whose
/// `last_at` does not parse rank below every parseable one.
fn most_recent(links: Vec<StoredLink>, cap: usize) -> Vec<StoredLink> {
    let mut heap: BinaryHeap<Reverse<(Option<i64>, Reverse<usize>)>> =
        BinaryHeap::with_capacity(cap + 1);

    for (position, link) in links.iter().enumerate() {
        heap.push(Reverse((parse_millis(&link.last_at), Reverse(position))));
        if heap.len() > cap {
            heap.pop();
        }
    }

    // ascending Reverse order == best first
    let order: Vec<usize> = heap
        .into_sorted_vec()
        .into_iter()
        .map(|Reverse((_, Reverse(position)))| position)
        .collect();

    let mut slots: Vec<Option<StoredLink>> = links.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect()
}
