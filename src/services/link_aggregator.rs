use crate::models::chat::ChatMessage;
use crate::models::links::{GroupedLink, LinkSort, LinkStat, LinkStats};
use crate::services::url_canonicalizer::{canonicalize_url, safe_hostname};
use crate::services::url_extractor::extract_urls;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

pub type LinkMap = HashMap<String, LinkStat>;

/// Running canonical-URL statistics for the active channel.
///
/// Every mutation builds a fresh map and swaps it in, so a snapshot handed
/// out earlier never changes underneath its holder.
#[derive(Default)]
pub struct LinkAggregator {
    links: Arc<LinkMap>,
}

impl LinkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_links(links: LinkMap) -> Self {
        Self {
            links: Arc::new(links),
        }
    }

    /// Record every link in the message. Returns the updated stats in the
    /// order their URLs appeared.
    pub fn ingest(&mut self, message: &ChatMessage) -> Vec<LinkStat> {
        let urls = extract_urls(&message.message);
        if urls.is_empty() {
            return Vec::new();
        }

        let seen_at = if message.created_at.is_empty() {
            Utc::now().to_rfc3339()
        } else {
            message.created_at.clone()
        };

        let mut next = (*self.links).clone();
        let mut updated = Vec::with_capacity(urls.len());

        for canonical in urls.iter().filter_map(|raw| canonicalize_url(raw)) {
            let stat = match next.get(&canonical) {
                Some(existing) => LinkStat {
                    count: existing.count + 1,
                    last_at: seen_at.clone(),
                    last_sender: message.username.clone(),
                    ..existing.clone()
                },
                None => LinkStat {
                    hostname: safe_hostname(&canonical),
                    url: canonical.clone(),
                    count: 1,
                    last_at: seen_at.clone(),
                    last_sender: message.username.clone(),
                },
            };
            next.insert(canonical, stat.clone());
            updated.push(stat);
        }

        if !updated.is_empty() {
            self.links = Arc::new(next);
        }
        updated
    }

    pub fn snapshot(&self) -> Arc<LinkMap> {
        Arc::clone(&self.links)
    }

    pub fn remove(&mut self, url: &str) -> bool {
        if !self.links.contains_key(url) {
            return false;
        }
        let mut next = (*self.links).clone();
        next.remove(url);
        self.links = Arc::new(next);
        true
    }

    pub fn clear(&mut self) {
        self.links = Arc::new(LinkMap::new());
    }

    pub fn replace(&mut self, links: LinkMap) {
        self.links = Arc::new(links);
    }

    pub fn sorted_links(&self, sort: LinkSort) -> Vec<LinkStat> {
        let mut links: Vec<LinkStat> = self.links.values().cloned().collect();
        links.sort_by(|a, b| compare_links(a, b, sort));
        links
    }

    /// Group links by hostname
    pub fn grouped(&self, sort: LinkSort) -> Vec<GroupedLink> {
        let mut groups: HashMap<&str, Vec<LinkStat>> = HashMap::new();
        for link in self.links.values() {
            groups.entry(link.hostname.as_str()).or_default().push(link.clone());
        }

        let mut grouped: Vec<GroupedLink> = groups
            .into_iter()
            .map(|(hostname, mut links)| {
                links.sort_by(|a, b| compare_links(a, b, sort));
                GroupedLink {
                    hostname: hostname.to_string(),
                    total_count: links.iter().map(|l| l.count).sum(),
                    last_activity: links.iter().map(LinkStat::last_at_millis).max().unwrap_or(0),
                    links,
                }
            })
            .collect();

        grouped.sort_by(|a, b| {
            let by_recency = b.last_activity.cmp(&a.last_activity);
            match sort {
                LinkSort::Recent => by_recency,
                LinkSort::Popular => b.total_count.cmp(&a.total_count).then(by_recency),
            }
            .then_with(|| a.hostname.cmp(&b.hostname))
        });
        grouped
    }

    pub fn stats(&self) -> LinkStats {
        let hostnames: std::collections::HashSet<&str> =
            self.links.values().map(|l| l.hostname.as_str()).collect();
        LinkStats {
            unique_links: self.links.len(),
            total_shares: self.links.values().map(|l| l.count).sum(),
            hostnames: hostnames.len(),
        }
    }
}

fn compare_links(a: &LinkStat, b: &LinkStat, sort: LinkSort) -> Ordering {
    let by_recency = b.last_at_millis().cmp(&a.last_at_millis());
    match sort {
        LinkSort::Recent => by_recency,
        LinkSort::Popular => b.count.cmp(&a.count).then(by_recency),
    }
    .then_with(|| a.url.cmp(&b.url))
}
