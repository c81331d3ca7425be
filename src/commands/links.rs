use crate::models::links::{GroupedLink, LinkSort, LinkStat, StoredLink};
use crate::models::settings::AppState;
use crate::services::data_dir_service::links_dir;
use crate::services::link_aggregator::LinkAggregator;
use crate::services::link_storage_service::{to_link_stats, LinkStorageService};
use crate::services::storage_backend::FileStore;

fn open_storage(state: &AppState) -> Result<LinkStorageService<FileStore>, String> {
    let store = FileStore::new(links_dir(&state.data_dir))
        .map_err(|e| format!("Failed to open link storage: {:#}", e))?;
    Ok(LinkStorageService::new(store))
}

fn normalize_slug(slug: &str) -> Result<String, String> {
    let slug = slug.trim().to_lowercase();
    if slug.is_empty() {
        return Err("Channel slug is required".to_string());
    }
    Ok(slug)
}

pub fn get_stored_links(state: &AppState, slug: &str, sort: LinkSort) -> Result<Vec<LinkStat>, String> {
    let slug = normalize_slug(slug)?;
    let links = open_storage(state)?.load(&slug);
    Ok(LinkAggregator::from_links(to_link_stats(&links)).sorted_links(sort))
}

pub fn get_grouped_links(state: &AppState, slug: &str, sort: LinkSort) -> Result<Vec<GroupedLink>, String> {
    let slug = normalize_slug(slug)?;
    let links = open_storage(state)?.load(&slug);
    Ok(LinkAggregator::from_links(to_link_stats(&links)).grouped(sort))
}

/// Remove one stored link; returns what is left
pub fn remove_stored_link(state: &AppState, slug: &str, url: &str) -> Result<Vec<StoredLink>, String> {
    let slug = normalize_slug(slug)?;
    Ok(open_storage(state)?.remove(&slug, url))
}

pub fn clear_stored_links(state: &AppState, slug: &str) -> Result<(), String> {
    let slug = normalize_slug(slug)?;
    open_storage(state)?.clear(&slug);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::Settings;

    fn stat(url: &str, count: u64, last_at: &str) -> LinkStat {
        LinkStat {
            url: url.to_string(),
            hostname: crate::services::url_canonicalizer::safe_hostname(url),
            count,
            last_at: last_at.to_string(),
            last_sender: "u".to_string(),
        }
    }

    #[test]
    fn test_offline_link_commands() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(Settings::default(), dir.path().to_path_buf());
        let storage = open_storage(&state).unwrap();
        storage.add_or_update("streamer", &stat("https://a.io/1", 5, "2024-05-01T12:00:00Z"));
        storage.add_or_update("streamer", &stat("https://b.io/1", 1, "2024-05-01T13:00:00Z"));

        let recent = get_stored_links(&state, " Streamer ", LinkSort::Recent).unwrap();
        assert_eq!(recent[0].url, "https://b.io/1");
        let popular = get_stored_links(&state, "streamer", LinkSort::Popular).unwrap();
        assert_eq!(popular[0].url, "https://a.io/1");
        assert_eq!(get_grouped_links(&state, "streamer", LinkSort::Recent).unwrap().len(), 2);

        let left = remove_stored_link(&state, "streamer", "https://a.io/1").unwrap();
        assert_eq!(left.len(), 1);
        clear_stored_links(&state, "streamer").unwrap();
        assert!(get_stored_links(&state, "streamer", LinkSort::Recent).unwrap().is_empty());
        assert!(clear_stored_links(&state, "  ").is_err());
    }
}
