use crate::models::channel::KickChannel;
use crate::models::chat::ChatMessage;
use crate::models::links::{GroupedLink, LinkSort, LinkStat, LinkStats};
use crate::services::link_aggregator::{LinkAggregator, LinkMap};
use crate::services::link_storage_service::LinkStorageService;
use crate::services::message_parser::parse_chat_event;
use crate::services::pusher_service::{chatroom_topic, ChatTransport, TransportEvent, CHAT_MESSAGE_EVENT};
use crate::services::storage_backend::KeyValueStore;
use log::{debug, info, warn};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveChannel {
    pub slug: String,
    pub chatroom_id: Option<u64>,
    pub topic: Option<String>,
}

/// The pipeline for whichever channel is currently being watched.
///
/// Events are handled one at a time in delivery order. Anything not addressed
/// to the active topic is dropped, so a late event from a previous channel
/// can never touch the current mapping.
pub struct ChatSession<T: ChatTransport, S: KeyValueStore> {
    transport: T,
    storage: Option<LinkStorageService<S>>,
    active: Option<ActiveChannel>,
    messages: Vec<ChatMessage>,
    links: LinkAggregator,
}

impl<T: ChatTransport, S: KeyValueStore> ChatSession<T, S> {
    /// `storage` of `None` disables persistence
    pub fn new(transport: T, storage: Option<LinkStorageService<S>>) -> Self {
        Self {
            transport,
            storage,
            active: None,
            messages: Vec::new(),
            links: LinkAggregator::new(),
        }
    }

    pub fn active_slug(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.slug.as_str())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn links(&self) -> Arc<LinkMap> {
        self.links.snapshot()
    }

    pub fn sorted_links(&self, sort: LinkSort) -> Vec<LinkStat> {
        self.links.sorted_links(sort)
    }

    pub fn grouped_links(&self, sort: LinkSort) -> Vec<GroupedLink> {
        self.links.grouped(sort)
    }

    pub fn link_stats(&self) -> LinkStats {
        self.links.stats()
    }

    pub fn persistence_enabled(&self) -> bool {
        self.storage.is_some()
    }

    /// Links persisted for the active channel; 0 without persistence
    pub fn stored_count(&self) -> usize {
        match (&self.storage, &self.active) {
            (Some(storage), Some(active)) => storage.count(&active.slug),
            _ => 0,
        }
    }

    /// Tear down the current subscription, then set up the new channel.
    /// `None` just leaves the current channel.
    pub fn switch_channel(&mut self, channel: Option<&KickChannel>) {
        self.leave();

        let Some(channel) = channel else {
            self.reset_links();
            return;
        };

        let chatroom_id = channel.chatroom_id();
        let topic = chatroom_id.map(chatroom_topic);
        self.active = Some(ActiveChannel {
            slug: channel.slug.clone(),
            chatroom_id,
            topic: topic.clone(),
        });
        self.reset_links();

        match topic {
            Some(topic) => match self.transport.subscribe(&topic) {
                Ok(()) => info!("[ChatSession] Watching {} on {}", channel.slug, topic),
                Err(e) => warn!("[ChatSession] Failed to subscribe to {}: {:#}", topic, e),
            },
            None => warn!("[ChatSession] Channel {} has no chatroom", channel.slug),
        }
    }

    pub fn disconnect(&mut self) {
        self.leave();
        self.reset_links();
    }

    fn leave(&mut self) {
        if let Some(previous) = self.active.take() {
            if let Some(topic) = previous.topic {
                if let Err(e) = self.transport.unsubscribe(&topic) {
                    warn!("[ChatSession] Failed to unsubscribe from {}: {:#}", topic, e);
                }
                debug!("[ChatSession] Left {}", topic);
            }
        }
        self.messages.clear();
    }

    /// Live mapping back to the persisted links of the active channel, or empty
    fn reset_links(&mut self) {
        let stored = match (&self.storage, &self.active) {
            (Some(storage), Some(active)) => storage.load_link_map(&active.slug),
            _ => LinkMap::new(),
        };
        self.links.replace(stored);
    }

    /// Process one transport event. Returns the appended message, if any.
    pub fn handle_event(&mut self, event: &TransportEvent) -> Option<&ChatMessage> {
        let active_topic = self.active.as_ref().and_then(|a| a.topic.as_deref());
        if active_topic != Some(event.channel.as_str()) {
            debug!("[ChatSession] Dropping event for inactive topic {}", event.channel);
            return None;
        }
        if event.event != CHAT_MESSAGE_EVENT {
            return None;
        }

        let message = parse_chat_event(&event.payload)?;
        let updated = self.links.ingest(&message);

        if let (Some(storage), Some(active)) = (&self.storage, &self.active) {
            for stat in &updated {
                storage.add_or_update(&active.slug, stat);
            }
        }

        self.messages.push(message);
        self.messages.last()
    }

    /// Drop the message list and reload the mapping from storage
    pub fn clear_data(&mut self) {
        self.messages.clear();
        self.reset_links();
    }

    pub fn remove_link(&mut self, url: &str) -> bool {
        let removed = self.links.remove(url);
        if let (Some(storage), Some(active)) = (&self.storage, &self.active) {
            storage.remove(&active.slug, url);
        }
        removed
    }

    /// Forget every link of the active channel, persisted ones included
    pub fn clear_all_links(&mut self) {
        self.links.clear();
        if let (Some(storage), Some(active)) = (&self.storage, &self.active) {
            storage.clear(&active.slug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::channel::Chatroom;
    use crate::services::storage_backend::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingTransport {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChatTransport for RecordingTransport {
        fn subscribe(&mut self, topic: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("subscribe {}", topic));
            Ok(())
        }

        fn unsubscribe(&mut self, topic: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("unsubscribe {}", topic));
            Ok(())
        }
    }

    fn channel(slug: &str, chatroom: u64) -> KickChannel {
        KickChannel {
            id: chatroom,
            slug: slug.to_string(),
            followers_count: 0,
            chatroom: Some(Chatroom { id: chatroom }),
            livestream: None,
        }
    }

    fn chat_event(chatroom: u64, sender: &str, content: &str, at: &str) -> TransportEvent {
        let data = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "content": content,
            "sender": { "username": sender },
            "created_at": at,
        });
        TransportEvent {
            channel: chatroom_topic(chatroom),
            event: CHAT_MESSAGE_EVENT.to_string(),
            payload: json!(data.to_string()),
        }
    }

    fn session(transport: &RecordingTransport) -> ChatSession<RecordingTransport, MemoryStore> {
        ChatSession::new(transport.clone(), Some(LinkStorageService::new(MemoryStore::new())))
    }

    #[test]
    fn test_switch_unsubscribes_before_subscribing() {
        let transport = RecordingTransport::default();
        let mut session = session(&transport);
        session.switch_channel(Some(&channel("a", 1)));
        session.switch_channel(Some(&channel("b", 2)));
        session.switch_channel(None);

        assert_eq!(
            transport.calls(),
            vec![
                "subscribe chatrooms.1.v2",
                "unsubscribe chatrooms.1.v2",
                "subscribe chatrooms.2.v2",
                "unsubscribe chatrooms.2.v2",
            ]
        );
        assert!(session.active_slug().is_none());
    }

    #[test]
    fn test_stale_events_do_not_touch_new_channel() {
        let transport = RecordingTransport::default();
        let mut session = session(&transport);
        session.switch_channel(Some(&channel("a", 1)));
        session.handle_event(&chat_event(1, "u", "https://a.io/x", "2024-05-01T12:00:00Z"));

        session.switch_channel(Some(&channel("b", 2)));
        assert!(session.messages().is_empty());
        assert!(session.links().is_empty());

        assert!(session
            .handle_event(&chat_event(1, "u", "https://a.io/late", "2024-05-01T12:01:00Z"))
            .is_none());
        assert!(session.links().is_empty());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_two_senders_share_one_link() {
        let transport = RecordingTransport::default();
        let mut session = session(&transport);
        session.switch_channel(Some(&channel("a", 1)));
        session.handle_event(&chat_event(1, "alice", "see https://a.io/x?utm_source=tw", "2024-05-01T12:00:00Z"));
        session.handle_event(&chat_event(1, "bob", "again https://a.io/x/", "2024-05-01T12:01:00Z"));

        let links = session.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links["https://a.io/x"].count, 2);
        assert_eq!(links["https://a.io/x"].last_sender, "bob");
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_persisted_links_return_on_rejoin() {
        let transport = RecordingTransport::default();
        let mut session = session(&transport);
        session.switch_channel(Some(&channel("a", 1)));
        session.handle_event(&chat_event(1, "u", "https://a.io/x", "2024-05-01T12:00:00Z"));
        session.switch_channel(Some(&channel("b", 2)));
        session.switch_channel(Some(&channel("a", 1)));

        assert_eq!(session.links()["https://a.io/x"].count, 1);
        assert_eq!(session.active_slug(), Some("a"));
        assert!(session.persistence_enabled());
        assert_eq!(session.stored_count(), 1);

        session.remove_link("https://a.io/x");
        session.clear_data();
        assert!(session.links().is_empty());
    }

    #[test]
    fn test_without_persistence_switch_clears_links() {
        let transport = RecordingTransport::default();
        let mut session: ChatSession<_, MemoryStore> = ChatSession::new(transport.clone(), None);
        session.switch_channel(Some(&channel("a", 1)));
        session.handle_event(&chat_event(1, "u", "https://a.io/x", "2024-05-01T12:00:00Z"));
        assert_eq!(session.link_stats().unique_links, 1);

        session.switch_channel(Some(&channel("a", 1)));
        assert!(session.links().is_empty());
        assert!(!session.persistence_enabled());
        assert_eq!(session.stored_count(), 0);
    }

    #[test]
    fn test_empty_and_foreign_events_are_ignored() {
        let transport = RecordingTransport::default();
        let mut session = session(&transport);
        session.switch_channel(Some(&channel("a", 1)));

        assert!(session.handle_event(&chat_event(1, "u", "", "")).is_none());
        let mut other = chat_event(1, "u", "https://a.io", "");
        other.event = "App\\Events\\MessageDeletedEvent".to_string();
        assert!(session.handle_event(&other).is_none());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_clear_all_links_forgets_storage() {
        let transport = RecordingTransport::default();
        let mut session = session(&transport);
        session.switch_channel(Some(&channel("a", 1)));
        session.handle_event(&chat_event(1, "u", "https://a.io/x https://b.io", "2024-05-01T12:00:00Z"));
        session.clear_all_links();
        session.clear_data();
        assert!(session.links().is_empty());
    }
}
