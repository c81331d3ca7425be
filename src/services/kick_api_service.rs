use crate::models::channel::KickChannel;
use log::{debug, info};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Channel not found: {0}")]
    NotFound(String),
    #[error("Kick API returned {0}")]
    Http(StatusCode),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Unexpected channel payload: {0}")]
    Decode(String),
    #[error("Lookup cancelled")]
    Cancelled,
}

impl LookupError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LookupError::Cancelled)
    }
}

pub struct KickApiService {
    client: reqwest::Client,
    base_url: String,
}

impl KickApiService {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .gzip(true)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn channel_url(&self, username: &str) -> String {
        format!(
            "{}/channels/{}",
            self.base_url,
            urlencoding::encode(username.trim())
        )
    }

    pub async fn fetch_channel(&self, username: &str) -> Result<KickChannel, LookupError> {
        let url = self.channel_url(username);
        debug!("[KickApi] GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(LookupError::NotFound(username.trim().to_string())),
            status => return Err(LookupError::Http(status)),
        }

        let channel: KickChannel = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;

        info!(
            "[KickApi] Resolved {} -> slug {} (chatroom {:?})",
            username.trim(),
            channel.slug,
            channel.chatroom_id()
        );
        Ok(channel)
    }
}

struct PendingLookup {
    username: String,
    task: JoinHandle<Result<KickChannel, LookupError>>,
}

/// At most one channel lookup in flight. Starting a new one aborts the
/// previous task, so a stale result can never be delivered.
#[derive(Default)]
pub struct ChannelLookup {
    pending: Option<PendingLookup>,
}

impl ChannelLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<F>(&mut self, username: &str, lookup: F)
    where
        F: Future<Output = Result<KickChannel, LookupError>> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(PendingLookup {
            username: username.to_string(),
            task: tokio::spawn(lookup),
        });
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("[ChannelLookup] Cancelling lookup for {}", pending.username);
            pending.task.abort();
        }
    }

    /// Wait for the current lookup. Never resolves while nothing is pending,
    /// which keeps it usable as a `select!` branch.
    pub async fn finished(&mut self) -> (String, Result<KickChannel, LookupError>) {
        let Some(pending) = self.pending.as_mut() else {
            return std::future::pending().await;
        };

        let result = match (&mut pending.task).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(LookupError::Cancelled),
            Err(e) => Err(LookupError::Transport(e.to_string())),
        };

        let username = self
            .pending
            .take()
            .map(|p| p.username)
            .unwrap_or_default();
        (username, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::channel::Chatroom;

    fn channel(slug: &str, chatroom: u64) -> KickChannel {
        KickChannel {
            id: chatroom,
            slug: slug.to_string(),
            followers_count: 0,
            chatroom: Some(Chatroom { id: chatroom }),
            livestream: None,
        }
    }

    #[test]
    fn test_channel_url_is_encoded() {
        let api = KickApiService::new("https://kick.com/api/v1/");
        assert_eq!(
            api.channel_url("  some user "),
            "https://kick.com/api/v1/channels/some%20user"
        );
    }

    #[tokio::test]
    async fn test_last_request_wins() {
        let mut lookup = ChannelLookup::new();
        lookup.start("slow", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(channel("slow", 1))
        });
        lookup.start("fast", async { Ok(channel("fast", 2)) });

        let (username, result) = lookup.finished().await;
        assert_eq!(username, "fast");
        assert_eq!(result.unwrap().slug, "fast");

        // nothing left to deliver from the cancelled lookup
        let stale = tokio::time::timeout(Duration::from_millis(300), lookup.finished()).await;
        assert!(stale.is_err());
    }

    #[tokio::test]
    async fn test_errors_are_reported() {
        let mut lookup = ChannelLookup::new();
        lookup.start("ghost", async { Err(LookupError::NotFound("ghost".to_string())) });
        let (_, result) = lookup.finished().await;
        let err = result.unwrap_err();
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "Channel not found: ghost");
    }

    #[test]
    fn test_channel_payload_decodes() {
        let json = r#"{"id":7,"slug":"streamer","followers_count":12,
            "chatroom":{"id":99,"chatable_type":"App\\Models\\Channel"},
            "livestream":{"viewer_count":5,"session_title":"hi","category":{"name":"Just Chatting"}},
            "user":{"username":"Streamer"}}"#;
        let channel: KickChannel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.chatroom_id(), Some(99));
        assert!(channel.is_live());
    }
}
