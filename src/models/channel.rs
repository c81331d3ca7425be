use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KickChannel {
    pub id: u64,
    pub slug: String,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatroom: Option<Chatroom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livestream: Option<Livestream>,
}

impl KickChannel {
    pub fn chatroom_id(&self) -> Option<u64> {
        self.chatroom.as_ref().map(|c| c.id).filter(|id| *id != 0)
    }

    pub fn is_live(&self) -> bool {
        self.livestream.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Chatroom {
    pub id: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Livestream {
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub session_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Category {
    pub name: String,
}
