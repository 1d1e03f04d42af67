use serde::Serialize;
use std::fmt;

/// Discord channel type, serialized as its numeric API code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
pub enum ChannelKind {
    Text,
    Dm,
    Voice,
    GroupDm,
    Category,
    Announcement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    Stage,
    Directory,
    Forum,
    Media,
    Other(u16),
}

impl ChannelKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Text,
            1 => Self::Dm,
            2 => Self::Voice,
            3 => Self::GroupDm,
            4 => Self::Category,
            5 => Self::Announcement,
            10 => Self::AnnouncementThread,
            11 => Self::PublicThread,
            12 => Self::PrivateThread,
            13 => Self::Stage,
            14 => Self::Directory,
            15 => Self::Forum,
            16 => Self::Media,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Text => 0,
            Self::Dm => 1,
            Self::Voice => 2,
            Self::GroupDm => 3,
            Self::Category => 4,
            Self::Announcement => 5,
            Self::AnnouncementThread => 10,
            Self::PublicThread => 11,
            Self::PrivateThread => 12,
            Self::Stage => 13,
            Self::Directory => 14,
            Self::Forum => 15,
            Self::Media => 16,
            Self::Other(code) => code,
        }
    }

    /// Channels that carry a message stream. Voice and stage channels have
    /// an embedded text chat, so they count.
    pub fn is_text_based(self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Dm
                | Self::Voice
                | Self::GroupDm
                | Self::Announcement
                | Self::AnnouncementThread
                | Self::PublicThread
                | Self::PrivateThread
                | Self::Stage
        )
    }

    pub fn is_thread(self) -> bool {
        matches!(
            self,
            Self::AnnouncementThread | Self::PublicThread | Self::PrivateThread
        )
    }
}

impl From<ChannelKind> for u16 {
    fn from(kind: ChannelKind) -> Self {
        kind.code()
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Dm => write!(f, "dm"),
            Self::Voice => write!(f, "voice"),
            Self::GroupDm => write!(f, "group_dm"),
            Self::Category => write!(f, "category"),
            Self::Announcement => write!(f, "announcement"),
            Self::AnnouncementThread => write!(f, "announcement_thread"),
            Self::PublicThread => write!(f, "public_thread"),
            Self::PrivateThread => write!(f, "private_thread"),
            Self::Stage => write!(f, "stage"),
            Self::Directory => write!(f, "directory"),
            Self::Forum => write!(f, "forum"),
            Self::Media => write!(f, "media"),
            Self::Other(code) => write!(f, "type:{code}"),
        }
    }
}

/// A channel as fetched by id, before any normalization.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub id: String,
    pub kind: ChannelKind,
    pub archived: bool,
    pub locked: bool,
}

impl ChannelHandle {
    pub fn is_text_based(&self) -> bool {
        self.kind.is_text_based()
    }

    /// A locked thread that has been archived rejects new messages even
    /// though it is still text-based.
    pub fn can_send(&self) -> bool {
        if !self.is_text_based() {
            return false;
        }
        !(self.kind.is_thread() && self.archived && self.locked)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub guild: String,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub content: String,
    pub timestamp: String,
    pub attachments: Vec<String>,
}

/// The identity the bot token authenticates as.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID: {}) in {}", self.name, self.id, self.guild)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(kind: ChannelKind, archived: bool, locked: bool) -> ChannelHandle {
        ChannelHandle {
            id: "1".to_string(),
            kind,
            archived,
            locked,
        }
    }

    #[test]
    fn codes_round_trip_through_kind() {
        for code in [0, 1, 2, 3, 4, 5, 10, 11, 12, 13, 14, 15, 16, 99] {
            assert_eq!(ChannelKind::from_code(code).code(), code);
        }
    }

    #[test]
    fn category_and_forum_are_not_text_based() {
        assert!(!ChannelKind::Category.is_text_based());
        assert!(!ChannelKind::Forum.is_text_based());
        assert!(!ChannelKind::Media.is_text_based());
        assert!(ChannelKind::Voice.is_text_based());
        assert!(ChannelKind::Announcement.is_text_based());
    }

    #[test]
    fn archived_locked_thread_cannot_send() {
        assert!(!handle(ChannelKind::PublicThread, true, true).can_send());
        assert!(handle(ChannelKind::PublicThread, true, false).can_send());
        assert!(handle(ChannelKind::Text, true, true).can_send());
        assert!(!handle(ChannelKind::Category, false, false).can_send());
    }

    #[test]
    fn channel_serializes_type_as_code() {
        let ch = Channel {
            id: "111".to_string(),
            name: "general".to_string(),
            guild: "Home".to_string(),
            kind: ChannelKind::Announcement,
        };
        let value = serde_json::to_value(&ch).unwrap();
        assert_eq!(value["type"], 5);
        assert_eq!(value["guild"], "Home");
    }
}
