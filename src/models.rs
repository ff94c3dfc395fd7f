use std::cmp::Ordering;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use uuid::Uuid;

use crate::platform::{MessageHandle, MessageId, RelationshipGroup, Status, UserHandle, UserId};

/// Read-only view of voice state, used when rendering contact labels
pub trait VoiceStateLookup {
    fn in_call(&self, contact_id: UserId) -> bool;
}

/// Read-only view of unread state, used when rendering contact labels
pub trait UnreadLookup {
    fn has_unread(&self, contact_id: UserId) -> bool;
}

/// Read-only view of the roster cursor
pub trait SelectionLookup {
    fn selected_id(&self) -> Option<UserId>;
}

/// One roster entry. Equality is by id only.
#[derive(Debug, Clone)]
pub struct Contact {
    user: UserHandle,
    group: RelationshipGroup,
}

impl Contact {
    pub fn new(user: UserHandle, group: RelationshipGroup) -> Self {
        Contact { user, group }
    }

    /// Contact placed in the group its current presence implies
    pub fn from_user(user: UserHandle) -> Self {
        let group = RelationshipGroup::classify(&user);
        Contact { user, group }
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Display name, falling back to the username when the platform has none
    pub fn display_name(&self) -> &str {
        if self.user.display_name.is_empty() {
            &self.user.username
        } else {
            &self.user.display_name
        }
    }

    pub fn status(&self) -> Status {
        self.user.status
    }

    pub fn group(&self) -> RelationshipGroup {
        self.group
    }

    pub fn user(&self) -> &UserHandle {
        &self.user
    }

    /// Lower sorts first. Unknown statuses always sort last.
    pub fn status_priority(status: Status) -> u8 {
        match status {
            Status::Online => 0,
            Status::Idle => 1,
            Status::DoNotDisturb => 2,
            Status::Invisible => 3,
            Status::Offline => 4,
            Status::Blocked => 5,
            Status::Unknown => 6,
        }
    }

    pub fn status_glyph(status: Status) -> &'static str {
        match status {
            Status::Online => "🟢",
            Status::Idle => "🟡",
            Status::DoNotDisturb => "🔴",
            Status::Invisible => "⚪",
            Status::Blocked => "⛔",
            Status::Offline | Status::Unknown => "⚫",
        }
    }

    /// Roster order: status priority, then display name, then id
    pub fn roster_cmp(&self, other: &Contact) -> Ordering {
        Self::status_priority(self.status())
            .cmp(&Self::status_priority(other.status()))
            .then_with(|| self.display_name().cmp(other.display_name()))
            .then_with(|| self.id().cmp(&other.id()))
    }

    /// Status, voice and unread glyphs followed by the display name
    pub fn formatted_label(&self, voice: &dyn VoiceStateLookup, unread: &dyn UnreadLookup) -> String {
        let mut glyphs = Self::status_glyph(self.status()).to_string();
        if voice.in_call(self.id()) {
            glyphs.push_str("🔉");
        }
        if unread.has_unread(self.id()) {
            glyphs.push_str("📨");
        }
        format!("{} {}", glyphs, self.display_name())
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Contact {}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum DeliveryStatus {
    Sending,  // Handed to the platform, no answer yet
    Sent,     // Platform accepted it
    Received, // Arrived from the contact
    Failed,   // Platform rejected it
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Platform id, unknown until the platform confirms an outgoing message
    pub id: Option<MessageId>,
    /// Local handle for outgoing messages still waiting for their platform id
    pub nonce: Option<Uuid>,
    pub author_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
}

impl Message {
    pub fn outgoing(author_id: UserId, content: &str) -> Self {
        Message {
            id: None,
            nonce: Some(Uuid::new_v4()),
            author_id,
            content: content.to_string(),
            // Platform timestamps have millisecond precision
            timestamp: Utc::now().trunc_subsecs(3),
            delivery_status: DeliveryStatus::Sending,
        }
    }

    pub fn from_handle(handle: &MessageHandle, delivery_status: DeliveryStatus) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(handle.sent_timestamp)
            .single()
            .unwrap_or_else(Utc::now);
        Message {
            id: Some(handle.id),
            nonce: None,
            author_id: handle.author_id,
            content: handle.content.clone(),
            timestamp,
            delivery_status,
        }
    }
}
