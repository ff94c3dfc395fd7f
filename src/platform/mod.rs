// Platform SDK boundary
// Everything the client needs from the social platform goes through the `Client` trait.
// Requests complete through boxed continuations; push events are registered per kind.
// Nothing here blocks: continuations run later, from `Client::run_callbacks`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub mod deadline;
pub mod loopback;

pub use deadline::Deadlines;
pub use loopback::LoopbackClient;

pub type UserId = u64;
pub type MessageId = u64;
pub type LobbyId = u64;
pub type ChannelId = u64;

/// Errors reported by the platform for a single request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Failed(String),

    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("client is not connected")]
    Disconnected,
}

pub type ClientResult<T> = Result<T, PlatformError>;

/// Continuation invoked once with the outcome of a platform request
pub type Completion<T> = Box<dyn FnOnce(ClientResult<T>)>;

/// Live presence reported for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Online,
    Idle,
    DoNotDisturb,
    Invisible,
    Offline,
    Blocked,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Online => "Online",
            Status::Idle => "Idle",
            Status::DoNotDisturb => "Do Not Disturb",
            Status::Invisible => "Invisible",
            Status::Offline => "Offline",
            Status::Blocked => "Blocked",
            Status::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Kind of relationship between the current user and another user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationshipKind {
    #[default]
    None,
    Friend,
    Blocked,
    PendingIncoming,
    PendingOutgoing,
    Implicit,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RelationshipKind::None => "None",
            RelationshipKind::Friend => "Friend",
            RelationshipKind::Blocked => "Blocked",
            RelationshipKind::PendingIncoming => "PendingIncoming",
            RelationshipKind::PendingOutgoing => "PendingOutgoing",
            RelationshipKind::Implicit => "Implicit",
        };
        f.write_str(label)
    }
}

/// Relationship on the platform itself and inside this application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Relationship {
    pub platform: RelationshipKind,
    pub game: RelationshipKind,
}

/// Platform-side view of a user
#[derive(Debug, Clone, PartialEq)]
pub struct UserHandle {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub status: Status,
    pub is_provisional: bool,
    /// Online and currently running this application
    pub in_game: bool,
    pub relationship: Relationship,
}

impl UserHandle {
    pub fn new(id: UserId, username: &str, status: Status) -> Self {
        UserHandle {
            id,
            username: username.to_string(),
            display_name: String::new(),
            status,
            is_provisional: false,
            in_game: false,
            relationship: Relationship {
                platform: RelationshipKind::Friend,
                game: RelationshipKind::None,
            },
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    pub fn in_game(mut self) -> Self {
        self.in_game = true;
        self
    }
}

/// Relationship groups the platform sorts users into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationshipGroup {
    InGame,
    OnlineElsewhere,
    Offline,
}

impl RelationshipGroup {
    pub const ALL: [RelationshipGroup; 3] = [
        RelationshipGroup::InGame,
        RelationshipGroup::OnlineElsewhere,
        RelationshipGroup::Offline,
    ];

    /// Group a user belongs to given their current presence
    pub fn classify(user: &UserHandle) -> Self {
        match user.status {
            Status::Offline | Status::Invisible | Status::Blocked | Status::Unknown => {
                RelationshipGroup::Offline
            }
            _ if user.in_game => RelationshipGroup::InGame,
            _ => RelationshipGroup::OnlineElsewhere,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelationshipGroup::InGame => "In Game",
            RelationshipGroup::OnlineElsewhere => "Online Elsewhere",
            RelationshipGroup::Offline => "Offline",
        }
    }
}

/// A direct message as stored by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHandle {
    pub id: MessageId,
    pub author_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    /// Milliseconds since the unix epoch
    pub sent_timestamp: i64,
}

/// Connection state reported through the status-changed callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Disconnected,
    Connecting,
    Connected,
    Ready,
    Reconnecting,
    Disconnecting,
    HttpWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyPrivacy {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityParty {
    pub id: String,
    pub current_size: u32,
    pub max_size: u32,
    pub privacy: PartyPrivacy,
}

/// Rich presence published for the current user
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub state: Option<String>,
    pub details: Option<String>,
    pub join_secret: Option<String>,
    pub party: Option<ActivityParty>,
    pub desktop_only: bool,
}

impl Activity {
    pub fn playing() -> Self {
        Activity {
            kind: ActivityKind::Playing,
            state: None,
            details: None,
            join_secret: None,
            party: None,
            desktop_only: false,
        }
    }
}

/// An invitation to join another user's activity
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityInvite {
    pub sender_id: UserId,
    pub party_id: String,
    pub message_id: MessageId,
}

/// Handle to an active voice call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub lobby_id: LobbyId,
    pub channel_id: ChannelId,
    pub participants: Vec<UserId>,
}

/// Arguments for the OAuth authorization request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationArgs {
    pub client_id: u64,
    pub scopes: String,
    pub code_challenge: String,
    pub challenge_method: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationCode {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub application_id: u64,
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

/// The callback-based platform client consumed by the core
pub trait Client {
    fn current_user(&self) -> Option<UserHandle>;
    fn user(&self, id: UserId) -> Option<UserHandle>;
    fn message(&self, id: MessageId) -> Option<MessageHandle>;
    fn relationships_by_group(&self, group: RelationshipGroup) -> Vec<UserHandle>;

    // Authentication and connection
    fn authorize(&self, args: AuthorizationArgs, done: Completion<AuthorizationCode>);
    fn get_token(&self, request: TokenRequest, done: Completion<AccessToken>);
    fn update_token(&self, token: &AccessToken, done: Completion<()>);
    fn connect(&self);

    // Messaging
    fn fetch_message_history(&self, user: UserId, limit: usize, done: Completion<Vec<MessageHandle>>);
    fn send_message(&self, user: UserId, content: &str, done: Completion<MessageId>);

    // Presence, lobbies and calls
    fn update_rich_presence(&self, activity: Activity, done: Completion<()>);
    fn create_or_join_lobby(&self, secret: &str, done: Completion<LobbyId>);
    fn send_activity_invite(&self, user: UserId, content: &str, done: Completion<()>);
    fn accept_activity_invite(&self, invite: &ActivityInvite, done: Completion<String>);
    fn start_call(&self, lobby: LobbyId) -> Option<Call>;
    fn end_call(&self, channel: ChannelId, done: Box<dyn FnOnce()>);

    // Push events
    fn set_status_changed_callback(&self, handler: Box<dyn FnMut(ClientStatus, Option<PlatformError>)>);
    fn set_relationship_groups_updated_callback(&self, handler: Box<dyn FnMut(UserId)>);
    fn set_relationship_created_callback(&self, handler: Box<dyn FnMut(UserId, bool)>);
    fn set_relationship_deleted_callback(&self, handler: Box<dyn FnMut(UserId)>);
    fn set_user_updated_callback(&self, handler: Box<dyn FnMut(UserId)>);
    fn set_message_created_callback(&self, handler: Box<dyn FnMut(MessageId)>);
    fn set_activity_invite_created_callback(&self, handler: Box<dyn FnMut(ActivityInvite)>);
    /// Handler receives (channel, participant, joined)
    fn set_call_participants_changed_callback(&self, handler: Box<dyn FnMut(ChannelId, UserId, bool)>);

    /// Deliver everything queued so far. Work queued during delivery waits for the next call.
    fn run_callbacks(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_groups() {
        let playing = UserHandle::new(1, "amy", Status::Idle).in_game();
        let elsewhere = UserHandle::new(2, "greg", Status::DoNotDisturb);
        let invisible = UserHandle::new(3, "daria", Status::Invisible).in_game();

        assert_eq!(RelationshipGroup::classify(&playing), RelationshipGroup::InGame);
        assert_eq!(RelationshipGroup::classify(&elsewhere), RelationshipGroup::OnlineElsewhere);
        assert_eq!(RelationshipGroup::classify(&invisible), RelationshipGroup::Offline);
    }

    #[test]
    fn test_platform_error_messages() {
        assert_eq!(
            PlatformError::Failed("rate limited".to_string()).to_string(),
            "request failed: rate limited"
        );
        assert_eq!(PlatformError::Disconnected.to_string(), "client is not connected");
    }
}
