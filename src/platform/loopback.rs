// Loopback platform client
// In-process stand-in for the social SDK. Requests are answered on a later `run_callbacks`,
// never inline, so callers see the same ordering they would against the real service.
// Test hooks drive push events and inject failures.

use chrono::Utc;
use log::{debug, info};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use super::{
    AccessToken, Activity, ActivityInvite, AuthorizationArgs, AuthorizationCode, Call, ChannelId,
    Client, ClientStatus, Completion, LobbyId, MessageHandle, MessageId, PlatformError,
    RelationshipGroup, Status, TokenRequest, UserHandle, UserId,
};
use crate::presence::VOICE_CALL_PREFIX;

/// Requests that can be made to fail or stall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Authorize,
    GetToken,
    UpdateToken,
    FetchHistory,
    SendMessage,
    UpdatePresence,
    JoinLobby,
    SendInvite,
    AcceptInvite,
    StartCall,
    EndCall,
}

#[derive(Debug, Clone)]
enum Fault {
    Fail(String),
    /// Never answer
    Stall,
}

enum Event {
    Status(ClientStatus, Option<PlatformError>),
    GroupsUpdated(UserId),
    RelationshipCreated(UserId, bool),
    RelationshipDeleted(UserId),
    UserUpdated(UserId),
    MessageCreated(MessageId),
    InviteCreated(ActivityInvite),
    ParticipantsChanged(ChannelId, UserId, bool),
}

enum Delivery {
    Completion(Box<dyn FnOnce()>),
    Event(Event),
}

type Slot<F> = RefCell<Option<Box<F>>>;

#[derive(Default)]
struct Handlers {
    status_changed: Slot<dyn FnMut(ClientStatus, Option<PlatformError>)>,
    groups_updated: Slot<dyn FnMut(UserId)>,
    relationship_created: Slot<dyn FnMut(UserId, bool)>,
    relationship_deleted: Slot<dyn FnMut(UserId)>,
    user_updated: Slot<dyn FnMut(UserId)>,
    message_created: Slot<dyn FnMut(MessageId)>,
    invite_created: Slot<dyn FnMut(ActivityInvite)>,
    participants_changed: Slot<dyn FnMut(ChannelId, UserId, bool)>,
}

/// Take the handler out while it runs so it may call back into the client
fn with_handler<F: ?Sized>(slot: &Slot<F>, call: impl FnOnce(&mut F)) {
    let taken = slot.borrow_mut().take();
    match taken {
        Some(mut handler) => {
            call(&mut *handler);
            let mut slot = slot.borrow_mut();
            // A handler registered while this one ran replaces it
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
        None => debug!("No handler registered, dropping event"),
    }
}

struct World {
    me: UserHandle,
    users: HashMap<UserId, UserHandle>,
    friends: Vec<UserId>,
    messages: HashMap<MessageId, MessageHandle>,
    lobbies: HashMap<String, LobbyId>,
    calls: HashMap<ChannelId, Call>,
    presence_updates: Vec<Activity>,
    invites_sent: Vec<(UserId, String)>,
    end_call_requests: Vec<ChannelId>,
    token: Option<AccessToken>,
}

pub struct LoopbackClient {
    world: RefCell<World>,
    next_id: Cell<u64>,
    status: Cell<ClientStatus>,
    echo_replies: Cell<bool>,
    faults: RefCell<HashMap<Operation, Fault>>,
    queue: RefCell<VecDeque<Delivery>>,
    handlers: Handlers,
}

impl LoopbackClient {
    pub fn new() -> Self {
        Self::with_current_user(UserHandle::new(1, "me", Status::Online).with_display_name("Me"))
    }

    pub fn with_current_user(me: UserHandle) -> Self {
        let mut users = HashMap::new();
        users.insert(me.id, me.clone());
        LoopbackClient {
            world: RefCell::new(World {
                me,
                users,
                friends: Vec::new(),
                messages: HashMap::new(),
                lobbies: HashMap::new(),
                calls: HashMap::new(),
                presence_updates: Vec::new(),
                invites_sent: Vec::new(),
                end_call_requests: Vec::new(),
                token: None,
            }),
            next_id: Cell::new(1000),
            status: Cell::new(ClientStatus::Disconnected),
            echo_replies: Cell::new(false),
            faults: RefCell::new(HashMap::new()),
            queue: RefCell::new(VecDeque::new()),
            handlers: Handlers::default(),
        }
    }

    /// A small friend list with some history, used by the binary
    pub fn demo() -> Self {
        let mut client = Self::new().with_echo_replies();
        let friends = [
            UserHandle::new(2, "amy", Status::Online)
                .with_display_name("Amy")
                .in_game(),
            UserHandle::new(3, "greg", Status::Idle).with_display_name("Greg"),
            UserHandle::new(4, "daria", Status::DoNotDisturb)
                .with_display_name("Daria")
                .in_game(),
            UserHandle::new(5, "mo", Status::Offline),
            UserHandle::new(6, "kit", Status::Online).with_display_name("Kit"),
        ];
        for friend in friends {
            client = client.with_friend(friend);
        }
        client.seed_message(2, 1, "are you on tonight?");
        client.seed_message(1, 2, "after dinner");
        client.seed_message(3, 1, "sent you the replay");
        client
    }

    /// Start with `user` already on the friend list
    pub fn with_friend(self, user: UserHandle) -> Self {
        self.seed_friend(user);
        self
    }

    /// Answer every sent message with an echo from the recipient
    pub fn with_echo_replies(self) -> Self {
        self.echo_replies.set(true);
        self
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn push(&self, delivery: Delivery) {
        self.queue.borrow_mut().push_back(delivery);
    }

    fn emit(&self, event: Event) {
        self.push(Delivery::Event(event));
    }

    fn answer<T: 'static>(&self, done: Completion<T>, result: Result<T, PlatformError>) {
        self.push(Delivery::Completion(Box::new(move || done(result))));
    }

    /// Apply a pending fault. Returns the continuation back when the request should proceed.
    fn intercept<T: 'static>(&self, op: Operation, done: Completion<T>) -> Option<Completion<T>> {
        let fault = self.faults.borrow_mut().remove(&op);
        match fault {
            None => Some(done),
            Some(Fault::Fail(reason)) => {
                debug!("Failing {:?}: {}", op, reason);
                self.answer(done, Err(PlatformError::Failed(reason)));
                None
            }
            Some(Fault::Stall) => {
                debug!("Stalling {:?}", op);
                None
            }
        }
    }

    fn store_message(&self, author_id: UserId, recipient_id: UserId, content: &str) -> MessageId {
        let id = self.allocate_id();
        let handle = MessageHandle {
            id,
            author_id,
            recipient_id,
            content: content.to_string(),
            sent_timestamp: Utc::now().timestamp_millis(),
        };
        self.world.borrow_mut().messages.insert(id, handle);
        id
    }

    fn seed_friend(&self, user: UserHandle) {
        let mut world = self.world.borrow_mut();
        world.friends.push(user.id);
        world.users.insert(user.id, user);
    }

    fn seed_message(&self, author_id: UserId, recipient_id: UserId, content: &str) {
        self.store_message(author_id, recipient_id, content);
    }

    // Test hooks

    /// Make the next request of this kind fail with `reason`
    pub fn fail_next(&self, op: Operation, reason: &str) {
        self.faults
            .borrow_mut()
            .insert(op, Fault::Fail(reason.to_string()));
    }

    /// Make the next request of this kind go unanswered
    pub fn stall_next(&self, op: Operation) {
        self.faults.borrow_mut().insert(op, Fault::Stall);
    }

    pub fn add_friend(&self, user: UserHandle) {
        let id = user.id;
        self.seed_friend(user);
        self.emit(Event::RelationshipCreated(id, false));
    }

    pub fn remove_friend(&self, id: UserId) {
        self.world.borrow_mut().friends.retain(|f| *f != id);
        self.emit(Event::RelationshipDeleted(id));
    }

    pub fn set_user_status(&self, id: UserId, status: Status) {
        if let Some(user) = self.world.borrow_mut().users.get_mut(&id) {
            user.status = status;
        }
        self.emit(Event::UserUpdated(id));
    }

    /// Move a user between groups and report it the way the platform does
    pub fn set_in_game(&self, id: UserId, in_game: bool) {
        if let Some(user) = self.world.borrow_mut().users.get_mut(&id) {
            user.in_game = in_game;
        }
        self.emit(Event::GroupsUpdated(id));
    }

    pub fn receive_message(&self, from: UserId, content: &str) -> MessageId {
        let me = self.world.borrow().me.id;
        let id = self.store_message(from, me, content);
        self.emit(Event::MessageCreated(id));
        id
    }

    /// `from` invites the current user to a voice call
    pub fn send_voice_invite(&self, from: UserId) -> String {
        let secret = {
            let world = self.world.borrow();
            let them = world
                .users
                .get(&from)
                .map(|u| u.username.clone())
                .unwrap_or_else(|| from.to_string());
            format!("{}{}:{}", VOICE_CALL_PREFIX, them, world.me.username)
        };
        let message_id = self.allocate_id();
        self.emit(Event::InviteCreated(ActivityInvite {
            sender_id: from,
            party_id: secret.clone(),
            message_id,
        }));
        secret
    }

    /// Any activity invite, voice or not
    pub fn send_invite(&self, invite: ActivityInvite) {
        self.emit(Event::InviteCreated(invite));
    }

    pub fn leave_call(&self, channel: ChannelId, participant: UserId) {
        if let Some(call) = self.world.borrow_mut().calls.get_mut(&channel) {
            call.participants.retain(|p| *p != participant);
        }
        self.emit(Event::ParticipantsChanged(channel, participant, false));
    }

    pub fn emit_status(&self, status: ClientStatus, error: Option<PlatformError>) {
        self.status.set(status);
        self.emit(Event::Status(status, error));
    }

    pub fn status(&self) -> ClientStatus {
        self.status.get()
    }

    pub fn presence_updates(&self) -> Vec<Activity> {
        self.world.borrow().presence_updates.clone()
    }

    pub fn invites_sent(&self) -> Vec<(UserId, String)> {
        self.world.borrow().invites_sent.clone()
    }

    /// Channels the client was asked to end, in request order
    pub fn end_call_requests(&self) -> Vec<ChannelId> {
        self.world.borrow().end_call_requests.clone()
    }

    pub fn open_calls(&self) -> usize {
        self.world.borrow().calls.len()
    }

    pub fn token(&self) -> Option<AccessToken> {
        self.world.borrow().token.clone()
    }

    /// Nothing waiting to be delivered
    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    fn dispatch(&self, event: Event) {
        let h = &self.handlers;
        match event {
            Event::Status(status, error) => {
                with_handler(&h.status_changed, |f| f(status, error))
            }
            Event::GroupsUpdated(id) => with_handler(&h.groups_updated, |f| f(id)),
            Event::RelationshipCreated(id, is_update) => {
                with_handler(&h.relationship_created, |f| f(id, is_update))
            }
            Event::RelationshipDeleted(id) => with_handler(&h.relationship_deleted, |f| f(id)),
            Event::UserUpdated(id) => with_handler(&h.user_updated, |f| f(id)),
            Event::MessageCreated(id) => with_handler(&h.message_created, |f| f(id)),
            Event::InviteCreated(invite) => with_handler(&h.invite_created, |f| f(invite)),
            Event::ParticipantsChanged(channel, user, joined) => {
                with_handler(&h.participants_changed, |f| f(channel, user, joined))
            }
        }
    }
}

impl Default for LoopbackClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Client for LoopbackClient {
    fn current_user(&self) -> Option<UserHandle> {
        Some(self.world.borrow().me.clone())
    }

    fn user(&self, id: UserId) -> Option<UserHandle> {
        self.world.borrow().users.get(&id).cloned()
    }

    fn message(&self, id: MessageId) -> Option<MessageHandle> {
        self.world.borrow().messages.get(&id).cloned()
    }

    fn relationships_by_group(&self, group: RelationshipGroup) -> Vec<UserHandle> {
        let world = self.world.borrow();
        world
            .friends
            .iter()
            .filter_map(|id| world.users.get(id))
            .filter(|user| RelationshipGroup::classify(user) == group)
            .cloned()
            .collect()
    }

    fn authorize(&self, args: AuthorizationArgs, done: Completion<AuthorizationCode>) {
        let Some(done) = self.intercept(Operation::Authorize, done) else {
            return;
        };
        info!("Authorizing application {} for {}", args.client_id, args.scopes);
        self.answer(
            done,
            Ok(AuthorizationCode {
                code: format!("loopback-{}", args.code_challenge.len()),
                redirect_uri: "http://127.0.0.1/callback".to_string(),
            }),
        );
    }

    fn get_token(&self, request: TokenRequest, done: Completion<AccessToken>) {
        let Some(done) = self.intercept(Operation::GetToken, done) else {
            return;
        };
        if request.code_verifier.is_empty() {
            self.answer(done, Err(PlatformError::Failed("missing code verifier".to_string())));
            return;
        }
        self.answer(
            done,
            Ok(AccessToken {
                access_token: format!("access-{}", request.code),
                refresh_token: format!("refresh-{}", request.code),
                token_type: "Bearer".to_string(),
                expires_in: 604_800,
                scope: "openid sdk.social_layer".to_string(),
            }),
        );
    }

    fn update_token(&self, token: &AccessToken, done: Completion<()>) {
        let Some(done) = self.intercept(Operation::UpdateToken, done) else {
            return;
        };
        self.world.borrow_mut().token = Some(token.clone());
        self.answer(done, Ok(()));
    }

    fn connect(&self) {
        if self.world.borrow().token.is_none() {
            self.emit_status(ClientStatus::Disconnected, Some(PlatformError::Disconnected));
            return;
        }
        self.emit_status(ClientStatus::Connecting, None);
        self.emit_status(ClientStatus::Connected, None);
        self.emit_status(ClientStatus::Ready, None);
    }

    fn fetch_message_history(&self, user: UserId, limit: usize, done: Completion<Vec<MessageHandle>>) {
        let Some(done) = self.intercept(Operation::FetchHistory, done) else {
            return;
        };
        let history = {
            let world = self.world.borrow();
            let me = world.me.id;
            let mut history: Vec<MessageHandle> = world
                .messages
                .values()
                .filter(|m| {
                    (m.author_id == me && m.recipient_id == user)
                        || (m.author_id == user && m.recipient_id == me)
                })
                .cloned()
                .collect();
            history.sort_by_key(|m| (m.sent_timestamp, m.id));
            let skip = history.len().saturating_sub(limit);
            history.split_off(skip)
        };
        self.answer(done, Ok(history));
    }

    fn send_message(&self, user: UserId, content: &str, done: Completion<MessageId>) {
        let Some(done) = self.intercept(Operation::SendMessage, done) else {
            return;
        };
        let me = self.world.borrow().me.id;
        let id = self.store_message(me, user, content);
        self.answer(done, Ok(id));
        self.emit(Event::MessageCreated(id));

        if self.echo_replies.get() {
            let reply = self.store_message(user, me, &format!("echo: {}", content));
            self.emit(Event::MessageCreated(reply));
        }
    }

    fn update_rich_presence(&self, activity: Activity, done: Completion<()>) {
        let Some(done) = self.intercept(Operation::UpdatePresence, done) else {
            return;
        };
        self.world.borrow_mut().presence_updates.push(activity);
        self.answer(done, Ok(()));
    }

    fn create_or_join_lobby(&self, secret: &str, done: Completion<LobbyId>) {
        let Some(done) = self.intercept(Operation::JoinLobby, done) else {
            return;
        };
        let existing = self.world.borrow().lobbies.get(secret).copied();
        let lobby = match existing {
            Some(lobby) => lobby,
            None => {
                let lobby = self.allocate_id();
                self.world
                    .borrow_mut()
                    .lobbies
                    .insert(secret.to_string(), lobby);
                lobby
            }
        };
        self.answer(done, Ok(lobby));
    }

    fn send_activity_invite(&self, user: UserId, content: &str, done: Completion<()>) {
        let Some(done) = self.intercept(Operation::SendInvite, done) else {
            return;
        };
        self.world
            .borrow_mut()
            .invites_sent
            .push((user, content.to_string()));
        self.answer(done, Ok(()));
    }

    fn accept_activity_invite(&self, invite: &ActivityInvite, done: Completion<String>) {
        let Some(done) = self.intercept(Operation::AcceptInvite, done) else {
            return;
        };
        self.answer(done, Ok(invite.party_id.clone()));
    }

    fn start_call(&self, lobby: LobbyId) -> Option<Call> {
        if self.faults.borrow_mut().remove(&Operation::StartCall).is_some() {
            return None;
        }
        let mut world = self.world.borrow_mut();
        if !world.lobbies.values().any(|l| *l == lobby) {
            return None;
        }
        let call = Call {
            lobby_id: lobby,
            channel_id: lobby,
            participants: vec![world.me.id],
        };
        world.calls.insert(call.channel_id, call.clone());
        Some(call)
    }

    fn end_call(&self, channel: ChannelId, done: Box<dyn FnOnce()>) {
        {
            let mut world = self.world.borrow_mut();
            world.calls.remove(&channel);
            world.end_call_requests.push(channel);
        }
        if self.faults.borrow_mut().remove(&Operation::EndCall).is_some() {
            debug!("Leaving end of call on channel {} unconfirmed", channel);
            return;
        }
        self.push(Delivery::Completion(done));
    }

    fn set_status_changed_callback(&self, handler: Box<dyn FnMut(ClientStatus, Option<PlatformError>)>) {
        *self.handlers.status_changed.borrow_mut() = Some(handler);
    }

    fn set_relationship_groups_updated_callback(&self, handler: Box<dyn FnMut(UserId)>) {
        *self.handlers.groups_updated.borrow_mut() = Some(handler);
    }

    fn set_relationship_created_callback(&self, handler: Box<dyn FnMut(UserId, bool)>) {
        *self.handlers.relationship_created.borrow_mut() = Some(handler);
    }

    fn set_relationship_deleted_callback(&self, handler: Box<dyn FnMut(UserId)>) {
        *self.handlers.relationship_deleted.borrow_mut() = Some(handler);
    }

    fn set_user_updated_callback(&self, handler: Box<dyn FnMut(UserId)>) {
        *self.handlers.user_updated.borrow_mut() = Some(handler);
    }

    fn set_message_created_callback(&self, handler: Box<dyn FnMut(MessageId)>) {
        *self.handlers.message_created.borrow_mut() = Some(handler);
    }

    fn set_activity_invite_created_callback(&self, handler: Box<dyn FnMut(ActivityInvite)>) {
        *self.handlers.invite_created.borrow_mut() = Some(handler);
    }

    fn set_call_participants_changed_callback(&self, handler: Box<dyn FnMut(ChannelId, UserId, bool)>) {
        *self.handlers.participants_changed.borrow_mut() = Some(handler);
    }

    fn run_callbacks(&self) {
        let queued = self.queue.borrow().len();
        for _ in 0..queued {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(Delivery::Completion(done)) => done(),
                Some(Delivery::Event(event)) => self.dispatch(event),
                None => break,
            }
        }
    }
}
