// Voice calls: the session registry plus the platform round-trips that feed it
// The registry only records calls the platform has confirmed. Outbound setup is a chain of
// lobby join -> rich presence -> invite -> start call; any failed step ends the chain with
// nothing recorded, and once the call presence is out a failure puts the default one back.

use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use crate::models::VoiceStateLookup;
use crate::notify::Notifier;
use crate::platform::{ActivityInvite, Call, ChannelId, Client, Deadlines, LobbyId, UserId};
use crate::presence::{self, VOICE_CALL_PREFIX};

pub struct SessionRegistry {
    client: Rc<dyn Client>,
    deadlines: Rc<Deadlines>,
    active_calls: RefCell<HashMap<UserId, Call>>,
    // Contacts whose hang-up the platform has not confirmed yet
    hanging_up: RefCell<HashSet<UserId>>,
    on_change: Notifier<SessionRegistry>,
}

impl SessionRegistry {
    pub fn new(client: Rc<dyn Client>, deadlines: Rc<Deadlines>) -> Rc<Self> {
        Rc::new(SessionRegistry {
            client,
            deadlines,
            active_calls: RefCell::new(HashMap::new()),
            hanging_up: RefCell::new(HashSet::new()),
            on_change: Notifier::new(),
        })
    }

    pub fn start_call(&self, contact_id: UserId, call: Call) {
        info!("Voice call with {} active on channel {}", contact_id, call.channel_id);
        self.active_calls.borrow_mut().insert(contact_id, call);
        self.on_change.fire();
    }

    pub fn end_call(&self, contact_id: UserId) {
        let removed = self.active_calls.borrow_mut().remove(&contact_id);
        match removed {
            Some(_) => {
                info!("Voice call with {} ended", contact_id);
                self.on_change.fire();
            }
            None => debug!("No active call with {}", contact_id),
        }
    }

    pub fn get_call(&self, contact_id: UserId) -> Option<Call> {
        self.active_calls.borrow().get(&contact_id).cloned()
    }

    pub fn is_hanging_up(&self, contact_id: UserId) -> bool {
        self.hanging_up.borrow().contains(&contact_id)
    }

    pub fn active_count(&self) -> usize {
        self.active_calls.borrow().len()
    }

    pub fn subscribe_on_change(&self, handler: impl Fn() + 'static) {
        self.on_change.subscribe(handler);
    }

    /// Start a voice call with `contact_id`
    pub fn call(self: &Rc<Self>, contact_id: UserId) {
        if self.get_call(contact_id).is_some() {
            debug!("Already in a call with {}", contact_id);
            return;
        }
        let Some(me) = self.client.current_user() else {
            error!("Cannot start a call before the current user is known");
            return;
        };
        let Some(them) = self.client.user(contact_id) else {
            error!("No user {} to call", contact_id);
            return;
        };

        let lobby_secret = format!("{}{}:{}", VOICE_CALL_PREFIX, me.username, them.username);
        info!("Starting voice call {}", lobby_secret);

        let registry = Rc::downgrade(self);
        let secret = lobby_secret.clone();
        self.client.create_or_join_lobby(
            &lobby_secret,
            self.deadlines.guard(Box::new(move |result| match result {
                Ok(lobby_id) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.publish_call_presence(contact_id, lobby_id, &secret);
                    }
                }
                Err(e) => error!("Failed to create or join lobby: {}", e),
            })),
        );
    }

    fn publish_call_presence(self: &Rc<Self>, contact_id: UserId, lobby_id: LobbyId, secret: &str) {
        let registry = Rc::downgrade(self);
        self.client.update_rich_presence(
            presence::voice_call_activity(secret),
            self.deadlines.guard(Box::new(move |result| match result {
                Ok(()) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.send_call_invite(contact_id, lobby_id);
                    }
                }
                Err(e) => error!("Failed to update rich presence: {}", e),
            })),
        );
    }

    fn send_call_invite(self: &Rc<Self>, contact_id: UserId, lobby_id: LobbyId) {
        let registry = Rc::downgrade(self);
        self.client.send_activity_invite(
            contact_id,
            "Voice Call",
            self.deadlines.guard(Box::new(move |result| match result {
                Ok(()) => {
                    info!("☎️ Voice call invite sent to {}", contact_id);
                    if let Some(registry) = registry.upgrade() {
                        registry.confirm_call(contact_id, lobby_id);
                    }
                }
                Err(e) => {
                    error!("Failed to send voice call invite: {}", e);
                    if let Some(registry) = registry.upgrade() {
                        presence::set_default_presence(registry.client.as_ref());
                    }
                }
            })),
        );
    }

    fn confirm_call(&self, contact_id: UserId, lobby_id: LobbyId) {
        match self.client.start_call(lobby_id) {
            Some(call) => self.start_call(contact_id, call),
            None => {
                error!("Platform refused to start a call in lobby {}", lobby_id);
                presence::set_default_presence(self.client.as_ref());
            }
        }
    }

    /// Hang up the call with `contact_id`, if there is one
    pub fn disconnect(self: &Rc<Self>, contact_id: UserId) {
        let Some(call) = self.get_call(contact_id) else {
            debug!("No call with {} to disconnect", contact_id);
            return;
        };
        self.hang_up(contact_id, call.channel_id);
    }

    /// End the call on the platform. The entry goes away, and the default presence comes back,
    /// once the platform confirms. At most one request per contact is outstanding.
    fn hang_up(self: &Rc<Self>, contact_id: UserId, channel: ChannelId) {
        if !self.hanging_up.borrow_mut().insert(contact_id) {
            debug!("Hang-up with {} already waiting for the platform", contact_id);
            return;
        }

        let registry = Rc::downgrade(self);
        self.client.end_call(
            channel,
            Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.hanging_up.borrow_mut().remove(&contact_id);
                    registry.end_call(contact_id);
                    presence::set_default_presence(registry.client.as_ref());
                    info!("Call ended successfully!");
                }
            }),
        );
    }

    /// Listen for voice invites and participants leaving
    pub fn run(self: &Rc<Self>) {
        info!("Starting voice service...");

        let registry = Rc::downgrade(self);
        self.client
            .set_activity_invite_created_callback(Box::new(move |invite| {
                if let Some(registry) = registry.upgrade() {
                    registry.invite_received(invite);
                }
            }));

        let registry = Rc::downgrade(self);
        self.client.set_call_participants_changed_callback(Box::new(
            move |channel, participant, joined| {
                if let Some(registry) = registry.upgrade() {
                    registry.participants_changed(channel, participant, joined);
                }
            },
        ));
    }

    fn invite_received(self: &Rc<Self>, invite: ActivityInvite) {
        info!("Received activity invite: {}", invite.party_id);
        if !invite.party_id.starts_with(VOICE_CALL_PREFIX) {
            debug!("Invite {} is not a voice call, ignoring", invite.party_id);
            return;
        }
        if self.get_call(invite.sender_id).is_some() {
            debug!("Already in a call with {}, ignoring repeated invite", invite.sender_id);
            return;
        }

        info!("Invite is a voice invite, accepting it...");
        let registry = Rc::downgrade(self);
        let sender = invite.sender_id;
        self.client.accept_activity_invite(
            &invite,
            self.deadlines.guard(Box::new(move |result| match result {
                Ok(lobby_secret) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.join_invited_lobby(sender, &lobby_secret);
                    }
                }
                Err(e) => error!("Could not accept activity invite: {}", e),
            })),
        );
    }

    fn join_invited_lobby(self: &Rc<Self>, sender: UserId, lobby_secret: &str) {
        info!("Joining lobby with secret: {}", lobby_secret);
        let registry: Weak<Self> = Rc::downgrade(self);
        self.client.create_or_join_lobby(
            lobby_secret,
            self.deadlines.guard(Box::new(move |result| match result {
                Ok(lobby_id) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.confirm_call(sender, lobby_id);
                    }
                }
                Err(e) => error!("Failed to join lobby: {}", e),
            })),
        );
    }

    fn participants_changed(self: &Rc<Self>, channel: ChannelId, participant: UserId, joined: bool) {
        if joined {
            debug!("{} joined call on channel {}", participant, channel);
            return;
        }
        let matches = self
            .get_call(participant)
            .map_or(false, |call| call.channel_id == channel);
        if !matches {
            return;
        }
        warn!("{} left the call, hanging up", participant);
        self.hang_up(participant, channel);
    }
}

impl VoiceStateLookup for SessionRegistry {
    fn in_call(&self, contact_id: UserId) -> bool {
        self.active_calls.borrow().contains_key(&contact_id)
    }
}
