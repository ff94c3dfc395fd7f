// Message Store
// Per-contact conversation history and unread flags. History is backfilled once per contact
// from the platform and merged with live traffic by message id, so re-delivered events and
// overlapping backfills never duplicate a message.

use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use uuid::Uuid;

use crate::models::{DeliveryStatus, Message, SelectionLookup, UnreadLookup};
use crate::notify::Notifier;
use crate::platform::{Client, Deadlines, MessageHandle, MessageId, UserId};

/// Where a contact's history backfill stands
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryState {
    NotFetched,
    Fetching,
    Loaded,
    /// Terminal for this contact until restart
    Failed(String),
}

/// A conversation as seen by the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub state: HistoryState,
    pub messages: Vec<Message>,
}

impl History {
    fn not_fetched() -> Self {
        History {
            state: HistoryState::NotFetched,
            messages: Vec::new(),
        }
    }

    /// An empty history only means "no messages" once the backfill has landed
    pub fn is_confirmed_empty(&self) -> bool {
        self.state == HistoryState::Loaded && self.messages.is_empty()
    }
}

struct Conversation {
    messages: Vec<Message>,
    state: HistoryState,
}

impl Conversation {
    fn new() -> Self {
        Conversation {
            messages: Vec::new(),
            state: HistoryState::NotFetched,
        }
    }

    fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == Some(id))
    }

    // Keep chronological order; equal timestamps keep arrival order
    fn insert(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(at, message);
    }
}

pub struct MessageStore {
    client: Rc<dyn Client>,
    deadlines: Rc<Deadlines>,
    selection: Rc<dyn SelectionLookup>,
    page_size: usize,
    conversations: RefCell<HashMap<UserId, Conversation>>,
    unread: RefCell<HashSet<UserId>>,
    on_change: Notifier<MessageStore>,
}

impl MessageStore {
    pub fn new(
        client: Rc<dyn Client>,
        deadlines: Rc<Deadlines>,
        selection: Rc<dyn SelectionLookup>,
        page_size: usize,
    ) -> Rc<Self> {
        Rc::new(MessageStore {
            client,
            deadlines,
            selection,
            page_size,
            conversations: RefCell::new(HashMap::new()),
            unread: RefCell::new(HashSet::new()),
            on_change: Notifier::new(),
        })
    }

    pub fn subscribe_on_change(&self, handler: impl Fn() + 'static) {
        self.on_change.subscribe(handler);
    }

    /// Append a message from `contact_id`. Returns false if it was already known.
    pub fn record_incoming(&self, contact_id: UserId, message: Message) -> bool {
        if !self.insert_unique(contact_id, message) {
            return false;
        }
        if self.selection.selected_id() != Some(contact_id) {
            self.unread.borrow_mut().insert(contact_id);
        }
        self.on_change.fire();
        true
    }

    /// Append a message sent to `contact_id`. Unread state is untouched.
    pub fn record_outgoing(&self, contact_id: UserId, message: Message) -> bool {
        if !self.insert_unique(contact_id, message) {
            return false;
        }
        self.on_change.fire();
        true
    }

    fn insert_unique(&self, contact_id: UserId, message: Message) -> bool {
        let mut conversations = self.conversations.borrow_mut();
        let conversation = conversations
            .entry(contact_id)
            .or_insert_with(Conversation::new);
        if let Some(id) = message.id {
            if conversation.contains(id) {
                debug!("Message {} already recorded for {}", id, contact_id);
                return false;
            }
        }
        conversation.insert(message);
        true
    }

    pub fn mark_read(&self, contact_id: UserId) {
        let cleared = self.unread.borrow_mut().remove(&contact_id);
        if cleared {
            debug!("Marked conversation with {} as read", contact_id);
            self.on_change.fire();
        }
    }

    pub fn has_unread(&self, contact_id: UserId) -> bool {
        self.unread.borrow().contains(&contact_id)
    }

    /// Current view of a conversation, with no side effects
    pub fn snapshot(&self, contact_id: UserId) -> History {
        self.conversations
            .borrow()
            .get(&contact_id)
            .map(|c| History {
                state: c.state.clone(),
                messages: c.messages.clone(),
            })
            .unwrap_or_else(History::not_fetched)
    }

    /// Current view of a conversation. The first call per contact starts the backfill.
    pub fn history(self: &Rc<Self>, contact_id: UserId) -> History {
        let start = {
            let mut conversations = self.conversations.borrow_mut();
            let conversation = conversations
                .entry(contact_id)
                .or_insert_with(Conversation::new);
            if conversation.state == HistoryState::NotFetched {
                conversation.state = HistoryState::Fetching;
                true
            } else {
                false
            }
        };
        if start {
            self.fetch_history(contact_id);
        }
        self.snapshot(contact_id)
    }

    fn fetch_history(self: &Rc<Self>, contact_id: UserId) {
        debug!("Fetching up to {} messages with {}", self.page_size, contact_id);
        let store = Rc::downgrade(self);
        self.client.fetch_message_history(
            contact_id,
            self.page_size,
            self.deadlines.guard(Box::new(move |result| {
                if let Some(store) = store.upgrade() {
                    store.history_fetched(contact_id, result.map_err(|e| e.to_string()));
                }
            })),
        );
    }

    fn history_fetched(&self, contact_id: UserId, result: Result<Vec<MessageHandle>, String>) {
        let me = self.client.current_user().map(|u| u.id);
        {
            let mut conversations = self.conversations.borrow_mut();
            let conversation = conversations
                .entry(contact_id)
                .or_insert_with(Conversation::new);
            match result {
                Ok(handles) => {
                    info!("Loaded {} messages with {}", handles.len(), contact_id);
                    for handle in handles {
                        if conversation.contains(handle.id) {
                            continue;
                        }
                        let status = if Some(handle.author_id) == me {
                            DeliveryStatus::Sent
                        } else {
                            DeliveryStatus::Received
                        };
                        conversation.insert(Message::from_handle(&handle, status));
                    }
                    conversation.state = HistoryState::Loaded;
                }
                Err(reason) => {
                    error!("Failed to fetch message history with {}: {}", contact_id, reason);
                    conversation.state = HistoryState::Failed(reason);
                }
            }
        }
        self.on_change.fire();
    }

    /// Send `text` to `contact_id`. The message shows as sending until the platform answers.
    pub fn send(self: &Rc<Self>, contact_id: UserId, text: &str) -> Option<Uuid> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(me) = self.client.current_user() else {
            error!("Cannot send a message before the current user is known");
            return None;
        };

        let message = Message::outgoing(me.id, text);
        let nonce = message.nonce?;
        self.record_outgoing(contact_id, message);

        let store = Rc::downgrade(self);
        self.client.send_message(
            contact_id,
            text,
            self.deadlines.guard(Box::new(move |result| {
                if let Some(store) = store.upgrade() {
                    match result {
                        Ok(id) => store.confirm_sent(contact_id, nonce, id),
                        Err(e) => {
                            error!("Failed to send message to {}: {}", contact_id, e);
                            store.mark_failed(contact_id, nonce);
                        }
                    }
                }
            })),
        );
        Some(nonce)
    }

    fn confirm_sent(&self, contact_id: UserId, nonce: Uuid, id: MessageId) {
        {
            let mut conversations = self.conversations.borrow_mut();
            let Some(conversation) = conversations.get_mut(&contact_id) else {
                return;
            };
            if conversation.contains(id) {
                // The platform's echo of this message arrived first
                conversation.messages.retain(|m| m.nonce != Some(nonce));
            } else if let Some(message) = conversation
                .messages
                .iter_mut()
                .find(|m| m.nonce == Some(nonce))
            {
                message.id = Some(id);
                message.delivery_status = DeliveryStatus::Sent;
            }
        }
        self.on_change.fire();
    }

    fn mark_failed(&self, contact_id: UserId, nonce: Uuid) {
        {
            let mut conversations = self.conversations.borrow_mut();
            let message = conversations
                .get_mut(&contact_id)
                .and_then(|c| c.messages.iter_mut().find(|m| m.nonce == Some(nonce)));
            if let Some(message) = message {
                message.delivery_status = DeliveryStatus::Failed;
            }
        }
        self.on_change.fire();
    }

    /// Listen for messages created on the platform
    pub fn run(self: &Rc<Self>) {
        info!("Starting message listener...");
        let store = Rc::downgrade(self);
        self.client
            .set_message_created_callback(Box::new(move |message_id| {
                if let Some(store) = store.upgrade() {
                    store.message_created(message_id);
                }
            }));
    }

    fn message_created(&self, message_id: MessageId) {
        let Some(handle) = self.client.message(message_id) else {
            warn!("Message {} was announced but cannot be read", message_id);
            return;
        };
        let me = self.client.current_user().map(|u| u.id);
        if Some(handle.author_id) == me {
            self.record_outgoing(
                handle.recipient_id,
                Message::from_handle(&handle, DeliveryStatus::Sent),
            );
        } else {
            self.record_incoming(
                handle.author_id,
                Message::from_handle(&handle, DeliveryStatus::Received),
            );
        }
    }
}

impl UnreadLookup for MessageStore {
    fn has_unread(&self, contact_id: UserId) -> bool {
        MessageStore::has_unread(self, contact_id)
    }
}
