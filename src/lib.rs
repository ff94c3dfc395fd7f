// Re-export needed modules for testing
pub mod app;
pub mod auth;
pub mod buttons;
pub mod config;
pub mod event_loop;
pub mod messages;
pub mod models;
pub mod notify;
pub mod platform; // Social SDK boundary and the loopback client
pub mod presence;
pub mod profile;
pub mod roster;
pub mod ui;
pub mod voice;

// Re-export main types for convenience
pub use app::{App, AppState};
pub use models::*;
pub use platform::{Client, LoopbackClient};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MessageHandle, RelationshipGroup, Status, UserHandle, UserId};
    use std::cmp::Ordering;

    struct Lookups {
        in_call: Option<UserId>,
        unread: Option<UserId>,
    }

    impl VoiceStateLookup for Lookups {
        fn in_call(&self, contact_id: UserId) -> bool {
            self.in_call == Some(contact_id)
        }
    }

    impl UnreadLookup for Lookups {
        fn has_unread(&self, contact_id: UserId) -> bool {
            self.unread == Some(contact_id)
        }
    }

    #[test]
    fn test_contact_ordering() {
        let online = Contact::from_user(UserHandle::new(3, "zed", Status::Online));
        let idle = Contact::from_user(UserHandle::new(1, "amy", Status::Idle));
        let offline = Contact::from_user(UserHandle::new(2, "bob", Status::Offline));
        let twin = Contact::from_user(UserHandle::new(4, "zed", Status::Online));

        assert_eq!(online.roster_cmp(&idle), Ordering::Less);
        assert_eq!(idle.roster_cmp(&offline), Ordering::Less);
        // Same status and name: id breaks the tie
        assert_eq!(online.roster_cmp(&twin), Ordering::Less);
        assert_eq!(online.roster_cmp(&online), Ordering::Equal);

        // Equality is by id only
        let renamed = Contact::from_user(UserHandle::new(3, "zeddy", Status::Offline));
        assert_eq!(online, renamed);
        assert_eq!(renamed.group(), RelationshipGroup::Offline);
    }

    #[test]
    fn test_formatted_label_glyphs() {
        let amy = Contact::from_user(UserHandle::new(2, "amy", Status::Online).with_display_name("Amy"));
        let quiet = Lookups {
            in_call: None,
            unread: None,
        };
        let busy = Lookups {
            in_call: Some(2),
            unread: Some(2),
        };

        assert_eq!(amy.formatted_label(&quiet, &quiet), "🟢 Amy");
        assert_eq!(amy.formatted_label(&busy, &busy), "🟢🔉📨 Amy");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let plain = Contact::from_user(UserHandle::new(5, "mo", Status::Offline));
        assert_eq!(plain.display_name(), "mo");
    }

    #[test]
    fn test_message_from_handle() {
        let handle = MessageHandle {
            id: 77,
            author_id: 2,
            recipient_id: 1,
            content: "Hello, world!".to_string(),
            sent_timestamp: 1_650_000_000_000,
        };
        let msg = Message::from_handle(&handle, DeliveryStatus::Received);

        assert_eq!(msg.id, Some(77));
        assert_eq!(msg.nonce, None);
        assert_eq!(msg.author_id, 2);
        assert_eq!(msg.timestamp.timestamp(), 1_650_000_000);
        assert_eq!(msg.delivery_status, DeliveryStatus::Received);

        let outgoing = Message::outgoing(1, "hi");
        assert_eq!(outgoing.id, None);
        assert!(outgoing.nonce.is_some());
        assert_eq!(outgoing.delivery_status, DeliveryStatus::Sending);
    }
}
