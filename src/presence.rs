// Rich presence for the current user
// Default presence while the client is open, and the joinable party used to set up voice calls.

use log::{error, info};

use crate::platform::{Activity, ActivityParty, Client, PartyPrivacy};

/// Prefix of every lobby secret and party id that belongs to a voice call
pub const VOICE_CALL_PREFIX: &str = "call::";

pub fn default_activity() -> Activity {
    Activity {
        state: Some("Chatting from the terminal".to_string()),
        details: Some("Better TUI than me...".to_string()),
        ..Activity::playing()
    }
}

/// Private two-person party that the invited contact can join
pub fn voice_call_activity(lobby_secret: &str) -> Activity {
    Activity {
        details: Some("Making a phone call...".to_string()),
        join_secret: Some(lobby_secret.to_string()),
        party: Some(ActivityParty {
            id: lobby_secret.to_string(),
            current_size: 1,
            max_size: 2,
            privacy: PartyPrivacy::Private,
        }),
        desktop_only: true,
        ..Activity::playing()
    }
}

pub fn set_default_presence(client: &dyn Client) {
    info!("Updating rich presence...");
    client.update_rich_presence(
        default_activity(),
        Box::new(|result| match result {
            Ok(()) => info!("Rich presence updated successfully"),
            Err(e) => error!("Rich presence update failed: {}", e),
        }),
    );
}
