mod common;

use std::time::{Duration, Instant};

use social_tui::models::VoiceStateLookup;
use social_tui::platform::loopback::Operation;
use social_tui::platform::ActivityInvite;
use social_tui::presence::default_activity;

use common::{ready_fixture, AMY, BOB};

#[test]
fn test_outbound_call_records_confirmed_call() {
    let fixture = ready_fixture();
    let voice = fixture.app.voice();

    voice.call(AMY);
    // Nothing is recorded before the platform answers
    assert!(voice.get_call(AMY).is_none());
    fixture.drain();

    let call = voice.get_call(AMY).expect("call");
    assert!(voice.in_call(AMY));
    assert_eq!(fixture.client.open_calls(), 1);
    assert_eq!(fixture.client.invites_sent(), vec![(AMY, "Voice Call".to_string())]);

    let presence = fixture.client.presence_updates();
    let activity = presence.last().expect("presence");
    assert_eq!(activity.join_secret.as_deref(), Some("call::me:amy"));
    assert_eq!(activity.party.as_ref().map(|p| p.id.as_str()), Some("call::me:amy"));
    assert_eq!(call.lobby_id, call.channel_id);
}

#[test]
fn test_failed_invite_leaves_no_call() {
    let fixture = ready_fixture();
    fixture.client.fail_next(Operation::SendInvite, "user is offline");

    fixture.app.voice().call(AMY);
    fixture.drain();

    assert!(fixture.app.voice().get_call(AMY).is_none());
    assert_eq!(fixture.client.open_calls(), 0);
    // The joinable call party is withdrawn
    assert_eq!(
        fixture.client.presence_updates().last(),
        Some(&default_activity())
    );
}

#[test]
fn test_refused_call_restores_default_presence() {
    let fixture = ready_fixture();
    fixture.client.fail_next(Operation::StartCall, "no voice server");

    fixture.app.voice().call(AMY);
    fixture.drain();

    assert!(fixture.app.voice().get_call(AMY).is_none());
    assert_eq!(fixture.client.invites_sent().len(), 1);
    assert_eq!(
        fixture.client.presence_updates().last(),
        Some(&default_activity())
    );
}

#[test]
fn test_failed_lobby_join_stops_before_presence() {
    let fixture = ready_fixture();
    let presence_before = fixture.client.presence_updates().len();
    fixture.client.fail_next(Operation::JoinLobby, "lobby service down");

    fixture.app.voice().call(AMY);
    fixture.drain();

    assert!(fixture.app.voice().get_call(AMY).is_none());
    assert_eq!(fixture.client.presence_updates().len(), presence_before);
    assert!(fixture.client.invites_sent().is_empty());
}

#[test]
fn test_unanswered_step_times_out() {
    let fixture = ready_fixture();
    fixture.client.stall_next(Operation::UpdatePresence);

    fixture.app.voice().call(AMY);
    fixture.drain();
    assert_eq!(fixture.app.deadlines().in_flight(), 1);

    let expired = fixture
        .app
        .deadlines()
        .expire(Instant::now() + Duration::from_secs(3600));
    assert_eq!(expired, 1);
    fixture.drain();

    assert!(fixture.app.voice().get_call(AMY).is_none());
    assert!(fixture.client.invites_sent().is_empty());
}

#[test]
fn test_repeat_call_is_a_no_op() {
    let fixture = ready_fixture();
    let voice = fixture.app.voice();

    voice.call(AMY);
    fixture.drain();
    voice.call(AMY);
    fixture.drain();

    assert_eq!(fixture.client.invites_sent().len(), 1);
    assert_eq!(voice.active_count(), 1);
}

#[test]
fn test_hang_up_restores_default_presence() {
    let fixture = ready_fixture();
    let voice = fixture.app.voice();
    voice.call(AMY);
    fixture.drain();

    voice.disconnect(AMY);
    fixture.drain();

    assert!(voice.get_call(AMY).is_none());
    assert_eq!(fixture.client.open_calls(), 0);
    assert_eq!(
        fixture.client.presence_updates().last(),
        Some(&default_activity())
    );
}

#[test]
fn test_voice_invite_is_auto_accepted() {
    let fixture = ready_fixture();

    let secret = fixture.client.send_voice_invite(BOB);
    fixture.drain();

    assert_eq!(secret, "call::bob:me");
    assert!(fixture.app.voice().in_call(BOB));
}

#[test]
fn test_other_invites_are_ignored() {
    let fixture = ready_fixture();

    fixture.client.send_invite(ActivityInvite {
        sender_id: BOB,
        party_id: "raid::friday".to_string(),
        message_id: 1,
    });
    fixture.drain();

    assert!(!fixture.app.voice().in_call(BOB));
    assert_eq!(fixture.client.open_calls(), 0);
}

#[test]
fn test_participant_leaving_ends_call() {
    let fixture = ready_fixture();
    let voice = fixture.app.voice();
    voice.call(AMY);
    fixture.drain();
    let call = voice.get_call(AMY).expect("call");

    fixture.client.leave_call(call.channel_id, AMY);
    fixture.drain();

    assert!(voice.get_call(AMY).is_none());
    assert_eq!(fixture.client.open_calls(), 0);
    assert_eq!(
        fixture.client.presence_updates().last(),
        Some(&default_activity())
    );
}

#[test]
fn test_repeated_leave_events_end_call_once() {
    let fixture = ready_fixture();
    let voice = fixture.app.voice();
    voice.call(AMY);
    fixture.drain();
    let channel = voice.get_call(AMY).expect("call").channel_id;

    fixture.client.leave_call(channel, AMY);
    fixture.client.leave_call(channel, AMY);
    fixture.drain();

    assert_eq!(fixture.client.end_call_requests(), vec![channel]);
    assert!(!voice.is_hanging_up(AMY));
}

#[test]
fn test_unconfirmed_hang_up_is_not_repeated() {
    let fixture = ready_fixture();
    let voice = fixture.app.voice();
    voice.call(AMY);
    fixture.drain();
    let channel = voice.get_call(AMY).expect("call").channel_id;
    fixture.client.stall_next(Operation::EndCall);

    voice.disconnect(AMY);
    fixture.drain();
    voice.disconnect(AMY);
    fixture.drain();

    assert_eq!(fixture.client.end_call_requests(), vec![channel]);
    assert!(voice.is_hanging_up(AMY));
    // Still shown as in a call until the platform confirms
    assert!(voice.in_call(AMY));
}
