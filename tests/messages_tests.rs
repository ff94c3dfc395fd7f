mod common;

use social_tui::messages::HistoryState;
use social_tui::models::DeliveryStatus;
use social_tui::platform::loopback::Operation;
use social_tui::platform::{Status, UserHandle};
use social_tui::{Client, LoopbackClient};

use common::{drain, fixture_with, friends, ready_fixture, AMY, BOB};

#[test]
fn test_unread_set_for_unselected_and_cleared_on_select() {
    let fixture = ready_fixture();
    fixture.select(BOB);

    fixture.client.receive_message(AMY, "you there?");
    fixture.drain();

    let messages = fixture.app.messages();
    assert!(messages.has_unread(AMY));
    assert!(!messages.has_unread(BOB));

    fixture.select(AMY);
    assert!(!messages.has_unread(AMY));
}

#[test]
fn test_message_from_selected_contact_is_not_unread() {
    let fixture = ready_fixture();
    fixture.select(AMY);

    fixture.client.receive_message(AMY, "hello");
    fixture.drain();

    assert!(!fixture.app.messages().has_unread(AMY));
    let history = fixture.app.messages().snapshot(AMY);
    assert_eq!(history.messages.last().map(|m| m.content.as_str()), Some("hello"));
}

#[test]
fn test_selection_backfills_history_once() {
    let client = friends()
        .into_iter()
        .fold(LoopbackClient::new(), |client, user| client.with_friend(user));
    let fixture = fixture_with(client);
    // History that exists before the app starts
    fixture.client.receive_message(BOB, "old news");
    fixture.client.run_callbacks();

    fixture.app.start();
    drain(&fixture.client);
    fixture.select(BOB);

    let messages = fixture.app.messages();
    assert_eq!(messages.snapshot(BOB).state, HistoryState::Fetching);
    fixture.drain();

    let history = messages.snapshot(BOB);
    assert_eq!(history.state, HistoryState::Loaded);
    assert_eq!(history.messages.len(), 1);
    assert_eq!(history.messages[0].content, "old news");
    assert_eq!(history.messages[0].delivery_status, DeliveryStatus::Received);

    // Further reads do not fetch again
    messages.history(BOB);
    assert!(fixture.client.is_idle());
}

#[test]
fn test_failed_backfill_is_terminal() {
    let fixture = ready_fixture();
    fixture.client.fail_next(Operation::FetchHistory, "history unavailable");

    fixture.select(AMY);
    fixture.drain();

    let messages = fixture.app.messages();
    assert_eq!(
        messages.snapshot(AMY).state,
        HistoryState::Failed("request failed: history unavailable".to_string())
    );
    messages.history(AMY);
    assert!(fixture.client.is_idle());
}

#[test]
fn test_send_and_echo_are_recorded_once() {
    let client = friends()
        .into_iter()
        .fold(LoopbackClient::new().with_echo_replies(), |client, user| {
            client.with_friend(user)
        });
    let fixture = fixture_with(client);
    fixture.app.start();
    fixture.drain();
    fixture.select(AMY);
    fixture.drain();

    fixture.app.messages().send(AMY, "ping");
    fixture.drain();

    let history = fixture.app.messages().snapshot(AMY);
    let contents: Vec<&str> = history.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["ping", "echo: ping"]);
    assert_eq!(history.messages[0].delivery_status, DeliveryStatus::Sent);
    assert_eq!(history.messages[1].delivery_status, DeliveryStatus::Received);
    // The echo comes from the selected contact
    assert!(!fixture.app.messages().has_unread(AMY));
}

#[test]
fn test_history_overlapping_live_messages_is_merged() {
    let fixture = ready_fixture();
    fixture.client.receive_message(AMY, "live one");
    fixture.drain();
    assert_eq!(fixture.app.messages().snapshot(AMY).state, HistoryState::NotFetched);

    // The backfill returns the same message again
    fixture.select(AMY);
    fixture.drain();

    let history = fixture.app.messages().snapshot(AMY);
    assert_eq!(history.state, HistoryState::Loaded);
    assert_eq!(history.messages.len(), 1);
}

#[test]
fn test_message_from_new_friend_is_unread() {
    let fixture = ready_fixture();
    fixture
        .client
        .add_friend(UserHandle::new(8, "zoe", Status::Online));
    fixture.client.receive_message(8, "hi from zoe");
    fixture.drain();

    assert!(fixture.app.messages().has_unread(8));
    assert!(fixture.app.roster().get_by_id(8).is_some());
}
