mod common;

use social_tui::models::Contact;
use social_tui::platform::{RelationshipGroup, Status, UserHandle};
use social_tui::roster::{Roster, Slot};

use common::{ready_fixture, AMY, BOB, CAT};

fn layout(roster: &Roster) -> Vec<String> {
    roster
        .slots()
        .iter()
        .map(|slot| match slot {
            Slot::Header(group) => format!("# {}", group.label()),
            Slot::Entry(contact) => contact.username().to_string(),
        })
        .collect()
}

#[test]
fn test_ready_builds_grouped_roster() {
    let fixture = ready_fixture();
    let roster = fixture.app.roster();

    assert_eq!(
        layout(roster),
        vec!["# In Game", "amy", "# Online Elsewhere", "bob", "# Offline", "cat"]
    );
    assert_eq!(roster.contact_count(), 3);
    assert_eq!(roster.get_by_id(CAT).map(|c| c.group()), Some(RelationshipGroup::Offline));
}

#[test]
fn test_new_friend_is_inserted_in_sorted_position() {
    let fixture = ready_fixture();
    fixture.select(BOB);

    fixture
        .client
        .add_friend(UserHandle::new(5, "dan", Status::Online).with_display_name("Dan"));
    fixture.drain();

    let roster = fixture.app.roster();
    assert_eq!(
        layout(roster),
        vec!["# In Game", "amy", "# Online Elsewhere", "dan", "bob", "# Offline", "cat"]
    );
    // Selection follows bob to his new index
    assert_eq!(roster.selected_contact().map(|c| c.id()), Some(BOB));
    assert_eq!(roster.selected_index(), Some(4));
}

#[test]
fn test_status_update_moves_contact_between_groups() {
    let fixture = ready_fixture();
    fixture.select(BOB);

    fixture.client.set_user_status(BOB, Status::Offline);
    fixture.drain();

    let roster = fixture.app.roster();
    assert_eq!(
        layout(roster),
        vec!["# In Game", "amy", "# Online Elsewhere", "# Offline", "bob", "cat"]
    );
    assert_eq!(roster.selected_contact().map(|c| c.id()), Some(BOB));
}

#[test]
fn test_groups_updated_rebuilds_and_keeps_selection() {
    let fixture = ready_fixture();
    fixture.select(AMY);

    fixture.client.set_in_game(AMY, false);
    fixture.drain();

    let roster = fixture.app.roster();
    assert_eq!(
        layout(roster),
        vec!["# In Game", "# Online Elsewhere", "amy", "bob", "# Offline", "cat"]
    );
    assert_eq!(roster.selected_contact().map(|c| c.id()), Some(AMY));
}

#[test]
fn test_removed_friend_disappears_and_selection_clamps() {
    let fixture = ready_fixture();
    fixture.select(CAT);

    fixture.client.remove_friend(CAT);
    fixture.drain();

    let roster = fixture.app.roster();
    assert!(roster.get_by_id(CAT).is_none());
    let selected = roster.selected_index().expect("selection");
    assert!(selected < roster.len());

    // Removing again is a no-op
    assert!(!roster.remove(CAT));
}

#[test]
fn test_duplicate_relationship_events_do_not_duplicate() {
    let fixture = ready_fixture();
    let dan = UserHandle::new(5, "dan", Status::Idle);

    fixture.client.add_friend(dan.clone());
    fixture.client.add_friend(dan);
    fixture.drain();

    let roster = fixture.app.roster();
    let dans = roster.contacts().iter().filter(|c| c.id() == 5).count();
    assert_eq!(dans, 1);
    assert_eq!(roster.contact_count(), 4);
}

#[test]
fn test_add_then_remove_round_trips() {
    let fixture = ready_fixture();
    let roster = fixture.app.roster();
    let before = layout(roster);

    roster.add(Contact::from_user(UserHandle::new(9, "eve", Status::Idle)));
    assert!(roster.remove(9));

    assert_eq!(layout(roster), before);
}
