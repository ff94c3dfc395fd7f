// Roster invariants checked over generated add/remove/rebuild/select sequences

use std::cmp::Ordering;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use social_tui::models::{Contact, SelectionLookup};
use social_tui::platform::{RelationshipGroup, Status, UserHandle, UserId};
use social_tui::roster::{Roster, Slot};

const NAMES: [&str; 6] = ["amy", "bob", "cat", "dan", "Amy", "zed"];

#[derive(Debug, Clone)]
enum Op {
    Add(Contact),
    Remove(UserId),
    Rebuild(Vec<Contact>),
    Select(usize),
}

fn arb_status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Online),
        Just(Status::Idle),
        Just(Status::DoNotDisturb),
        Just(Status::Invisible),
        Just(Status::Offline),
        Just(Status::Blocked),
        Just(Status::Unknown),
    ]
}

fn arb_group() -> impl Strategy<Value = RelationshipGroup> {
    prop_oneof![
        Just(RelationshipGroup::InGame),
        Just(RelationshipGroup::OnlineElsewhere),
        Just(RelationshipGroup::Offline),
    ]
}

fn arb_contact() -> impl Strategy<Value = Contact> {
    (1u64..16, 0..NAMES.len(), arb_status(), arb_group()).prop_map(|(id, name, status, group)| {
        Contact::new(UserHandle::new(id, NAMES[name], status), group)
    })
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_contact().prop_map(Op::Add),
        2 => (1u64..16).prop_map(Op::Remove),
        1 => prop::collection::vec(arb_contact(), 0..10).prop_map(Op::Rebuild),
        2 => (0usize..30).prop_map(Op::Select),
    ]
}

/// Split into groups the way the platform reports them, each already sorted
fn grouped(contacts: Vec<Contact>) -> Vec<(RelationshipGroup, Vec<Contact>)> {
    RelationshipGroup::ALL
        .iter()
        .map(|group| {
            let mut members: Vec<Contact> = contacts
                .iter()
                .filter(|c| c.group() == *group)
                .cloned()
                .collect();
            members.sort_by(|a, b| a.roster_cmp(b));
            (*group, members)
        })
        .collect()
}

fn apply(roster: &Roster, op: &Op) {
    match op {
        Op::Add(contact) => roster.add(contact.clone()),
        Op::Remove(id) => {
            roster.remove(*id);
        }
        Op::Rebuild(contacts) => roster.rebuild(grouped(contacts.clone())),
        Op::Select(index) => roster.set_selected_index(*index),
    }
}

#[derive(Debug, PartialEq)]
enum Shape {
    Header(RelationshipGroup),
    Entry(UserId, Status),
}

fn shape(roster: &Roster) -> Vec<Shape> {
    roster
        .slots()
        .iter()
        .map(|slot| match slot {
            Slot::Header(group) => Shape::Header(*group),
            Slot::Entry(contact) => Shape::Entry(contact.id(), contact.status()),
        })
        .collect()
}

fn check_sorted_segments(roster: &Roster) -> Result<(), TestCaseError> {
    let slots = roster.slots();
    for segment in slots.split(Slot::is_header) {
        for pair in segment.windows(2) {
            let (Some(a), Some(b)) = (pair[0].contact(), pair[1].contact()) else {
                continue;
            };
            prop_assert_eq!(a.roster_cmp(b), Ordering::Less, "{:?} before {:?}", a, b);
        }
    }
    Ok(())
}

fn check_selection(roster: &Roster, pinned: Option<UserId>) -> Result<(), TestCaseError> {
    match roster.selected_index() {
        None => prop_assert!(roster.is_empty()),
        Some(index) => prop_assert!(index < roster.len()),
    }
    if let Some(id) = pinned {
        if roster.position_of(id).is_some() {
            prop_assert_eq!(roster.selected_id(), Some(id));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_groups_stay_sorted(ops in prop::collection::vec(arb_op(), 1..40)) {
        let roster = Roster::new();
        for op in &ops {
            apply(&roster, op);
            check_sorted_segments(&roster)?;
        }
    }

    #[test]
    fn test_selection_is_pinned_or_clamped(ops in prop::collection::vec(arb_op(), 1..40)) {
        let roster = Roster::new();
        for op in &ops {
            let pinned = match op {
                Op::Select(_) => None,
                _ => roster.selected_id(),
            };
            apply(&roster, op);
            check_selection(&roster, pinned)?;
        }
    }

    #[test]
    fn test_add_then_remove_round_trips(
        ops in prop::collection::vec(arb_op(), 0..30),
        status in arb_status(),
        group in arb_group(),
        name in 0..NAMES.len(),
    ) {
        let roster = Roster::new();
        for op in &ops {
            apply(&roster, op);
        }
        let before = shape(&roster);
        let selected = roster.selected_index();

        // Ids from the generated sequences never reach 100
        roster.add(Contact::new(UserHandle::new(100, NAMES[name], status), group));
        prop_assert!(roster.remove(100));

        prop_assert_eq!(shape(&roster), before);
        prop_assert_eq!(roster.selected_index(), selected);
    }
}
