// Roster: the grouped, sorted contact list and its selection cursor
// Slots are either group headers or contacts. The cursor is a slot index, re-pinned to the same
// contact (or header) after every mutation and always kept inside the list.

use log::debug;
use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::ops::Range;

use crate::models::{Contact, SelectionLookup};
use crate::notify::Notifier;
use crate::platform::{RelationshipGroup, UserId};

pub mod refresh;

pub use refresh::PresenceRefreshDriver;

#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Header(RelationshipGroup),
    Entry(Contact),
}

impl Slot {
    pub fn is_header(&self) -> bool {
        matches!(self, Slot::Header(_))
    }

    pub fn contact(&self) -> Option<&Contact> {
        match self {
            Slot::Entry(contact) => Some(contact),
            Slot::Header(_) => None,
        }
    }
}

// What the cursor was pointing at before a mutation
#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    Contact(UserId),
    Header(RelationshipGroup),
}

pub struct Roster {
    slots: RefCell<Vec<Slot>>,
    selected: Cell<usize>,
    last_observed: Cell<(Option<usize>, Option<UserId>)>,
    on_selection_change: Notifier<Roster>,
    on_contents_change: Notifier<Roster>,
}

impl Roster {
    pub fn new() -> Self {
        Roster {
            slots: RefCell::new(Vec::new()),
            selected: Cell::new(0),
            last_observed: Cell::new((None, None)),
            on_selection_change: Notifier::new(),
            on_contents_change: Notifier::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Number of contact slots, headers excluded
    pub fn contact_count(&self) -> usize {
        self.slots.borrow().iter().filter(|s| !s.is_header()).count()
    }

    /// Borrow every slot for rendering
    pub fn slots(&self) -> Ref<'_, Vec<Slot>> {
        self.slots.borrow()
    }

    /// Contacts only, in roster order
    pub fn contacts(&self) -> Vec<Contact> {
        self.slots
            .borrow()
            .iter()
            .filter_map(|s| s.contact().cloned())
            .collect()
    }

    pub fn get_at(&self, index: usize) -> Option<Contact> {
        self.slots.borrow().get(index).and_then(|s| s.contact().cloned())
    }

    pub fn get_by_id(&self, id: UserId) -> Option<Contact> {
        self.slots
            .borrow()
            .iter()
            .filter_map(Slot::contact)
            .find(|c| c.id() == id)
            .cloned()
    }

    pub fn position_of(&self, id: UserId) -> Option<usize> {
        Self::find(&self.slots.borrow(), id)
    }

    fn find(slots: &[Slot], id: UserId) -> Option<usize> {
        slots
            .iter()
            .position(|s| matches!(s, Slot::Entry(c) if c.id() == id))
    }

    pub fn selected_index(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.selected.get())
        }
    }

    pub fn selected_contact(&self) -> Option<Contact> {
        self.selected_index().and_then(|i| self.get_at(i))
    }

    /// Move the cursor to `index`, clamped into the list
    pub fn set_selected_index(&self, index: usize) {
        self.selected.set(index);
        self.clamp_selection();
    }

    /// Move the cursor to the contact with `id`. When absent the cursor is only clamped.
    pub fn set_selected_by_id(&self, id: UserId) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.selected.set(index);
                true
            }
            None => {
                debug!("Contact {} not in roster, keeping clamped selection", id);
                self.clamp_selection();
                false
            }
        }
    }

    /// Move to the next contact below the cursor, skipping headers
    pub fn select_next(&self) -> bool {
        let slots = self.slots.borrow();
        let start = self.selected.get() + 1;
        match slots.iter().skip(start).position(|s| !s.is_header()) {
            Some(offset) => {
                self.selected.set(start + offset);
                true
            }
            None => false,
        }
    }

    /// Move to the next contact above the cursor, skipping headers
    pub fn select_previous(&self) -> bool {
        let slots = self.slots.borrow();
        let end = self.selected.get().min(slots.len());
        match slots[..end].iter().rposition(|s| !s.is_header()) {
            Some(index) => {
                self.selected.set(index);
                true
            }
            None => false,
        }
    }

    /// Insert at the sorted position inside the contact's group. An existing entry with the same
    /// id is replaced, so re-delivered events never duplicate a contact.
    pub fn add(&self, contact: Contact) {
        let anchor = self.anchor();
        {
            let mut slots = self.slots.borrow_mut();
            if let Some(existing) = Self::find(&slots, contact.id()) {
                debug!("Replacing roster entry for {}", contact.username());
                slots.remove(existing);
            }

            let segment = Self::segment_for(&slots, contact.group());
            let offset = slots[segment.clone()].partition_point(|slot| match slot {
                Slot::Entry(c) => c.roster_cmp(&contact) == Ordering::Less,
                Slot::Header(_) => true,
            });
            debug!(
                "Adding {} at position {}",
                contact.username(),
                segment.start + offset
            );
            slots.insert(segment.start + offset, Slot::Entry(contact));
        }
        self.repin(anchor);
        self.on_contents_change.fire();
    }

    /// Remove the contact with `id`. Returns false, and changes nothing, when it is absent.
    pub fn remove(&self, id: UserId) -> bool {
        let anchor = self.anchor();
        let removed = {
            let mut slots = self.slots.borrow_mut();
            match Self::find(&slots, id) {
                Some(index) => {
                    slots.remove(index);
                    true
                }
                None => false,
            }
        };

        if !removed {
            debug!("Contact {} not found, nothing to remove", id);
            return false;
        }
        self.repin(anchor);
        self.on_contents_change.fire();
        true
    }

    /// Replace everything with one header per group followed by its members, in the order given.
    /// Ids already placed by an earlier group are skipped.
    pub fn rebuild(&self, groups: Vec<(RelationshipGroup, Vec<Contact>)>) {
        let anchor = self.anchor();
        {
            let mut slots = self.slots.borrow_mut();
            slots.clear();
            for (group, members) in groups {
                slots.push(Slot::Header(group));
                for contact in members {
                    if Self::find(&slots, contact.id()).is_some() {
                        debug!("Skipping duplicate roster entry {}", contact.id());
                        continue;
                    }
                    slots.push(Slot::Entry(contact));
                }
            }
        }
        self.repin(anchor);
        self.on_contents_change.fire();
    }

    /// Fire selection subscribers if the cursor resolved differently since the last check.
    /// Called once per redraw tick.
    pub fn poll_selection(&self) -> bool {
        let current = (self.selected_index(), self.selected_id());
        if self.last_observed.get() == current {
            return false;
        }
        self.last_observed.set(current);
        self.on_selection_change.fire();
        true
    }

    pub fn subscribe_on_selection_change(&self, handler: impl Fn() + 'static) {
        self.on_selection_change.subscribe(handler);
    }

    pub fn subscribe_on_contents_change(&self, handler: impl Fn() + 'static) {
        self.on_contents_change.subscribe(handler);
    }

    fn anchor(&self) -> Option<Anchor> {
        let slots = self.slots.borrow();
        slots.get(self.selected.get()).map(|slot| match slot {
            Slot::Entry(c) => Anchor::Contact(c.id()),
            Slot::Header(g) => Anchor::Header(*g),
        })
    }

    fn repin(&self, anchor: Option<Anchor>) {
        let found = {
            let slots = self.slots.borrow();
            match anchor {
                Some(Anchor::Contact(id)) => Self::find(&slots, id),
                Some(Anchor::Header(group)) => slots
                    .iter()
                    .position(|s| matches!(s, Slot::Header(g) if *g == group)),
                None => None,
            }
        };
        match found {
            Some(index) => self.selected.set(index),
            None => self.clamp_selection(),
        }
    }

    fn clamp_selection(&self) {
        let len = self.len();
        if len == 0 {
            self.selected.set(0);
        } else if self.selected.get() >= len {
            self.selected.set(len - 1);
        }
    }

    // Slot range holding the members of `group`. Without headers the whole list is one group.
    fn segment_for(slots: &[Slot], group: RelationshipGroup) -> Range<usize> {
        let header = slots
            .iter()
            .position(|s| matches!(s, Slot::Header(g) if *g == group));
        let start = match header {
            Some(h) => h + 1,
            None => match slots.iter().rposition(Slot::is_header) {
                // Group has no header of its own: append to the last segment
                Some(last) => last + 1,
                None => 0,
            },
        };
        let end = slots[start..]
            .iter()
            .position(Slot::is_header)
            .map_or(slots.len(), |offset| start + offset);
        start..end
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionLookup for Roster {
    fn selected_id(&self) -> Option<UserId> {
        self.selected_contact().map(|c| c.id())
    }
}
