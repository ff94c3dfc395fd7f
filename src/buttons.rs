// Button bar below the conversation pane
// Profile and Message are published through the bar's own notifiers; the voice button acts on the
// selected contact directly and turns into Disconnect while that contact is in a call.

use log::debug;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::models::VoiceStateLookup;
use crate::notify::Notifier;
use crate::roster::Roster;
use crate::voice::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Profile,
    Message,
    Voice,
    Disconnect,
}

impl ButtonKind {
    pub fn label(&self) -> &'static str {
        match self {
            ButtonKind::Profile => "Profile",
            ButtonKind::Message => "Message",
            ButtonKind::Voice => "Voice",
            ButtonKind::Disconnect => "Disconnect",
        }
    }
}

pub struct ButtonBar {
    roster: Rc<Roster>,
    voice: Rc<SessionRegistry>,
    buttons: RefCell<[ButtonKind; 3]>,
    focused: Cell<usize>,
    on_profile_click: Notifier<ButtonBar>,
    on_message_click: Notifier<ButtonBar>,
}

impl ButtonBar {
    pub fn new(roster: Rc<Roster>, voice: Rc<SessionRegistry>) -> Rc<Self> {
        let bar = Rc::new(ButtonBar {
            roster,
            voice,
            buttons: RefCell::new([ButtonKind::Profile, ButtonKind::Message, ButtonKind::Voice]),
            focused: Cell::new(0),
            on_profile_click: Notifier::new(),
            on_message_click: Notifier::new(),
        });

        let weak = Rc::downgrade(&bar);
        bar.voice.subscribe_on_change(move || {
            if let Some(bar) = weak.upgrade() {
                bar.update();
            }
        });
        let weak = Rc::downgrade(&bar);
        bar.roster.subscribe_on_selection_change(move || {
            if let Some(bar) = weak.upgrade() {
                bar.update();
            }
        });
        bar
    }

    fn update(&self) {
        let in_call = self
            .roster
            .selected_contact()
            .map_or(false, |c| self.voice.in_call(c.id()));
        let third = if in_call {
            ButtonKind::Disconnect
        } else {
            ButtonKind::Voice
        };
        self.buttons.borrow_mut()[2] = third;
    }

    pub fn buttons(&self) -> [ButtonKind; 3] {
        *self.buttons.borrow()
    }

    pub fn focused(&self) -> ButtonKind {
        self.buttons.borrow()[self.focused.get()]
    }

    pub fn focused_index(&self) -> usize {
        self.focused.get()
    }

    pub fn focus_next(&self) {
        self.focused.set((self.focused.get() + 1) % 3);
    }

    pub fn focus_previous(&self) {
        self.focused.set((self.focused.get() + 2) % 3);
    }

    pub fn subscribe_on_profile_click(&self, handler: impl Fn() + 'static) {
        self.on_profile_click.subscribe(handler);
    }

    pub fn subscribe_on_message_click(&self, handler: impl Fn() + 'static) {
        self.on_message_click.subscribe(handler);
    }

    /// Activate the focused button
    pub fn press(&self) -> ButtonKind {
        let kind = self.focused();
        match kind {
            ButtonKind::Profile => self.on_profile_click.fire(),
            ButtonKind::Message => self.on_message_click.fire(),
            ButtonKind::Voice | ButtonKind::Disconnect => match self.roster.selected_contact() {
                Some(contact) if kind == ButtonKind::Voice => self.voice.call(contact.id()),
                Some(contact) => self.voice.disconnect(contact.id()),
                None => debug!("No contact selected for {}", kind.label()),
            },
        }
        kind
    }
}
