// Presence Refresh Driver
// Keeps the roster in step with the platform's relationship push events.

use log::{debug, info};
use std::rc::Rc;

use crate::models::Contact;
use crate::platform::{Client, RelationshipGroup, UserId};
use crate::roster::Roster;

pub struct PresenceRefreshDriver {
    client: Rc<dyn Client>,
    roster: Rc<Roster>,
}

impl PresenceRefreshDriver {
    pub fn new(client: Rc<dyn Client>, roster: Rc<Roster>) -> Rc<Self> {
        Rc::new(PresenceRefreshDriver { client, roster })
    }

    /// Rebuild the whole roster from the platform's relationship groups
    pub fn refresh(&self) {
        let groups: Vec<(RelationshipGroup, Vec<Contact>)> = RelationshipGroup::ALL
            .iter()
            .map(|group| {
                let members = self
                    .client
                    .relationships_by_group(*group)
                    .into_iter()
                    .map(|user| Contact::new(user, *group))
                    .collect();
                (*group, members)
            })
            .collect();

        let total: usize = groups.iter().map(|(_, members)| members.len()).sum();
        debug!("Refreshing roster with {} contacts", total);
        self.roster.rebuild(groups);
    }

    /// Register the relationship and user push handlers, then load the initial roster
    pub fn run(self: &Rc<Self>) {
        info!("Starting presence refresh driver...");

        let driver = Rc::downgrade(self);
        self.client
            .set_relationship_groups_updated_callback(Box::new(move |_user_id| {
                if let Some(driver) = driver.upgrade() {
                    driver.refresh();
                }
            }));

        let driver = Rc::downgrade(self);
        self.client
            .set_relationship_created_callback(Box::new(move |user_id, is_update| {
                if let Some(driver) = driver.upgrade() {
                    driver.relationship_created(user_id, is_update);
                }
            }));

        let driver = Rc::downgrade(self);
        self.client
            .set_relationship_deleted_callback(Box::new(move |user_id| {
                if let Some(driver) = driver.upgrade() {
                    driver.roster.remove(user_id);
                }
            }));

        let driver = Rc::downgrade(self);
        self.client.set_user_updated_callback(Box::new(move |user_id| {
            if let Some(driver) = driver.upgrade() {
                driver.user_updated(user_id);
            }
        }));

        self.refresh();
    }

    fn relationship_created(&self, user_id: UserId, is_update: bool) {
        if is_update {
            // Relationship kind changed, which can move the user between groups
            self.refresh();
            return;
        }
        match self.client.user(user_id) {
            Some(user) => {
                info!("New relationship with {}", user.username);
                self.roster.add(Contact::from_user(user));
            }
            None => debug!("Relationship created for unknown user {}", user_id),
        }
    }

    fn user_updated(&self, user_id: UserId) {
        if self.roster.get_by_id(user_id).is_none() {
            debug!("Ignoring update for {}, not in roster", user_id);
            return;
        }
        match self.client.user(user_id) {
            Some(user) => self.roster.add(Contact::from_user(user)),
            None => debug!("User {} vanished before update could be read", user_id),
        }
    }
}
