// Application state machine
// Owns every core component and drives Unauthenticated -> Authorizing -> TokenExchange ->
// Connecting -> Ready. Each step is a platform round-trip; a failure is logged, shown on the
// authenticating overlay and stops progress where it is. Ready activates the services once.

use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::auth::{self, CodeVerifier};
use crate::buttons::ButtonBar;
use crate::config::Config;
use crate::messages::MessageStore;
use crate::models::SelectionLookup;
use crate::notify::Notifier;
use crate::platform::{AccessToken, AuthorizationCode, Client, ClientStatus, Deadlines, PlatformError};
use crate::presence;
use crate::roster::{PresenceRefreshDriver, Roster};
use crate::voice::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Unauthenticated,
    Authorizing,
    TokenExchange,
    Connecting,
    Ready,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppState::Unauthenticated => "Not signed in",
            AppState::Authorizing => "Waiting for authorization...",
            AppState::TokenExchange => "Exchanging authorization code...",
            AppState::Connecting => "Connecting...",
            AppState::Ready => "Ready",
        };
        f.write_str(label)
    }
}

pub struct App {
    config: Config,
    client: Rc<dyn Client>,
    deadlines: Rc<Deadlines>,
    roster: Rc<Roster>,
    refresh: Rc<PresenceRefreshDriver>,
    voice: Rc<SessionRegistry>,
    messages: Rc<MessageStore>,
    buttons: Rc<ButtonBar>,
    state: Cell<AppState>,
    last_error: RefCell<Option<String>>,
    overlay_visible: Cell<bool>,
    ready_latch: OnceCell<()>,
    on_state_change: Notifier<App>,
}

impl App {
    pub fn new(config: Config, client: Rc<dyn Client>) -> Rc<Self> {
        let deadlines = Rc::new(Deadlines::new(config.request_timeout()));
        let roster = Rc::new(Roster::new());
        let refresh = PresenceRefreshDriver::new(Rc::clone(&client), Rc::clone(&roster));
        let voice = SessionRegistry::new(Rc::clone(&client), Rc::clone(&deadlines));
        let selection: Rc<dyn SelectionLookup> = roster.clone();
        let messages = MessageStore::new(
            Rc::clone(&client),
            Rc::clone(&deadlines),
            selection,
            config.history_page_size,
        );
        let buttons = ButtonBar::new(Rc::clone(&roster), Rc::clone(&voice));

        // Selecting a contact reads its conversation and makes sure its history is loading
        let store = Rc::downgrade(&messages);
        let selected = Rc::downgrade(&roster);
        roster.subscribe_on_selection_change(move || {
            let (Some(store), Some(roster)) = (store.upgrade(), selected.upgrade()) else {
                return;
            };
            if let Some(contact) = roster.selected_contact() {
                store.mark_read(contact.id());
                store.history(contact.id());
            }
        });

        Rc::new(App {
            config,
            client,
            deadlines,
            roster,
            refresh,
            voice,
            messages,
            buttons,
            state: Cell::new(AppState::Unauthenticated),
            last_error: RefCell::new(None),
            overlay_visible: Cell::new(true),
            ready_latch: OnceCell::new(),
            on_state_change: Notifier::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Rc<dyn Client> {
        &self.client
    }

    pub fn deadlines(&self) -> &Rc<Deadlines> {
        &self.deadlines
    }

    pub fn roster(&self) -> &Rc<Roster> {
        &self.roster
    }

    pub fn voice(&self) -> &Rc<SessionRegistry> {
        &self.voice
    }

    pub fn messages(&self) -> &Rc<MessageStore> {
        &self.messages
    }

    pub fn buttons(&self) -> &Rc<ButtonBar> {
        &self.buttons
    }

    pub fn state(&self) -> AppState {
        self.state.get()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible.get()
    }

    pub fn subscribe_on_state_change(&self, handler: impl Fn() + 'static) {
        self.on_state_change.subscribe(handler);
    }

    fn set_state(&self, state: AppState) {
        if self.state.replace(state) != state {
            info!("Application state: {:?}", state);
            self.on_state_change.fire();
        }
    }

    fn fail(&self, step: &str, error: PlatformError) {
        error!("{} failed: {}", step, error);
        *self.last_error.borrow_mut() = Some(format!("{} failed: {}", step, error));
        self.on_state_change.fire();
    }

    /// Listen for connection status and begin the authorization chain
    pub fn start(self: &Rc<Self>) {
        let app = Rc::downgrade(self);
        self.client
            .set_status_changed_callback(Box::new(move |status, error| {
                if let Some(app) = app.upgrade() {
                    app.status_changed(status, error);
                }
            }));

        let application_id = match self.config.require_application_id() {
            Ok(id) => id,
            Err(e) => {
                error!("{}", e);
                *self.last_error.borrow_mut() = Some(e.to_string());
                self.on_state_change.fire();
                return;
            }
        };

        self.set_state(AppState::Authorizing);
        let verifier = CodeVerifier::generate();
        let args = auth::authorization_args(application_id, &verifier);

        let app = Rc::downgrade(self);
        self.client.authorize(
            args,
            self.deadlines.guard(Box::new(move |result| {
                let Some(app) = app.upgrade() else { return };
                match result {
                    Ok(code) => app.exchange_code(application_id, code, verifier),
                    Err(e) => app.fail("Authorization", e),
                }
            })),
        );
    }

    fn exchange_code(self: &Rc<Self>, application_id: u64, code: AuthorizationCode, verifier: CodeVerifier) {
        self.set_state(AppState::TokenExchange);
        let request = auth::token_request(application_id, &code, &verifier);

        let app = Rc::downgrade(self);
        self.client.get_token(
            request,
            self.deadlines.guard(Box::new(move |result| {
                let Some(app) = app.upgrade() else { return };
                match result {
                    Ok(token) => app.apply_token(token),
                    Err(e) => app.fail("Token exchange", e),
                }
            })),
        );
    }

    fn apply_token(self: &Rc<Self>, token: AccessToken) {
        debug!("Received {} token, expires in {}s", token.token_type, token.expires_in);
        let app = Rc::downgrade(self);
        self.client.update_token(
            &token,
            self.deadlines.guard(Box::new(move |result| {
                let Some(app) = app.upgrade() else { return };
                match result {
                    Ok(()) => {
                        app.set_state(AppState::Connecting);
                        app.client.connect();
                    }
                    Err(e) => app.fail("Token update", e),
                }
            })),
        );
    }

    fn status_changed(&self, status: ClientStatus, error: Option<PlatformError>) {
        info!("Status changed: {:?}", status);
        match (status, error) {
            (ClientStatus::Ready, _) => self.ready(),
            (_, Some(e)) => self.fail("Connection", e),
            (ClientStatus::Disconnected, None) if self.state() == AppState::Ready => {
                warn!("Disconnected after becoming ready")
            }
            _ => {}
        }
    }

    /// Activate the services. Runs once no matter how many ready events arrive.
    pub fn ready(&self) {
        if self.ready_latch.set(()).is_err() {
            debug!("Client already ready, ignoring repeated ready event");
            return;
        }
        info!("Client is ready!");
        self.overlay_visible.set(false);
        *self.last_error.borrow_mut() = None;
        presence::set_default_presence(self.client.as_ref());
        self.refresh.run();
        self.voice.run();
        self.messages.run();
        self.set_state(AppState::Ready);
    }
}
