// Common test utilities for integration tests
// This module contains shared code for all integration tests

use std::rc::Rc;
use std::sync::Once;

use log::LevelFilter;

use social_tui::{
    config::Config,
    platform::{Status, UserHandle, UserId},
    App, AppState, Client, LoopbackClient,
};

pub const AMY: UserId = 2;
pub const BOB: UserId = 3;
pub const CAT: UserId = 4;

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

pub fn test_config() -> Config {
    Config {
        application_id: Some(1_234_567),
        tick_interval_ms: 1,
        ..Config::default()
    }
}

/// amy is in game, bob is idle elsewhere, cat is offline
pub fn friends() -> Vec<UserHandle> {
    vec![
        UserHandle::new(AMY, "amy", Status::Online)
            .with_display_name("Amy")
            .in_game(),
        UserHandle::new(BOB, "bob", Status::Idle).with_display_name("Bob"),
        UserHandle::new(CAT, "cat", Status::Offline).with_display_name("Cat"),
    ]
}

/// Deliver callbacks until nothing is left queued
pub fn drain(client: &LoopbackClient) {
    for _ in 0..100 {
        if client.is_idle() {
            return;
        }
        client.run_callbacks();
    }
    panic!("loopback client never went idle");
}

pub struct Fixture {
    pub client: Rc<LoopbackClient>,
    pub app: Rc<App>,
}

/// An app that has not been started yet
pub fn fixture_with(client: LoopbackClient) -> Fixture {
    setup_logging();
    let client = Rc::new(client);
    let app = App::new(test_config(), client.clone());
    Fixture { client, app }
}

/// A started app that went through authorization and is ready
pub fn ready_fixture() -> Fixture {
    let client = friends()
        .into_iter()
        .fold(LoopbackClient::new(), |client, user| client.with_friend(user));
    let fixture = fixture_with(client);
    fixture.app.start();
    drain(&fixture.client);
    assert_eq!(fixture.app.state(), AppState::Ready);
    fixture
}

impl Fixture {
    pub fn drain(&self) {
        drain(&self.client);
    }

    /// Select a contact the way the UI does and let the selection fire, as a tick would
    pub fn select(&self, id: UserId) {
        assert!(self.app.roster().set_selected_by_id(id));
        self.app.roster().poll_selection();
    }
}
