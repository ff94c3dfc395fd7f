use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::cell::Cell;
use std::rc::Rc;
use std::{io, time::Duration};
use textwrap::wrap;
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::app::App;
use crate::buttons::ButtonKind;
use crate::event_loop::{Frontend, LoopControl};
use crate::messages::{History, HistoryState};
use crate::models::{DeliveryStatus, Message};
use crate::platform::UserId;
use crate::profile::profile_lines;
use crate::roster::Slot;

pub use ratatui::backend::CrosstermBackend;
pub use ratatui::Terminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Roster,
    Buttons,
    Compose,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Roster => Focus::Buttons,
            Focus::Buttons => Focus::Compose,
            Focus::Compose => Focus::Roster,
        }
    }

    fn previous(self) -> Self {
        match self {
            Focus::Roster => Focus::Compose,
            Focus::Buttons => Focus::Roster,
            Focus::Compose => Focus::Buttons,
        }
    }
}

/// What the large right-hand pane shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Messages,
    Profile,
}

pub struct Screen {
    app: Rc<App>,
    input: Input,
    focus: Rc<Cell<Focus>>,
    pane: Rc<Cell<Pane>>,
}

impl Screen {
    pub fn new(app: Rc<App>) -> Self {
        let focus = Rc::new(Cell::new(Focus::Roster));
        let pane = Rc::new(Cell::new(Pane::Messages));

        let shown = Rc::clone(&pane);
        app.buttons()
            .subscribe_on_profile_click(move || shown.set(Pane::Profile));
        let (shown, focused) = (Rc::clone(&pane), Rc::clone(&focus));
        app.buttons().subscribe_on_message_click(move || {
            shown.set(Pane::Messages);
            focused.set(Focus::Compose);
        });

        Screen {
            app,
            input: Input::default(),
            focus,
            pane,
        }
    }

    pub fn focus(&self) -> Focus {
        self.focus.get()
    }

    pub fn pane(&self) -> Pane {
        self.pane.get()
    }

    pub fn compose_text(&self) -> &str {
        self.input.value()
    }

    /// Drain every key event already waiting, without blocking
    pub fn process_input(&mut self) -> Result<LoopControl> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && self.handle_key(key) == LoopControl::Quit {
                    return Ok(LoopControl::Quit);
                }
            }
        }
        Ok(LoopControl::Continue)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> LoopControl {
        match key.code {
            KeyCode::Esc => return LoopControl::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return LoopControl::Quit
            }
            _ => {}
        }
        if self.app.overlay_visible() {
            return LoopControl::Continue;
        }

        let roster = Rc::clone(self.app.roster());
        let buttons = Rc::clone(self.app.buttons());
        match (self.focus.get(), key.code) {
            (_, KeyCode::Tab) => self.focus.set(self.focus.get().next()),
            (_, KeyCode::BackTab) => self.focus.set(self.focus.get().previous()),
            (_, KeyCode::Up) => {
                roster.select_previous();
            }
            (_, KeyCode::Down) => {
                roster.select_next();
            }
            (Focus::Roster, KeyCode::Enter) => {
                self.pane.set(Pane::Messages);
                self.focus.set(Focus::Compose);
            }
            (Focus::Buttons, KeyCode::Left) => buttons.focus_previous(),
            (Focus::Buttons, KeyCode::Right) => buttons.focus_next(),
            (Focus::Buttons, KeyCode::Enter) => {
                let pressed = buttons.press();
                debug!("Pressed {}", pressed.label());
            }
            (Focus::Compose, KeyCode::Enter) => self.send_compose(),
            (Focus::Compose, _) => {
                self.input.handle_event(&Event::Key(key));
                if let Some(contact) = roster.selected_contact() {
                    self.app.messages().mark_read(contact.id());
                }
            }
            _ => {}
        }
        LoopControl::Continue
    }

    fn send_compose(&mut self) {
        let Some(contact) = self.app.roster().selected_contact() else {
            debug!("No contact selected, keeping draft");
            return;
        };
        if self.app.messages().send(contact.id(), self.input.value()).is_some() {
            self.input.reset();
        }
    }

    pub fn draw<B: Backend>(&self, f: &mut Frame<B>) {
        let size = f.size();
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(self.app.config().roster_width),
                Constraint::Min(20),
            ])
            .split(size);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // Messages or profile
                Constraint::Length(3), // Buttons
                Constraint::Length(3), // Compose
                Constraint::Length(1), // Help line
            ])
            .split(chunks[1]);

        self.draw_roster(f, chunks[0]);
        match self.pane.get() {
            Pane::Messages => self.draw_messages(f, right[0]),
            Pane::Profile => {
                let selected = self.app.roster().selected_contact();
                let profile = Paragraph::new(profile_lines(selected.as_ref()))
                    .block(Block::default().title("Profile").borders(Borders::ALL))
                    .wrap(Wrap { trim: false });
                f.render_widget(profile, right[0]);
            }
        }
        self.draw_buttons(f, right[1]);

        let compose = Paragraph::new(self.input.value()).block(
            Block::default()
                .title("Message")
                .borders(Borders::ALL)
                .border_style(focus_style(self.focus.get() == Focus::Compose)),
        );
        f.render_widget(compose, right[2]);

        let help = Paragraph::new(Line::from(Span::styled(
            "ESC quit | TAB focus | Up/Down select | Left/Right buttons | Enter send/press",
            Style::default().fg(Color::Gray),
        )));
        f.render_widget(help, right[3]);

        if self.focus.get() == Focus::Compose && !self.app.overlay_visible() {
            f.set_cursor(right[2].x + self.input.cursor() as u16 + 1, right[2].y + 1);
        }

        if self.app.overlay_visible() {
            draw_authenticating(f, &self.app, size);
        }
    }

    fn draw_roster<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let roster = self.app.roster();
        let voice = self.app.voice();
        let messages = self.app.messages();

        let items: Vec<ListItem> = roster
            .slots()
            .iter()
            .map(|slot| match slot {
                Slot::Header(group) => ListItem::new(Line::from(Span::styled(
                    group.label(),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                ))),
                Slot::Entry(contact) => {
                    ListItem::new(contact.formatted_label(&**voice, &**messages))
                }
            })
            .collect();

        let mut state = ListState::default();
        state.select(roster.selected_index());

        let list = List::new(items)
            .block(
                Block::default()
                    .title("Friends")
                    .borders(Borders::ALL)
                    .border_style(focus_style(self.focus.get() == Focus::Roster)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_messages<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let selected = self.app.roster().selected_contact();
        let (title, lines) = match &selected {
            Some(contact) => {
                let history = self.app.messages().snapshot(contact.id());
                let me = self.app.client().current_user().map(|u| u.id);
                let width = area.width.saturating_sub(2) as usize;
                (
                    format!("Messages with {}", contact.display_name()),
                    message_lines(&history, me, contact.display_name(), width),
                )
            }
            None => (
                "Messages".to_string(),
                vec![placeholder("Select a friend to start chatting")],
            ),
        };

        let items: Vec<ListItem> = lines.into_iter().map(ListItem::new).collect();
        // Keep the newest line in view
        let mut state = ListState::default();
        if !items.is_empty() {
            state.select(Some(items.len() - 1));
        }
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default());
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_buttons<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let bar = self.app.buttons();
        let focused = self.focus.get() == Focus::Buttons;

        let mut spans = Vec::new();
        for (i, kind) in bar.buttons().iter().enumerate() {
            let mut style = match kind {
                ButtonKind::Disconnect => Style::default().fg(Color::Red),
                _ => Style::default(),
            };
            if focused && i == bar.focused_index() {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(format!("[ {} ]", kind.label()), style));
            spans.push(Span::raw(" "));
        }

        let buttons = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(focused)),
        );
        f.render_widget(buttons, area);
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn placeholder(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

fn status_indicator(message: &Message) -> &'static str {
    match message.delivery_status {
        DeliveryStatus::Sending => "",
        DeliveryStatus::Sent => " ✓",
        DeliveryStatus::Received => "",
        DeliveryStatus::Failed => " ❌",
    }
}

/// Render a conversation as wrapped lines. `me` decides which messages are shown as "You".
pub fn message_lines(
    history: &History,
    me: Option<UserId>,
    contact_name: &str,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match &history.state {
        HistoryState::NotFetched | HistoryState::Fetching if history.messages.is_empty() => {
            return vec![placeholder("Loading history...")];
        }
        HistoryState::Loaded if history.messages.is_empty() => {
            return vec![placeholder("No messages yet")];
        }
        HistoryState::Failed(reason) => lines.push(Line::from(Span::styled(
            format!("Could not load history: {}", reason),
            Style::default().fg(Color::Red),
        ))),
        _ => {}
    }

    let width = width.max(1);
    for m in &history.messages {
        let timestamp = m.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        let outgoing = Some(m.author_id) == me;
        let author = if outgoing { "You" } else { contact_name };
        let full = format!("[{}] {}: {}{}", timestamp, author, m.content, status_indicator(m));

        let style = match (outgoing, m.delivery_status) {
            (true, DeliveryStatus::Failed) => Style::default().fg(Color::Red),
            (true, DeliveryStatus::Sending) => Style::default().fg(Color::DarkGray),
            (true, _) => Style::default().fg(Color::Blue),
            (false, _) => Style::default(),
        };
        for line in wrap(&full, width) {
            lines.push(Line::from(Span::styled(line.into_owned(), style)));
        }
    }
    lines
}

fn draw_authenticating<B: Backend>(f: &mut Frame<B>, app: &App, area: Rect) {
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 7.min(area.height.saturating_sub(2));
    let popup_area = Rect::new(
        (area.width - popup_width) / 2,
        (area.height - popup_height) / 2,
        popup_width,
        popup_height,
    );

    let popup_block = Block::default()
        .title("Authenticating")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(Clear, popup_area);
    f.render_widget(popup_block, popup_area);

    let inner_area = popup_area.inner(&Margin {
        vertical: 1,
        horizontal: 2,
    });

    let mut lines = vec![Line::from(app.state().to_string())];
    if let Some(error) = app.last_error() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(error, Style::default().fg(Color::Red))));
    }
    lines.push(Line::from(Span::styled(
        "Press ESC to quit",
        Style::default().fg(Color::Gray),
    )));
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: true }),
        inner_area,
    );
}

/// The real terminal behind the polling loop
pub struct TerminalFrontend {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    screen: Screen,
}

impl TerminalFrontend {
    pub fn new(screen: Screen) -> Result<Self> {
        Ok(TerminalFrontend {
            terminal: setup_terminal()?,
            screen,
        })
    }

    pub fn restore(self) -> Result<()> {
        restore_terminal(self.terminal)
    }
}

impl Frontend for TerminalFrontend {
    fn process_input(&mut self) -> Result<LoopControl> {
        self.screen.process_input()
    }

    fn redraw(&mut self) -> Result<()> {
        let screen = &self.screen;
        self.terminal.draw(|f| screen.draw(f))?;
        Ok(())
    }
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
