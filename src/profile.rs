// Profile pane for the selected contact

use ratatui::prelude::*;

use crate::models::Contact;
use crate::platform::{RelationshipKind, Status};

fn status_color(status: Status) -> Color {
    match status {
        Status::Online => Color::Green,
        Status::Idle => Color::Yellow,
        Status::DoNotDisturb | Status::Blocked => Color::Red,
        Status::Invisible | Status::Offline | Status::Unknown => Color::Gray,
    }
}

fn relationship_color(kind: RelationshipKind) -> Color {
    match kind {
        RelationshipKind::Friend => Color::Green,
        RelationshipKind::Blocked => Color::Red,
        RelationshipKind::PendingIncoming | RelationshipKind::PendingOutgoing => Color::Yellow,
        RelationshipKind::None | RelationshipKind::Implicit => Color::Gray,
    }
}

fn field(name: &str, value: String, style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", name), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(value, style),
    ])
}

pub fn profile_lines(contact: Option<&Contact>) -> Text<'static> {
    let Some(contact) = contact else {
        return Text::from(vec![Line::from(Span::styled(
            "No Profile Selected",
            Style::default().fg(Color::DarkGray),
        ))]);
    };
    let user = contact.user();

    let mut lines = vec![field("Username", user.username.clone(), Style::default())];
    if !user.display_name.is_empty() && user.display_name != user.username {
        lines.push(field("Display Name", user.display_name.clone(), Style::default()));
    }
    lines.push(field("User ID", user.id.to_string(), Style::default()));
    if user.is_provisional {
        lines.push(field(
            "Account",
            "Provisional".to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }
    lines.push(Line::default());
    lines.push(field(
        "Status",
        contact.status().to_string(),
        Style::default().fg(status_color(contact.status())),
    ));
    lines.push(field(
        "Relationship",
        user.relationship.platform.to_string(),
        Style::default().fg(relationship_color(user.relationship.platform)),
    ));
    lines.push(field(
        "In-app relationship",
        user.relationship.game.to_string(),
        Style::default().fg(relationship_color(user.relationship.game)),
    ));
    Text::from(lines)
}
