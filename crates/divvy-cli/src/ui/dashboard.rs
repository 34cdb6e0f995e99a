//! Right pane: the selected subscriber's dashboard.

use divvy_core::{
  access::AccessState,
  view::{CredentialGrant, DashboardView},
};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(view) = &app.dashboard else { return };

  let block = Block::default()
    .title(format!(" {} — {} ", view.name, view.phone))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let mut lines = header_lines(view);
  for sub in &view.subscriptions {
    lines.push(Line::raw(""));
    lines.extend(subscription_lines(sub));
  }
  if view.subscriptions.is_empty() {
    lines.push(Line::raw(""));
    lines.push(Line::from(Span::styled(
      "No subscriptions.",
      Style::default().fg(Color::DarkGray),
    )));
  }

  f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn header_lines(view: &DashboardView) -> Vec<Line<'static>> {
  let mut lines = Vec::new();

  let mut flags = Vec::new();
  if view.debtor {
    flags.push(Span::styled(
      "DEBTOR ",
      Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
    ));
  }
  if view.deleted {
    flags.push(Span::styled(
      "DELETED ",
      Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
    ));
  }
  if !flags.is_empty() {
    lines.push(Line::from(flags));
  }

  let seen = match view.last_seen_at {
    Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
    None => "never".to_string(),
  };
  lines.push(Line::from(vec![
    Span::styled("Last seen:  ", Style::default().fg(Color::DarkGray)),
    Span::raw(seen),
  ]));
  lines.push(Line::from(vec![
    Span::styled("Snapshot:   ", Style::default().fg(Color::DarkGray)),
    Span::raw(view.as_of.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
  ]));

  lines
}

fn subscription_lines(
  sub: &divvy_core::view::SubscriptionView,
) -> Vec<Line<'static>> {
  let eval = &sub.evaluation;

  let (state_label, state_color) = match eval.state {
    AccessState::Active => ("active", Color::Green),
    AccessState::ExpiringSoon => ("expiring soon", Color::Yellow),
    AccessState::GracePeriod => ("grace period", Color::Yellow),
    AccessState::Blocked => ("blocked", Color::Red),
  };

  let mut lines = vec![Line::from(vec![
    Span::styled(
      format!("▸ {}", eval.service),
      Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ),
    Span::raw("  "),
    Span::styled(
      state_label,
      Style::default().fg(state_color).add_modifier(Modifier::BOLD),
    ),
  ])];

  let remaining = match eval.days_remaining {
    d if d < 0 => format!("expired {} day(s) ago", -d),
    0 => "expires today".to_string(),
    d => format!("{d} day(s) left"),
  };
  let mut term = format!(
    "  {} → {}  ({remaining}{})",
    eval.start,
    eval.expires_on,
    if eval.paid { "" } else { ", unpaid" },
  );
  if eval.date_was_invalid {
    term.push_str("  [start date unreadable]");
  }
  lines.push(Line::from(Span::styled(
    term,
    Style::default().fg(Color::DarkGray),
  )));

  lines.push(grant_line(&sub.grant));
  lines
}

fn grant_line(grant: &CredentialGrant) -> Line<'static> {
  match grant {
    CredentialGrant::Granted { login, secret } => Line::from(vec![
      Span::styled("  login ", Style::default().fg(Color::DarkGray)),
      Span::styled(login.clone(), Style::default().fg(Color::Green)),
      Span::styled("  secret ", Style::default().fg(Color::DarkGray)),
      Span::styled(secret.clone(), Style::default().fg(Color::Green)),
    ]),
    CredentialGrant::Withheld => Line::from(Span::styled(
      "  credentials withheld",
      Style::default().fg(Color::Red),
    )),
    CredentialGrant::Provisioning => Line::from(Span::styled(
      "  preparing access…",
      Style::default().fg(Color::Yellow),
    )),
  }
}
