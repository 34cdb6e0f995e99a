//! Left pane: the subscriber directory list.

use chrono::Utc;
use divvy_core::{
  access::{self, AccessState},
  subscriber::Subscriber,
};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState},
};

use crate::app::{App, Screen};

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let filtered = app.filtered_subscribers();

  let title = if app.filter_active || !app.filter.is_empty() {
    format!(" Directory  /{}_ ", app.filter)
  } else {
    format!(" Directory ({}) ", filtered.len())
  };

  let border_style = if app.screen == Screen::Directory {
    Style::default().fg(Color::Cyan)
  } else {
    Style::default().fg(Color::DarkGray)
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(border_style);

  // Badge cutoffs run on the same UTC day the server evaluates with.
  let today = Utc::now().date_naive();
  let items: Vec<ListItem> = filtered
    .iter()
    .map(|s| ListItem::new(row_line(s, today)))
    .collect();

  let list = List::new(items).block(block).highlight_style(
    Style::default()
      .bg(Color::DarkGray)
      .add_modifier(Modifier::BOLD),
  );

  let mut state = ListState::default();
  if !filtered.is_empty() {
    state.select(Some(app.list_cursor.min(filtered.len() - 1)));
  }

  f.render_stateful_widget(list, area, &mut state);
}

/// One directory row: name, phone, and the worst-case state badge.
fn row_line(subscriber: &Subscriber, today: chrono::NaiveDate) -> Line<'static> {
  let mut spans = vec![
    Span::styled(
      format!("{:<20.20}", subscriber.name),
      Style::default().fg(Color::White),
    ),
    Span::styled(
      format!(" {:<14}", subscriber.phone),
      Style::default().fg(Color::DarkGray),
    ),
  ];

  if let Some((label, color)) = badge(subscriber, today) {
    spans.push(Span::styled(
      format!(" {label}"),
      Style::default().fg(color).add_modifier(Modifier::BOLD),
    ));
  }

  Line::from(spans)
}

/// Picks the most urgent badge for a subscriber, or none when all is well.
fn badge(
  subscriber: &Subscriber,
  today: chrono::NaiveDate,
) -> Option<(&'static str, Color)> {
  if subscriber.deleted {
    return Some(("DELETED", Color::DarkGray));
  }

  let evaluations = access::evaluate_all(subscriber, today);
  if evaluations
    .iter()
    .any(|e| e.state == AccessState::Blocked)
  {
    return Some(("BLOCKED", Color::Red));
  }
  if subscriber.debtor {
    return Some(("DEBTOR", Color::Magenta));
  }
  if evaluations
    .iter()
    .any(|e| e.state == AccessState::GracePeriod)
  {
    return Some(("GRACE", Color::Yellow));
  }
  if evaluations
    .iter()
    .any(|e| e.state == AccessState::ExpiringSoon)
  {
    return Some(("EXPIRING", Color::Yellow));
  }
  None
}
