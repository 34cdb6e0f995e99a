//! Full-width credential pool health table.

use divvy_core::health::{HealthRow, HealthState, UNBOUNDED};
use ratatui::{
  Frame,
  layout::{Constraint, Rect},
  style::{Color, Modifier, Style},
  text::Span,
  widgets::{Block, Borders, Cell, Row, Table},
};

use crate::app::App;

pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(format!(" Credential pools ({}) ", app.health.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));

  let header = Row::new(vec![
    Cell::from("SERVICE"),
    Cell::from("LOGIN"),
    Cell::from("AGE"),
    Cell::from("USAGE"),
    Cell::from("STATE"),
  ])
  .style(
    Style::default()
      .fg(Color::DarkGray)
      .add_modifier(Modifier::BOLD),
  );

  let rows: Vec<Row> = app.health.iter().map(row).collect();

  let table = Table::new(
    rows,
    [
      Constraint::Length(14),
      Constraint::Min(24),
      Constraint::Length(12),
      Constraint::Length(10),
      Constraint::Length(12),
    ],
  )
  .header(header)
  .block(block);

  f.render_widget(table, area);
}

fn row(entry: &HealthRow) -> Row<'static> {
  let (label, color) = match entry.state {
    HealthState::Healthy => ("healthy", Color::Green),
    HealthState::Overcrowded => ("overcrowded", Color::Yellow),
    HealthState::Expired => ("expired", Color::Red),
  };

  let usage = if entry.capacity == UNBOUNDED {
    format!("{}/∞", entry.usage_count)
  } else {
    format!("{}/{}", entry.usage_count, entry.capacity)
  };

  let login = if entry.visible {
    entry.login.clone()
  } else {
    format!("{} (hidden)", entry.login)
  };

  Row::new(vec![
    Cell::from(entry.service.clone()),
    Cell::from(login),
    Cell::from(format!("{}/{}d", entry.days_active, entry.threshold_days)),
    Cell::from(usage),
    Cell::from(Span::styled(
      label,
      Style::default().fg(color).add_modifier(Modifier::BOLD),
    )),
  ])
}
