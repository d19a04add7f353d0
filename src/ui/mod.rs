pub mod theme;

use crate::app::{AppModel, DetailContent, JobDetail, Pane};
use crate::domain::{ItemHandle, JobNode, StatusKind, extra_data_rows, fmt_unix};
use crate::infra::{SnapshotEntry, SnapshotPresence, SnapshotSide};
use ratatui::prelude::*;
use ratatui::widgets::*;
use unicode_width::UnicodeWidthStr;

/// Rendering handle for one chooser row. The chooser formats it on every
/// reconciliation pass and flips its selected flag on commit; rendering just
/// reads the cached fields each frame.
#[derive(Clone, Debug, Default)]
pub struct JobRow {
    label: String,
    status_label: String,
    kind: StatusKind,
    selected: bool,
}

impl ItemHandle<JobNode> for JobRow {
    fn format_for(&mut self, _key: &String, value: &JobNode) {
        self.label = value.label.clone();
        self.status_label = value.status.label.clone();
        self.kind = value.status.kind();
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

pub fn render(frame: &mut Frame, model: &AppModel<JobRow>) {
    let full_area = frame.area();
    if full_area.width == 0 || full_area.height == 0 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(full_area);

    render_top_bar(frame, chunks[0], model);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(28),
            Constraint::Percentage(28),
            Constraint::Min(0),
        ])
        .split(chunks[1]);

    render_chooser_pane(frame, columns[0], model, Pane::Jobs);
    render_chooser_pane(frame, columns[1], model, Pane::Images);
    render_detail(frame, columns[2], model);

    render_footer(frame, chunks[2], model);

    if model.help_open {
        render_help_overlay(frame, chunks[1]);
    }
}

fn render_top_bar(frame: &mut Frame, area: Rect, model: &AppModel<JobRow>) {
    let base_style = Style::default().fg(theme::FG).bg(theme::BAR_BG);

    let title = format!(" {} ", env!("CARGO_PKG_NAME"));
    let paused = if model.paused { "[paused] " } else { "" };

    let mut clock = match model.server_time {
        Some(unix) => fmt_unix(unix),
        None => "Connecting...".to_string(),
    };
    if model.connection_error.is_some() {
        clock.push_str(" (stale)");
    }
    clock.push(' ');

    let used = UnicodeWidthStr::width(title.as_str())
        + UnicodeWidthStr::width(paused)
        + UnicodeWidthStr::width(clock.as_str());
    let spacer = " ".repeat((area.width as usize).saturating_sub(used));

    let spans = vec![
        Span::styled(title, base_style.add_modifier(Modifier::BOLD)),
        Span::styled(paused, Style::default().fg(theme::WARN).bg(theme::BAR_BG)),
        Span::styled(spacer, base_style),
        Span::styled(
            clock,
            if model.connection_error.is_some() {
                Style::default().fg(theme::DIM).bg(theme::BAR_BG)
            } else {
                Style::default().fg(theme::MUTED).bg(theme::BAR_BG)
            },
        ),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)).style(base_style), area);
}

fn render_chooser_pane(frame: &mut Frame, area: Rect, model: &AppModel<JobRow>, pane: Pane) {
    let chooser = match pane {
        Pane::Jobs => model.dashboard.jobs(),
        Pane::Images => model.dashboard.images(),
    };

    let focused = model.focus == pane;
    let border_style = if focused {
        Style::default().fg(theme::ACCENT)
    } else {
        Style::default().fg(theme::BORDER)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .padding(Padding::horizontal(1))
        .title(pane.title());

    if chooser.is_empty() {
        let message = match pane {
            Pane::Jobs => "No jobs.",
            Pane::Images => "No images.",
        };
        frame.render_widget(
            Paragraph::new(message).style(Style::default().fg(theme::DIM)).block(block),
            area,
        );
        return;
    }

    let inner_width = (area.width as usize).saturating_sub(4);
    let status_width = chooser
        .rows()
        .map(|(_, row)| UnicodeWidthStr::width(row.status_label.as_str()))
        .max()
        .unwrap_or(0);
    let label_width = inner_width.saturating_sub(status_width + 1);

    let items: Vec<ListItem> = chooser
        .rows()
        .map(|(_, row)| chooser_row_item(row, label_width, status_width))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD))
        .highlight_symbol("▸ ");

    let mut state = ListState::default();
    state.select(chooser.selected_index());
    frame.render_stateful_widget(list, area, &mut state);
}

fn chooser_row_item(row: &JobRow, label_width: usize, status_width: usize) -> ListItem<'static> {
    let label = truncate_to_width(&row.label, label_width);
    let pad = label_width.saturating_sub(UnicodeWidthStr::width(label.as_str()));

    let label_style = if row.selected {
        Style::default().fg(theme::ACCENT)
    } else {
        Style::default().fg(theme::FG)
    };
    let status = format!("{:>status_width$}", row.status_label);

    ListItem::new(Line::from(vec![
        Span::styled(label, label_style),
        Span::raw(" ".repeat(pad + 1)),
        Span::styled(status, Style::default().fg(status_color(row.kind))),
    ]))
}

fn render_detail(frame: &mut Frame, area: Rect, model: &AppModel<JobRow>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme::BORDER))
        .padding(Padding::horizontal(1))
        .title("Job Status");

    let lines = match model.dashboard.detail().content() {
        DetailContent::NothingSelected => vec![Line::from(Span::styled(
            "No job selected",
            Style::default().fg(theme::DIM),
        ))],
        DetailContent::Job(detail) => detail_lines(detail),
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn detail_lines(detail: &JobDetail) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        detail.header.clone(),
        Style::default().fg(theme::FG).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(vec![
        Span::styled(
            format!("{}: ", detail.status.label),
            Style::default().fg(status_color(detail.status.kind())),
        ),
        Span::styled(detail.status.message.clone(), Style::default().fg(theme::FG)),
    ]));

    let extra_rows = extra_data_rows(&detail.extra);
    if !extra_rows.is_empty() {
        lines.push(Line::default());
        let name_width = extra_rows
            .iter()
            .map(|(name, _)| UnicodeWidthStr::width(*name))
            .max()
            .unwrap_or(0);
        for (name, value) in extra_rows {
            lines.push(Line::from(vec![
                Span::styled(format!("{name:<name_width$}  "), Style::default().fg(theme::MUTED)),
                Span::styled(value, Style::default().fg(theme::FG)),
            ]));
        }
    }

    if let Some(snapshots) = &detail.snapshots {
        lines.push(Line::default());
        lines.extend(snapshot_lines(snapshots));
    }

    lines
}

fn snapshot_lines(snapshots: &[SnapshotEntry]) -> Vec<Line<'static>> {
    let name_width = snapshots
        .iter()
        .map(|snapshot| UnicodeWidthStr::width(snapshot.name.as_str()))
        .max()
        .unwrap_or(0)
        .max(UnicodeWidthStr::width("Snapshot"));

    let mut lines = vec![Line::from(Span::styled(
        format!("{:<name_width$}  {:<8}{:<8}", "Snapshot", "Source", "Receiver"),
        Style::default().fg(theme::MUTED).add_modifier(Modifier::BOLD),
    ))];

    for snapshot in snapshots {
        let (source_text, source_color) = side_cell(snapshot.source.as_ref());
        let (receiver_text, receiver_color) = side_cell(snapshot.receiver.as_ref());
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:<name_width$}  ", snapshot.name.clone()),
                Style::default().fg(theme::FG),
            ),
            Span::styled(format!("{source_text:<8}"), Style::default().fg(source_color)),
            Span::styled(format!("{receiver_text:<8}"), Style::default().fg(receiver_color)),
        ]));
    }
    lines
}

fn status_color(kind: StatusKind) -> Color {
    match kind {
        StatusKind::Failed => theme::ERROR,
        StatusKind::Succeeded => theme::SUCCESS,
        StatusKind::InProgress => theme::ACTIVE,
        StatusKind::Idle => theme::DIM,
    }
}

fn side_cell(side: Option<&SnapshotSide>) -> (&'static str, Color) {
    let presence = SnapshotPresence::of(side);
    let color = match presence {
        SnapshotPresence::Absent => theme::DIM,
        SnapshotPresence::Pruned => theme::WARN,
        SnapshotPresence::Kept => theme::SUCCESS,
    };
    (presence.label(), color)
}

fn render_footer(frame: &mut Frame, area: Rect, model: &AppModel<JobRow>) {
    let (text, style) = if let Some(error) = &model.connection_error {
        (
            format!("Backend unreachable: {error}"),
            Style::default().fg(theme::ERROR),
        )
    } else if let Some(notice) = &model.notice {
        (notice.clone(), Style::default().fg(theme::ACCENT))
    } else {
        (
            "q quit · r refresh · s run all · p prep all · space pause · tab focus · ? help"
                .to_string(),
            Style::default().fg(theme::DIM),
        )
    };
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let lines = [
        "Up/Down    select job or image",
        "Tab        switch pane",
        "Esc        back out of the images pane",
        "r          refresh now",
        "s          run all jobs",
        "p          prep all jobs",
        "space      pause/resume polling",
        "q          quit",
    ];
    let width = (lines.iter().map(|line| line.len()).max().unwrap_or(0) + 6) as u16;
    let height = lines.len() as u16 + 2;
    let overlay = centered_rect(area, width, height);

    frame.render_widget(Clear, overlay);
    let text: Vec<Line> = lines.iter().map(|line| Line::from(*line)).collect();
    frame.render_widget(
        Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme::ACCENT))
                .padding(Padding::horizontal(2))
                .title("Help"),
        ),
        overlay,
    );
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    out
}
