use std::io;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use ratatui::Terminal;

use homepage_log as logging;
use homepage_status::SyncTier;

use crate::dashboard::{label_cell, Dashboard, PanelKind, PanelRow, RowKind, QR_TAG, STATUS_DOT};
use crate::page::{ids, Element};
use crate::poller::PollOutcome;

const UI_TICK: Duration = Duration::from_millis(50);
const CONSOLE_HEIGHT: u16 = 7;
const CONSOLE_CAPACITY: usize = 512;

#[derive(Clone, Copy, Debug)]
struct Theme {
    bg: Color,
    panel: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    warning: Color,
    danger: Color,
    success: Color,
}

const THEME: Theme = Theme {
    bg: Color::Rgb(0, 0, 0),
    panel: Color::Rgb(10, 10, 10),
    border: Color::Rgb(40, 40, 40),
    text: Color::Rgb(230, 230, 230),
    muted: Color::Rgb(100, 100, 100),
    accent: Color::Rgb(247, 147, 26),
    warning: Color::Rgb(250, 204, 21),
    danger: Color::Rgb(239, 68, 68),
    success: Color::Rgb(34, 197, 94),
};

fn style_base() -> Style {
    Style::default().fg(THEME.text).bg(THEME.bg)
}

fn style_panel() -> Style {
    Style::default().fg(THEME.text).bg(THEME.panel)
}

fn style_muted() -> Style {
    Style::default().fg(THEME.muted).bg(THEME.panel)
}

fn style_key() -> Style {
    Style::default()
        .fg(THEME.accent)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_border() -> Style {
    Style::default().fg(THEME.border).bg(THEME.panel)
}

fn style_title() -> Style {
    Style::default()
        .fg(THEME.text)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_error() -> Style {
    Style::default()
        .fg(THEME.danger)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn style_warn() -> Style {
    Style::default()
        .fg(THEME.warning)
        .bg(THEME.panel)
        .add_modifier(Modifier::BOLD)
}

fn panel_block(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(style_border())
        .style(Style::default().bg(THEME.panel))
        .title(Span::styled(title.into(), style_title()))
}

fn tier_color(tier: Option<SyncTier>) -> Color {
    match tier {
        Some(SyncTier::Green) => THEME.success,
        Some(SyncTier::Yellow) => THEME.warning,
        Some(SyncTier::Red) => THEME.danger,
        None => THEME.muted,
    }
}

fn level_style(level: logging::Level) -> Style {
    match level {
        logging::Level::Error => style_error(),
        logging::Level::Warn => style_warn(),
        logging::Level::Info => style_panel(),
        logging::Level::Debug | logging::Level::Trace => style_muted(),
    }
}

/// Static header facts.
#[derive(Clone, Debug)]
pub struct HeaderInfo {
    pub title: String,
    pub endpoint: String,
    pub refresh: Duration,
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, String> {
        enable_raw_mode().map_err(|err| err.to_string())?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide, EnableMouseCapture)
            .map_err(|err| err.to_string())?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, Show, LeaveAlternateScreen, DisableMouseCapture);
    }
}

fn rect_contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn modal_area(area: Rect) -> Rect {
    centered_rect(80, 90, area)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PanelArea {
    kind: PanelKind,
    header: Rect,
    body: Rect,
}

#[derive(Clone, Debug, PartialEq)]
struct Areas {
    header: Rect,
    panels: Vec<PanelArea>,
    console: Rect,
}

/// Header line, then each panel's title row and its animated body, with the
/// console strip pinned to the bottom. Panels past the bottom are clipped.
fn layout_areas(dashboard: &Dashboard, area: Rect) -> Areas {
    let header = Rect::new(area.x, area.y, area.width, area.height.min(1));
    let console_height = CONSOLE_HEIGHT.min(area.height.saturating_sub(header.height));
    let bottom = area.bottom().saturating_sub(console_height);
    let console = Rect::new(area.x, bottom, area.width, console_height);
    let mut y = header.bottom();
    let mut panels = Vec::new();
    for kind in PanelKind::ALL {
        let title_height = u16::from(y < bottom);
        let title = Rect::new(area.x, y, area.width, title_height);
        y += title_height;
        let rendered = dashboard
            .panels()
            .get(kind.body_id())
            .map(|panel| panel.rendered_height())
            .unwrap_or(0);
        let body_height = rendered.min(bottom.saturating_sub(y));
        let body = Rect::new(
            area.x.saturating_add(1),
            y,
            area.width.saturating_sub(2),
            body_height,
        );
        y += body_height;
        panels.push(PanelArea {
            kind,
            header: title,
            body,
        });
    }

    Areas {
        header,
        panels,
        console,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LinkHit {
    Copy,
    Zoom,
}

/// Where a click at (`dx`, `dy`) inside a wrapped link row lands.
fn link_hit(label_and_value: usize, zoomable: bool, dx: u16, dy: u16, width: u16) -> LinkHit {
    let offset = usize::from(dy) * usize::from(width.max(1)) + usize::from(dx);
    if zoomable && offset >= label_and_value {
        LinkHit::Zoom
    } else {
        LinkHit::Copy
    }
}

/// Breaks styled spans into lines of exactly `width` characters, the same
/// way [`Dashboard::row_height`] counts them.
fn wrap_spans(spans: Vec<Span<'static>>, width: u16) -> Vec<Line<'static>> {
    let width = usize::from(width.max(1));
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;
    for span in spans {
        let mut chunk = String::new();
        for ch in span.content.chars() {
            if used == width {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), span.style));
                }
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            chunk.push(ch);
            used += 1;
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, span.style));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = value.chars().take(keep).collect();
    out.push('…');
    out
}

fn gauge_spans(element: &Element, width: u16) -> Vec<Span<'static>> {
    let label = label_cell("");
    let bar_width = usize::from(width)
        .saturating_sub(label.chars().count())
        .max(1);
    let percent = element.fill_percent.unwrap_or(0.0);
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let filled = ((percent / 100.0) * bar_width as f64).round() as usize;
    let filled = filled.min(bar_width);
    vec![
        Span::raw(label),
        Span::styled(
            "█".repeat(filled),
            Style::default().fg(tier_color(element.tier)).bg(THEME.panel),
        ),
        Span::styled("░".repeat(bar_width - filled), style_muted()),
    ]
}

fn row_lines(dashboard: &Dashboard, row: &PanelRow, width: u16) -> Vec<Line<'static>> {
    let page = dashboard.page();
    let Some(element) = page.get(&row.id) else {
        return Vec::new();
    };
    if row.kind == RowKind::Gauge {
        return vec![Line::from(gauge_spans(element, width))];
    }
    let label = Span::styled(label_cell(&row.label), style_muted());
    let spans = match &row.kind {
        RowKind::Text | RowKind::Gauge => {
            vec![label, Span::styled(element.text.clone(), style_panel())]
        }
        RowKind::Status { dot } => {
            let tier = page.get(dot).and_then(|dot| dot.tier);
            vec![
                label,
                Span::styled(STATUS_DOT, Style::default().fg(tier_color(tier)).bg(THEME.panel)),
                Span::styled(element.text.clone(), style_title()),
            ]
        }
        RowKind::Badge => vec![label, Span::styled(element.text.clone(), style_error())],
        RowKind::Link { zoomable } => {
            let selected = dashboard.selected_link() == Some(row.id.as_str());
            let label_style = if selected {
                style_key().add_modifier(Modifier::REVERSED)
            } else {
                style_muted()
            };
            let mut value_style = style_panel();
            if element.copied {
                value_style = value_style.fg(THEME.success).add_modifier(Modifier::BOLD);
            }
            if let Some(color) = element.color {
                value_style = value_style.fg(color);
            }
            let mut spans = vec![
                Span::styled(label_cell(&row.label), label_style),
                Span::styled(element.text.clone(), value_style),
            ];
            if *zoomable {
                spans.push(Span::styled(QR_TAG, style_key()));
            }
            spans
        }
    };
    wrap_spans(spans, width)
}

fn build_qr_lines(data: &str, max_width: usize, max_height: usize) -> Vec<Line<'static>> {
    if max_width == 0 || max_height == 0 {
        return Vec::new();
    }

    let code = match QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M) {
        Ok(code) => code,
        Err(_) => return vec![Line::raw("Failed to render QR.")],
    };

    // Dense1x2 packs two module rows into one terminal line.
    let qr = code
        .render::<unicode::Dense1x2>()
        .quiet_zone(true)
        .max_dimensions(max_width as u32, (max_height * 2) as u32)
        .build();

    let lines = qr.lines().map(str::to_string).collect::<Vec<_>>();
    let content_width = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    if lines.is_empty() || content_width > max_width || lines.len() > max_height {
        return Vec::new();
    }

    let pad = (max_width - content_width) / 2;
    lines
        .into_iter()
        .map(|line| {
            Line::styled(
                format!("{:<pad$}{}", "", line, pad = pad),
                Style::default().fg(Color::White).bg(Color::Black),
            )
        })
        .collect()
}

fn header_line(dashboard: &Dashboard, info: &HeaderInfo) -> Line<'static> {
    let updated = dashboard
        .last_update_ms()
        .map(|ms| format!("{} UTC", logging::UtcTime::from_ms(ms).clock()))
        .unwrap_or_else(|| "waiting".to_string());
    Line::from(vec![
        Span::styled(format!(" {} ", info.title), style_key()),
        Span::styled(format!(" {} ", info.endpoint), style_muted()),
        Span::raw(format!(" updated {updated} · every {}s ", info.refresh.as_secs())),
        Span::styled(" 1/2/3 panels  ↑↓ select  c copy  z QR  r refresh  q quit", style_muted()),
    ])
}

fn panel_title(dashboard: &Dashboard, kind: PanelKind) -> Line<'static> {
    let open = dashboard.panels().arrow_rotated(kind.arrow_id()) == Some(true);
    let arrow = if open { "▾" } else { "▸" };
    let key = match kind {
        PanelKind::Bitcoin => "1",
        PanelKind::Fulcrum => "2",
        PanelKind::Links => "3",
    };
    let mut spans = vec![
        Span::styled(format!("{arrow} "), style_key()),
        Span::styled(kind.title().to_string(), style_title()),
        Span::styled(format!(" [{key}]"), style_muted()),
    ];
    let summary = match kind {
        PanelKind::Bitcoin => Some((ids::BTC_STATUS, ids::BTC_DOT)),
        PanelKind::Fulcrum => Some((ids::FL_STATUS, ids::FL_DOT)),
        PanelKind::Links => None,
    };
    if let Some((status_id, dot_id)) = summary {
        let page = dashboard.page();
        if let Some(status) = page.text_of(status_id) {
            let tier = page.get(dot_id).and_then(|dot| dot.tier);
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                "●",
                Style::default().fg(tier_color(tier)).bg(THEME.panel),
            ));
            spans.push(Span::styled(format!(" {status}"), style_muted()));
        }
    }
    Line::from(spans)
}

fn draw_console(frame: &mut ratatui::Frame<'_>, area: Rect) {
    if area.height < 3 {
        return;
    }
    let visible = usize::from(area.height - 2);
    let lines: Vec<Line> = logging::console_snapshot(visible)
        .into_iter()
        .map(|entry| {
            Line::from(vec![
                Span::styled(
                    format!("{} ", logging::UtcTime::from_ms(entry.ts_ms).clock()),
                    style_muted(),
                ),
                Span::styled(format!("{:<5} ", entry.level.as_str()), level_style(entry.level)),
                Span::styled(entry.msg, style_panel()),
            ])
        })
        .collect();
    let widget = Paragraph::new(lines)
        .block(panel_block("Console"))
        .style(style_panel());
    frame.render_widget(widget, area);
}

fn draw_modal(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard) {
    let Some(source) = dashboard.modal().source() else {
        return;
    };
    let area = modal_area(frame.area());
    frame.render_widget(Clear, area);
    let block = panel_block("QR");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Data:", style_muted()),
            Span::raw(" "),
            Span::raw(shorten(source, usize::from(inner.width.saturating_sub(6)))),
        ]),
        Line::styled("Esc or click outside to close", style_muted()),
        Line::raw(""),
    ];
    let budget = usize::from(inner.height).saturating_sub(lines.len());
    let qr_lines = build_qr_lines(source, usize::from(inner.width), budget);
    if qr_lines.is_empty() {
        lines.push(Line::styled("Terminal too small for this QR.", style_warn()));
    } else {
        lines.extend(qr_lines);
    }
    frame.render_widget(Paragraph::new(lines).style(style_panel()), inner);
}

fn draw(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, info: &HeaderInfo) {
    frame.render_widget(Clear, frame.area());
    frame.render_widget(Block::default().style(style_base()), frame.area());

    let areas = layout_areas(dashboard, frame.area());
    frame.render_widget(
        Paragraph::new(header_line(dashboard, info)).style(style_panel()),
        areas.header,
    );

    for panel in &areas.panels {
        if panel.header.height > 0 {
            frame.render_widget(
                Paragraph::new(panel_title(dashboard, panel.kind)).style(style_panel()),
                panel.header,
            );
        }
        if panel.body.height == 0 {
            continue;
        }
        let lines: Vec<Line> = dashboard
            .panel_rows(panel.kind)
            .iter()
            .flat_map(|row| row_lines(dashboard, row, panel.body.width))
            .collect();
        frame.render_widget(Paragraph::new(lines).style(style_panel()), panel.body);
    }

    draw_console(frame, areas.console);

    if dashboard.page().is_blurred() {
        let area = frame.area();
        frame.buffer_mut().set_style(
            area,
            Style::default().fg(THEME.muted).add_modifier(Modifier::DIM),
        );
        draw_modal(frame, dashboard);
    }
}

/// Returns true when the user asked to quit.
fn handle_key<F: Fn()>(key: KeyEvent, dashboard: &mut Dashboard, poll_now: &F) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    if key.code == KeyCode::Esc {
        dashboard.close_modal();
        return false;
    }
    if key.code == KeyCode::Char('q') {
        return true;
    }
    if dashboard.modal().is_open() {
        return false;
    }
    match key.code {
        KeyCode::Char('1') => dashboard.toggle(PanelKind::Bitcoin),
        KeyCode::Char('2') => dashboard.toggle(PanelKind::Fulcrum),
        KeyCode::Char('3') => dashboard.toggle(PanelKind::Links),
        KeyCode::Up | KeyCode::Char('k') => dashboard.select_prev_link(),
        KeyCode::Down | KeyCode::Char('j') => dashboard.select_next_link(),
        KeyCode::Enter | KeyCode::Char('c') => {
            dashboard.copy_selected(Instant::now());
        }
        KeyCode::Char('z') => {
            dashboard.zoom_selected();
        }
        KeyCode::Char('r') => {
            log_info!("manual refresh");
            poll_now();
        }
        _ => {}
    }
    false
}

fn handle_mouse(event: MouseEvent, dashboard: &mut Dashboard, area: Rect) {
    if !matches!(event.kind, MouseEventKind::Down(MouseButton::Left)) {
        return;
    }
    let (column, row) = (event.column, event.row);
    if dashboard.modal().is_open() {
        let on_image = rect_contains(modal_area(area), column, row);
        dashboard.click_modal(on_image);
        return;
    }

    let areas = layout_areas(dashboard, area);
    for panel in &areas.panels {
        if rect_contains(panel.header, column, row) {
            dashboard.toggle(panel.kind);
            return;
        }
        if panel.kind != PanelKind::Links || !rect_contains(panel.body, column, row) {
            continue;
        }
        let mut top = panel.body.y;
        for link_row in dashboard.panel_rows(PanelKind::Links) {
            let height = dashboard.row_height(&link_row);
            if row < top.saturating_add(height) {
                let RowKind::Link { zoomable } = link_row.kind else {
                    return;
                };
                let text = dashboard.page().text_of(&link_row.id).unwrap_or_default();
                let span = label_cell(&link_row.label).chars().count() + text.chars().count();
                dashboard.select_link(&link_row.id);
                match link_hit(span, zoomable, column - panel.body.x, row - top, panel.body.width) {
                    LinkHit::Copy => {
                        dashboard.copy_element(&link_row.id, Instant::now());
                    }
                    LinkHit::Zoom => {
                        dashboard.zoom_element(&link_row.id);
                    }
                }
                return;
            }
            top = top.saturating_add(height);
        }
    }
}

/// Runs the dashboard until the user quits. Poll outcomes are drained from
/// `outcomes` every frame; `poll_now` issues an out-of-schedule poll.
pub fn run_tui<F: Fn()>(
    mut dashboard: Dashboard,
    info: HeaderInfo,
    outcomes: Receiver<PollOutcome>,
    poll_now: F,
) -> Result<(), String> {
    logging::enable_console(CONSOLE_CAPACITY);
    logging::set_stderr_enabled(false);
    let _guard = TerminalGuard::enter()?;
    let stdout = io::stdout();
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend).map_err(|err| err.to_string())?;
    terminal.clear().map_err(|err| err.to_string())?;

    let size = terminal.size().map_err(|err| err.to_string())?;
    dashboard.resize(size.width);
    let mut last_frame = Instant::now();

    loop {
        loop {
            match outcomes.try_recv() {
                Ok(outcome) => {
                    dashboard.apply(outcome);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        let now = Instant::now();
        dashboard.tick(now, now.saturating_duration_since(last_frame));
        last_frame = now;

        terminal
            .draw(|frame| draw(frame, &dashboard, &info))
            .map_err(|err| err.to_string())?;

        if event::poll(UI_TICK).map_err(|err| err.to_string())? {
            match event::read().map_err(|err| err.to_string())? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press && handle_key(key, &mut dashboard, &poll_now) {
                        break;
                    }
                }
                Event::Mouse(event) => {
                    let size = terminal.size().map_err(|err| err.to_string())?;
                    let area = Rect::new(0, 0, size.width, size.height);
                    handle_mouse(event, &mut dashboard, area);
                }
                Event::Resize(width, _) => {
                    terminal.clear().map_err(|err| err.to_string())?;
                    dashboard.resize(width);
                }
                _ => {}
            }
        }
    }

    terminal.show_cursor().map_err(|err| err.to_string())?;
    logging::set_stderr_enabled(true);
    Ok(())
}
