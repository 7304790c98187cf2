// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use happenings_app::{
    Alert, CatalogCommand, CatalogEvent, CatalogState, Event, ExportOutcome, FetchOutcome,
    FetchTicket, Filter, LOADING_LABEL, Permission, QueryFailure,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use time::macros::format_description;

const CARD_HEIGHT: u16 = 6;
const TITLE: &str = "happenings";

/// The collaborators the terminal loop drives. `spawn_fetch` runs inline by default;
/// implementations that own a thread pool override it and report back over `tx`.
pub trait CatalogRuntime {
    fn check_permission(&mut self) -> Permission;
    fn fetch(&mut self, filter: Filter) -> FetchOutcome;
    fn export(&mut self, event: &Event) -> ExportOutcome;
    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = self.fetch(ticket.filter);
        tx.send(InternalEvent::FetchFinished { ticket, outcome })
            .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    FetchFinished {
        ticket: FetchTicket,
        outcome: FetchOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ViewData {
    cursor: usize,
}

pub fn run_app<R: CatalogRuntime>(state: &mut CatalogState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    mount(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(TermEvent::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn mount<R: CatalogRuntime>(
    state: &mut CatalogState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let permission = runtime.check_permission();
    state.dispatch(CatalogCommand::PermissionResolved(permission));
    dispatch(state, runtime, view_data, internal_tx, CatalogCommand::Mount);
}

/// Applies a command and starts any fetch it requests.
fn dispatch<R: CatalogRuntime>(
    state: &mut CatalogState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: CatalogCommand,
) {
    let events = state.dispatch(command);
    apply_view_events(state, view_data, &events);

    for event in events {
        let CatalogEvent::FetchRequested(ticket) = event else {
            continue;
        };
        if let Err(error) = runtime.spawn_fetch(ticket, internal_tx.clone()) {
            let outcome = Err(QueryFailure::new(format!("{error:#}")));
            let events = state.dispatch(CatalogCommand::FetchFinished { ticket, outcome });
            apply_view_events(state, view_data, &events);
        }
    }
}

fn process_internal_events(
    state: &mut CatalogState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::FetchFinished { ticket, outcome } => {
                let events = state.dispatch(CatalogCommand::FetchFinished { ticket, outcome });
                apply_view_events(state, view_data, &events);
            }
        }
    }
}

fn apply_view_events(state: &CatalogState, view_data: &mut ViewData, events: &[CatalogEvent]) {
    for event in events {
        match event {
            CatalogEvent::EventsReplaced { .. } | CatalogEvent::FilterChanged(_) => {
                view_data.cursor = 0;
            }
            _ => {}
        }
    }
    view_data.cursor = view_data.cursor.min(state.events.len().saturating_sub(1));
}

fn handle_key_event<R: CatalogRuntime>(
    state: &mut CatalogState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    if key.code == KeyCode::Char('q') {
        return true;
    }

    if state.current_alert().is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            state.dispatch(CatalogCommand::DismissAlert);
        }
        return false;
    }

    match key.code {
        KeyCode::Char('h') | KeyCode::Left => {
            let filter = state.filter.rotate(-1);
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                CatalogCommand::SelectFilter(filter),
            );
        }
        KeyCode::Char('l') | KeyCode::Right => {
            let filter = state.filter.rotate(1);
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                CatalogCommand::SelectFilter(filter),
            );
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if view_data.cursor + 1 < state.events.len() {
                view_data.cursor += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.cursor = view_data.cursor.saturating_sub(1);
        }
        KeyCode::Char('r') => {
            if let Some(event) = state.events.get(view_data.cursor) {
                let event_id = event.id.clone();
                state.dispatch(CatalogCommand::ToggleRsvp(event_id));
            }
        }
        KeyCode::Char('c') => {
            let Some(event_id) = state.events.get(view_data.cursor).map(|e| e.id.clone()) else {
                return false;
            };
            let Some(event) = state.export_target(&event_id).cloned() else {
                return false;
            };
            let outcome = runtime.export(&event);
            state.dispatch(CatalogCommand::ExportFinished { event_id, outcome });
        }
        _ => {}
    }
    false
}

fn render(frame: &mut ratatui::Frame<'_>, state: &CatalogState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = Filter::ALL
        .iter()
        .position(|filter| *filter == state.filter)
        .unwrap_or(0);
    let titles = Filter::ALL
        .iter()
        .map(|filter| {
            Line::from(Span::styled(
                filter_title(*filter),
                Style::default().fg(hex_color(filter.color_hex())),
            ))
        })
        .collect::<Vec<Line<'static>>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title(TITLE).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED))
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    render_cards(frame, layout[1], state, view_data);

    let status = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[2]);

    if let Some(alert) = state.current_alert() {
        let area = centered_rect(60, 30, frame.area());
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(alert_text(alert))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(alert.title())
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(popup, area);
    }
}

fn render_cards(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &CatalogState,
    view_data: &ViewData,
) {
    let block = Block::default().borders(Borders::ALL);

    if state.is_loading() {
        let loading = Paragraph::new(LOADING_LABEL)
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(loading, area);
        return;
    }

    if state.events.is_empty() {
        let empty = Paragraph::new("no events")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let mut lines: Vec<Line<'static>> = Vec::new();
    for (index, event) in state.events.iter().enumerate() {
        let accent = hex_color(event.category.color_hex());
        let marker = if index == view_data.cursor { "▌ " } else { "  " };
        for (row, text) in card_text(state, event).into_iter().enumerate() {
            let style = match row {
                0 => Style::default().fg(accent).add_modifier(Modifier::BOLD),
                4 => Style::default().fg(Color::Cyan),
                _ => Style::default(),
            };
            lines.push(Line::from(vec![
                Span::styled(marker, Style::default().fg(accent)),
                Span::styled(text, style),
            ]));
        }
        lines.push(Line::default());
    }

    let visible = area.height.saturating_sub(2);
    let offset = scroll_offset(view_data.cursor, visible);
    let cards = Paragraph::new(lines).scroll((offset, 0)).block(block);
    frame.render_widget(cards, area);
}

fn scroll_offset(cursor: usize, visible: u16) -> u16 {
    let cursor = u16::try_from(cursor).unwrap_or(u16::MAX);
    let bottom = cursor.saturating_add(1).saturating_mul(CARD_HEIGHT);
    bottom.saturating_sub(visible)
}

fn filter_title(filter: Filter) -> String {
    format!("{} {}", filter.glyph(), filter.label())
}

fn card_text(state: &CatalogState, event: &Event) -> Vec<String> {
    vec![
        format!("{} {}", event.category.glyph(), event.name),
        format!("hosted by {}", event.host),
        format!("{} · {}", event.category.as_str(), event.location),
        format!(
            "{} to {}",
            display_time(&event.start_date),
            display_time(&event.end_date)
        ),
        format!(
            "[{}]  [{}]",
            state.rsvp_label(&event.id),
            state.calendar_label(&event.id)
        ),
    ]
}

fn display_time(raw: &happenings_app::IsoTimestamp) -> String {
    raw.to_utc()
        .ok()
        .and_then(|instant| {
            instant
                .format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute] UTC"
                ))
                .ok()
        })
        .unwrap_or_else(|| raw.as_str().to_owned())
}

fn alert_text(alert: &Alert) -> String {
    let body = alert.body();
    if body.is_empty() {
        "press enter to dismiss".to_owned()
    } else {
        format!("{body}\n\npress enter to dismiss")
    }
}

fn status_text(state: &CatalogState) -> String {
    let mut status = format!(
        "{} events · h/l filter · j/k move · r rsvp · c save · q quit",
        state.events.len()
    );
    let pending = state.pending_alerts();
    if pending > 1 {
        status.push_str(&format!(" · {} alerts", pending));
    }
    status
}

fn hex_color(hex: &str) -> Color {
    hex.parse::<Color>().unwrap_or(Color::White)
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        CatalogRuntime, InternalEvent, ViewData, alert_text, card_text, filter_title,
        handle_key_event, hex_color, mount, process_internal_events, scroll_offset, status_text,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use happenings_app::{
        Alert, CalendarEntryId, CalendarId, CatalogState, Category, Event, EventId,
        ExportFailure, ExportOutcome, ExportReceipt, ExportStage, FetchOutcome, FetchTicket,
        Filter, IsoTimestamp, Permission, QueryFailure,
    };
    use ratatui::style::Color;
    use std::sync::mpsc::{self, Receiver, Sender};

    fn event(id: &str, category: Category) -> Event {
        Event {
            id: EventId::from(id),
            name: format!("event {id}"),
            category,
            image: String::new(),
            host: "Sam".to_owned(),
            start_date: IsoTimestamp::from("2026-04-03T17:00:00Z"),
            end_date: IsoTimestamp::from("2026-04-03T19:30:00Z"),
            location: "Hall".to_owned(),
        }
    }

    #[derive(Debug)]
    struct TestRuntime {
        permission: Permission,
        rows: Vec<Event>,
        fail_fetch: bool,
        deferred: bool,
        pending: Vec<(FetchTicket, Sender<InternalEvent>)>,
        fetches: Vec<Filter>,
        export_failure: Option<String>,
        exports: Vec<EventId>,
    }

    impl Default for TestRuntime {
        fn default() -> Self {
            Self {
                permission: Permission::Granted,
                rows: vec![
                    event("e1", Category::Food),
                    event("e2", Category::Music),
                    event("e3", Category::Food),
                ],
                fail_fetch: false,
                deferred: false,
                pending: Vec::new(),
                fetches: Vec::new(),
                export_failure: None,
                exports: Vec::new(),
            }
        }
    }

    impl TestRuntime {
        /// Completes a deferred fetch, in whatever order the test chooses.
        fn complete(&mut self, index: usize) {
            let (ticket, tx) = self.pending.remove(index);
            let outcome = self.fetch(ticket.filter);
            tx.send(InternalEvent::FetchFinished { ticket, outcome })
                .expect("channel open");
        }
    }

    impl CatalogRuntime for TestRuntime {
        fn check_permission(&mut self) -> Permission {
            self.permission
        }

        fn fetch(&mut self, filter: Filter) -> FetchOutcome {
            self.fetches.push(filter);
            if self.fail_fetch {
                return Err(QueryFailure::new("offline"));
            }
            Ok(self
                .rows
                .iter()
                .filter(|event| filter.category().is_none_or(|c| event.category == c))
                .cloned()
                .collect())
        }

        fn export(&mut self, event: &Event) -> ExportOutcome {
            self.exports.push(event.id.clone());
            if let Some(message) = &self.export_failure {
                return Err(ExportFailure::new(ExportStage::CreateCalendar, message.clone()));
            }
            Ok(ExportReceipt {
                event_id: event.id.clone(),
                calendar_id: CalendarId::new(format!("cal-{}", self.exports.len())),
                entry_id: CalendarEntryId::from("1"),
            })
        }

        fn spawn_fetch(
            &mut self,
            ticket: FetchTicket,
            tx: Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            if self.deferred {
                self.pending.push((ticket, tx));
                return Ok(());
            }
            let outcome = self.fetch(ticket.filter);
            tx.send(InternalEvent::FetchFinished { ticket, outcome })
                .map_err(|_| anyhow::anyhow!("fetch event channel closed"))
        }
    }

    struct Harness {
        state: CatalogState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn mounted(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: CatalogState::default(),
                runtime,
                view_data: ViewData::default(),
                tx,
                rx,
            };
            mount(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
            );
            harness.drain();
            harness
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            );
            self.drain();
            quit
        }

        fn drain(&mut self) {
            process_internal_events(&mut self.state, &mut self.view_data, &self.rx);
        }
    }

    #[test]
    fn mount_loads_all_events() {
        let harness = Harness::mounted(TestRuntime::default());
        assert_eq!(harness.runtime.fetches, vec![Filter::All]);
        assert_eq!(harness.state.events.len(), 3);
        assert!(!harness.state.is_loading());
    }

    #[test]
    fn right_arrow_moves_to_next_filter_and_refetches() {
        let mut harness = Harness::mounted(TestRuntime::default());
        harness.press(KeyCode::Right);
        assert_eq!(harness.state.filter, Filter::Food);
        assert_eq!(harness.runtime.fetches, vec![Filter::All, Filter::Food]);
        assert_eq!(harness.state.events.len(), 2);

        harness.press(KeyCode::Char('h'));
        assert_eq!(harness.state.filter, Filter::All);
    }

    #[test]
    fn left_from_all_wraps_to_last_filter() {
        let mut harness = Harness::mounted(TestRuntime::default());
        harness.press(KeyCode::Left);
        assert_eq!(harness.state.filter, Filter::Gaming);
        assert!(harness.state.events.is_empty());
    }

    #[test]
    fn stale_fetch_does_not_overwrite_newer_filter() {
        let mut harness = Harness::mounted(TestRuntime::default());
        harness.runtime.deferred = true;

        harness.press(KeyCode::Char('l'));
        harness.press(KeyCode::Char('l'));
        assert!(harness.state.is_loading());
        assert_eq!(harness.state.filter, Filter::Music);

        // Music resolves first, then the older Food fetch arrives.
        harness.runtime.complete(1);
        harness.drain();
        assert!(!harness.state.is_loading());
        assert_eq!(harness.state.events.len(), 1);

        harness.runtime.complete(0);
        harness.drain();
        assert_eq!(harness.state.events.len(), 1);
        assert!(
            harness
                .state
                .events
                .iter()
                .all(|event| event.category == Category::Music)
        );
    }

    #[test]
    fn failed_fetch_shows_no_cards_and_no_alert() {
        let harness = Harness::mounted(TestRuntime {
            fail_fetch: true,
            ..TestRuntime::default()
        });
        assert!(harness.state.events.is_empty());
        assert!(!harness.state.is_loading());
        assert!(harness.state.current_alert().is_none());
    }

    #[test]
    fn cursor_stays_within_cards() {
        let mut harness = Harness::mounted(TestRuntime::default());
        for _ in 0..5 {
            harness.press(KeyCode::Char('j'));
        }
        assert_eq!(harness.view_data.cursor, 2);
        harness.press(KeyCode::Up);
        assert_eq!(harness.view_data.cursor, 1);

        harness.press(KeyCode::Right);
        assert_eq!(harness.view_data.cursor, 0, "new list resets the cursor");
    }

    #[test]
    fn rsvp_toggles_selected_card_label() {
        let mut harness = Harness::mounted(TestRuntime::default());
        let id = EventId::from("e1");
        harness.press(KeyCode::Char('r'));
        let lines = card_text(&harness.state, &harness.state.events[0]);
        assert_eq!(lines[4], "[RSVP'D]  [Save to Calendar]");
        harness.press(KeyCode::Char('r'));
        assert_eq!(harness.state.rsvp_label(&id), "RSVP");
        assert!(harness.runtime.exports.is_empty());
    }

    #[test]
    fn export_marks_selected_card_saved() {
        let mut harness = Harness::mounted(TestRuntime::default());
        harness.press(KeyCode::Down);
        harness.press(KeyCode::Char('c'));
        assert_eq!(harness.runtime.exports, vec![EventId::from("e2")]);
        assert_eq!(
            harness.state.calendar_label(&EventId::from("e2")),
            "Saved to Calendar"
        );
        assert!(!harness.state.is_saved(&EventId::from("e1")));
    }

    #[test]
    fn export_failure_opens_modal_that_blocks_other_keys() {
        let mut harness = Harness::mounted(TestRuntime {
            export_failure: Some("Source not found".to_owned()),
            ..TestRuntime::default()
        });
        harness.press(KeyCode::Char('c'));
        assert_eq!(
            harness.state.current_alert(),
            Some(&Alert::ExportFailed {
                message: "Source not found".to_owned()
            })
        );

        harness.press(KeyCode::Right);
        assert_eq!(harness.state.filter, Filter::All, "filter keys are ignored");

        harness.press(KeyCode::Enter);
        assert!(harness.state.current_alert().is_none());
        assert!(!harness.state.is_saved(&EventId::from("e1")));
    }

    #[test]
    fn denied_permission_raises_alert_on_mount() {
        let mut harness = Harness::mounted(TestRuntime {
            permission: Permission::Denied,
            ..TestRuntime::default()
        });
        assert_eq!(
            harness.state.current_alert(),
            Some(&Alert::CalendarPermissionDenied)
        );
        assert_eq!(harness.state.events.len(), 3);
        harness.press(KeyCode::Esc);
        assert!(harness.state.current_alert().is_none());
    }

    #[test]
    fn quit_keys_work_even_with_alert_open() {
        let mut harness = Harness::mounted(TestRuntime {
            permission: Permission::Denied,
            ..TestRuntime::default()
        });
        assert!(harness.press(KeyCode::Char('q')));
        assert!(harness.press_with(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(harness.runtime.exports.is_empty());
    }

    #[test]
    fn card_text_shows_host_and_utc_times() {
        let state = CatalogState::default();
        let mut entry = event("x", Category::parse("Crafts"));
        entry.end_date = IsoTimestamp::from("whenever");
        let lines = card_text(&state, &entry);
        assert_eq!(lines[0], "★ event x");
        assert_eq!(lines[1], "hosted by Sam");
        assert_eq!(lines[2], "Crafts · Hall");
        assert_eq!(lines[3], "2026-04-03 17:00 UTC to whenever");
        assert_eq!(lines[4], "[RSVP]  [Save to Calendar]");
    }

    #[test]
    fn filter_titles_carry_glyphs() {
        assert_eq!(filter_title(Filter::Food), "♨ Food");
        assert_eq!(hex_color(Filter::All.color_hex()), Color::Rgb(0x0B, 0x1D, 0x51));
        assert_eq!(hex_color("not a colour"), Color::White);
    }

    #[test]
    fn alert_text_includes_message() {
        let text = alert_text(&Alert::ExportFailed {
            message: "disk full".to_owned(),
        });
        assert!(text.starts_with("disk full"));
        assert_eq!(
            alert_text(&Alert::CalendarPermissionDenied),
            "press enter to dismiss"
        );
    }

    #[test]
    fn status_text_counts_events() {
        let harness = Harness::mounted(TestRuntime::default());
        assert!(status_text(&harness.state).starts_with("3 events"));
    }

    #[test]
    fn scroll_keeps_selected_card_visible() {
        assert_eq!(scroll_offset(0, 20), 0);
        assert_eq!(scroll_offset(3, 20), 4);
    }
}
