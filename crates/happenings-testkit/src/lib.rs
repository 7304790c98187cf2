// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use happenings_app::{
    CalendarEntryId, CalendarExporter, CalendarGate, CalendarId, CatalogSource, Category, Event,
    EventId, ExportFailure, ExportOutcome, ExportReceipt, FetchOutcome, Filter, IsoTimestamp,
    Permission,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, Time};

const EVENT_NAMES: [(&str, &[&str]); 4] = [
    (
        "Food",
        &[
            "Taco Crawl",
            "Farmers Market Brunch",
            "Ramen Pop-up",
            "Chili Cook-off",
            "Bake Sale",
            "Wine Tasting",
        ],
    ),
    (
        "Music",
        &[
            "Open Mic Night",
            "Symphony in the Park",
            "Vinyl Swap",
            "Indie Showcase",
            "Drum Circle",
        ],
    ),
    (
        "Sports",
        &[
            "Pickup Basketball",
            "Charity 10K",
            "Beach Volleyball",
            "Climbing Meetup",
            "Soccer Scrimmage",
        ],
    ),
    (
        "Gaming",
        &[
            "Board Game Social",
            "Speedrun Marathon",
            "Chess Blitz",
            "Tabletop RPG One-shot",
            "Fighting Game Locals",
        ],
    ),
];

const HOSTS: [&str; 10] = [
    "Avery Walker",
    "Jordan Hill",
    "Riley Lopez",
    "Morgan Gray",
    "Casey Reed",
    "Quinn Turner",
    "Parker Flores",
    "Drew Bennett",
    "Rowan Brooks",
    "Hayden Price",
];

const VENUES: [&str; 10] = [
    "Central Library",
    "Riverside Park",
    "Union Hall",
    "The Warehouse",
    "Maple Street Commons",
    "Eastside Rec Center",
    "Harbor Pavilion",
    "Old Mill Taproom",
    "Lakeview Amphitheater",
    "Northgate Plaza",
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of catalog rows. The same seed always yields the same sequence.
#[derive(Debug, Clone)]
pub struct EventFaker {
    rng: DeterministicRng,
    issued: usize,
}

impl EventFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            issued: 0,
        }
    }

    pub fn event(&mut self) -> Event {
        let (category, _) = EVENT_NAMES[self.rng.int_n(EVENT_NAMES.len())];
        self.event_in(Category::parse(category))
    }

    /// Unknown categories get a generic name.
    pub fn event_in(&mut self, category: Category) -> Event {
        self.issued += 1;
        let name = EVENT_NAMES
            .iter()
            .find(|(tag, _)| *tag == category.as_str())
            .map(|(_, names)| names[self.rng.int_n(names.len())].to_owned())
            .unwrap_or_else(|| format!("{} Meetup", category.as_str()));

        let start = self.start_time();
        let hours = 1 + self.rng.int_n(5) as i64;
        let end = start + Duration::hours(hours);

        Event {
            id: EventId::new(format!("evt-{:04}", self.issued)),
            name,
            category,
            image: format!("https://images.example.com/events/{}.jpg", self.issued),
            host: HOSTS[self.rng.int_n(HOSTS.len())].to_owned(),
            start_date: rfc3339(start),
            end_date: rfc3339(end),
            location: VENUES[self.rng.int_n(VENUES.len())].to_owned(),
        }
    }

    fn start_time(&mut self) -> OffsetDateTime {
        let day = self.rng.int_n(365) as i64;
        let hour = 8 + self.rng.int_n(13) as i64;
        let quarter = self.rng.int_n(4) as i64 * 15;
        reference_start() + Duration::days(day) + Duration::hours(hour) + Duration::minutes(quarter)
    }
}

pub fn sample_events(seed: u64, count: usize) -> Vec<Event> {
    let mut faker = EventFaker::new(seed);
    (0..count).map(|_| faker.event()).collect()
}

/// Rows exactly as the remote store returns them.
pub fn events_json(events: &[Event]) -> String {
    serde_json::to_string(events).expect("events serialize")
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("calendar.db");
    Ok((dir, db_path))
}

/// Catalog double that answers from a fixed row set, or from queued outcomes when scripted.
#[derive(Debug, Default)]
pub struct ScriptedCatalog {
    rows: Vec<Event>,
    script: Mutex<VecDeque<FetchOutcome>>,
    queries: Mutex<Vec<Filter>>,
}

impl ScriptedCatalog {
    pub fn with_rows(rows: Vec<Event>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Queued outcomes are returned in order before falling back to the row set.
    pub fn then(self, outcome: FetchOutcome) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(outcome);
        self
    }

    pub fn queries(&self) -> Vec<Filter> {
        self.queries.lock().expect("queries lock").clone()
    }
}

impl CatalogSource for ScriptedCatalog {
    fn fetch(&self, filter: Filter) -> FetchOutcome {
        self.queries.lock().expect("queries lock").push(filter);
        if let Some(outcome) = self.script.lock().expect("script lock").pop_front() {
            return outcome;
        }
        Ok(self
            .rows
            .iter()
            .filter(|event| filter.category().is_none_or(|c| event.category == c))
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
pub struct StaticGate {
    permission: Permission,
    checks: AtomicUsize,
}

impl StaticGate {
    pub fn granted() -> Self {
        Self::new(Permission::Granted)
    }

    pub fn denied() -> Self {
        Self::new(Permission::Denied)
    }

    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl CalendarGate for StaticGate {
    fn ensure_authorized(&self) -> Permission {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.permission
    }
}

/// Exporter double that records every call and mints a fresh calendar per export.
#[derive(Debug, Default)]
pub struct ScriptedExporter {
    failure: Option<ExportFailure>,
    calls: Mutex<Vec<EventId>>,
}

impl ScriptedExporter {
    pub fn failing(failure: ExportFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EventId> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CalendarExporter for ScriptedExporter {
    fn export(&self, event: &Event) -> ExportOutcome {
        let mut calls = self.calls.lock().expect("calls lock");
        calls.push(event.id.clone());
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(ExportReceipt {
            event_id: event.id.clone(),
            calendar_id: CalendarId::new(format!("cal-{}", calls.len())),
            entry_id: CalendarEntryId::new(format!("entry-{}", calls.len())),
        })
    }
}

fn rfc3339(value: OffsetDateTime) -> IsoTimestamp {
    IsoTimestamp::new(value.format(&Rfc3339).expect("RFC 3339 formats"))
}

fn reference_start() -> OffsetDateTime {
    let date = Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1).expect("valid date");
    date.with_time(Time::MIDNIGHT).assume_utc()
}
