// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use happenings_app::{
    CatalogSource, Category, Event, EventId, FetchOutcome, Filter, IsoTimestamp,
};
use std::thread;
use std::time::Duration;
use tracing::debug;

const DEMO_ROWS: &[(&str, &str, &str, &str, &str, &str, &str)] = &[
    (
        "demo-1",
        "Night Market Street Food",
        "Food",
        "Harbor Food Collective",
        "2026-11-06T18:00:00Z",
        "2026-11-06T23:00:00Z",
        "Pier 7 Plaza",
    ),
    (
        "demo-2",
        "Jazz on the Roof",
        "Music",
        "Blue Note Society",
        "2026-11-08T20:00:00Z",
        "2026-11-08T23:30:00Z",
        "Rooftop at the Granary",
    ),
    (
        "demo-3",
        "5K Fun Run",
        "Sports",
        "Riverside Runners",
        "2026-11-09T08:00:00Z",
        "2026-11-09T10:00:00Z",
        "Riverside Park North Gate",
    ),
    (
        "demo-4",
        "Retro LAN Party",
        "Gaming",
        "Pixel Guild",
        "2026-11-14T12:00:00Z",
        "2026-11-15T02:00:00Z",
        "Community Center Hall B",
    ),
    (
        "demo-5",
        "Dumpling Workshop",
        "Food",
        "Chef Lin",
        "2026-11-15T14:00:00Z",
        "2026-11-15T16:30:00Z",
        "Eastside Test Kitchen",
    ),
    (
        "demo-6",
        "Open Mic Poetry",
        "Spoken Word",
        "Verse & Co",
        "2026-11-18T19:00:00Z",
        "2026-11-18T21:00:00Z",
        "The Reading Room",
    ),
];

/// In-process catalog with a fixed set of events, used by `--demo` and when no
/// remote store is configured.
#[derive(Debug, Clone)]
pub struct DemoCatalog {
    events: Vec<Event>,
    latency: Duration,
}

impl Default for DemoCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoCatalog {
    pub fn new() -> Self {
        Self::from_events(demo_events())
    }

    pub fn from_events(events: Vec<Event>) -> Self {
        Self {
            events,
            latency: Duration::ZERO,
        }
    }

    /// Sleeps before every fetch so the loading indicator is visible.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl CatalogSource for DemoCatalog {
    fn fetch(&self, filter: Filter) -> FetchOutcome {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let rows: Vec<Event> = match filter.category() {
            None => self.events.clone(),
            Some(category) => self
                .events
                .iter()
                .filter(|event| event.category == category)
                .cloned()
                .collect(),
        };
        debug!(filter = filter.label(), count = rows.len(), "demo catalog fetch");
        Ok(rows)
    }
}

fn demo_events() -> Vec<Event> {
    DEMO_ROWS
        .iter()
        .map(|&(id, name, category, host, start, end, location)| Event {
            id: EventId::from(id),
            name: name.to_owned(),
            category: Category::parse(category),
            image: format!("https://images.example.com/events/{id}.jpg"),
            host: host.to_owned(),
            start_date: IsoTimestamp::from(start),
            end_date: IsoTimestamp::from(end),
            location: location.to_owned(),
        })
        .collect()
}
