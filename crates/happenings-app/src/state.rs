// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

use crate::ids::{EventId, FetchGeneration};
use crate::model::{Event, Filter};
use crate::services::{ExportOutcome, FetchOutcome, Permission};

pub const RSVP_LABEL: &str = "RSVP";
pub const RSVP_DONE_LABEL: &str = "RSVP'D";
pub const SAVE_LABEL: &str = "Save to Calendar";
pub const SAVED_LABEL: &str = "Saved to Calendar";
pub const LOADING_LABEL: &str = "Loading...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    LoadedWithError,
}

/// Identifies one fetch. Only the ticket matching the in-flight generation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: FetchGeneration,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    CalendarPermissionDenied,
    ExportFailed { message: String },
}

impl Alert {
    pub const fn title(&self) -> &'static str {
        match self {
            Self::CalendarPermissionDenied => "Permission to access calendar denied",
            Self::ExportFailed { .. } => "Error saving to calendar",
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::CalendarPermissionDenied => "",
            Self::ExportFailed { message } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCommand {
    Mount,
    SelectFilter(Filter),
    FetchFinished {
        ticket: FetchTicket,
        outcome: FetchOutcome,
    },
    ToggleRsvp(EventId),
    ExportFinished {
        event_id: EventId,
        outcome: ExportOutcome,
    },
    PermissionResolved(Permission),
    DismissAlert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    FilterChanged(Filter),
    FetchRequested(FetchTicket),
    LoadingChanged(bool),
    EventsReplaced {
        generation: FetchGeneration,
        count: usize,
    },
    FetchFailed {
        generation: FetchGeneration,
        message: String,
    },
    StaleFetchDiscarded {
        generation: FetchGeneration,
    },
    RsvpChanged {
        event_id: EventId,
        attending: bool,
    },
    CalendarSaved(EventId),
    AlertRaised(Alert),
    AlertDismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogState {
    pub filter: Filter,
    pub events: Vec<Event>,
    phase: LoadPhase,
    pub permission: Option<Permission>,
    rsvp: BTreeMap<EventId, bool>,
    calendar_saved: BTreeMap<EventId, bool>,
    latest: FetchGeneration,
    in_flight: Option<FetchGeneration>,
    alerts: VecDeque<Alert>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            filter: Filter::All,
            events: Vec::new(),
            phase: LoadPhase::Idle,
            permission: None,
            rsvp: BTreeMap::new(),
            calendar_saved: BTreeMap::new(),
            latest: FetchGeneration::default(),
            in_flight: None,
            alerts: VecDeque::new(),
        }
    }
}

impl CatalogState {
    /// A fresh, unmounted state whose first fetch will use `filter`.
    pub fn with_filter(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn dispatch(&mut self, command: CatalogCommand) -> Vec<CatalogEvent> {
        match command {
            CatalogCommand::Mount => {
                if self.phase != LoadPhase::Idle {
                    return Vec::new();
                }
                self.begin_fetch()
            }
            CatalogCommand::SelectFilter(filter) => {
                if filter == self.filter {
                    return Vec::new();
                }
                self.filter = filter;
                let mut events = vec![CatalogEvent::FilterChanged(filter)];
                events.extend(self.begin_fetch());
                events
            }
            CatalogCommand::FetchFinished { ticket, outcome } => self.finish_fetch(ticket, outcome),
            CatalogCommand::ToggleRsvp(event_id) => {
                let attending = !self.is_attending(&event_id);
                self.rsvp.insert(event_id.clone(), attending);
                vec![CatalogEvent::RsvpChanged {
                    event_id,
                    attending,
                }]
            }
            CatalogCommand::ExportFinished { event_id, outcome } => match outcome {
                Ok(receipt) => {
                    info!(
                        event = %event_id,
                        calendar = %receipt.calendar_id,
                        entry = %receipt.entry_id,
                        "event saved to calendar"
                    );
                    self.calendar_saved.insert(event_id.clone(), true);
                    vec![CatalogEvent::CalendarSaved(event_id)]
                }
                Err(failure) => {
                    warn!(
                        event = %event_id,
                        stage = failure.stage.as_str(),
                        "calendar export failed: {failure}"
                    );
                    vec![self.raise(Alert::ExportFailed {
                        message: failure.message,
                    })]
                }
            },
            CatalogCommand::PermissionResolved(permission) => {
                self.permission = Some(permission);
                match permission {
                    Permission::Granted => Vec::new(),
                    Permission::Denied => {
                        warn!("calendar permission denied");
                        vec![self.raise(Alert::CalendarPermissionDenied)]
                    }
                }
            }
            CatalogCommand::DismissAlert => match self.alerts.pop_front() {
                Some(_) => vec![CatalogEvent::AlertDismissed],
                None => Vec::new(),
            },
        }
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn is_attending(&self, event_id: &EventId) -> bool {
        self.rsvp.get(event_id).copied().unwrap_or(false)
    }

    pub fn is_saved(&self, event_id: &EventId) -> bool {
        self.calendar_saved.get(event_id).copied().unwrap_or(false)
    }

    pub fn rsvp_label(&self, event_id: &EventId) -> &'static str {
        if self.is_attending(event_id) {
            RSVP_DONE_LABEL
        } else {
            RSVP_LABEL
        }
    }

    pub fn calendar_label(&self, event_id: &EventId) -> &'static str {
        if self.is_saved(event_id) {
            SAVED_LABEL
        } else {
            SAVE_LABEL
        }
    }

    pub fn current_alert(&self) -> Option<&Alert> {
        self.alerts.front()
    }

    pub fn pending_alerts(&self) -> usize {
        self.alerts.len()
    }

    pub fn latest_generation(&self) -> FetchGeneration {
        self.latest
    }

    /// Looks up an event in the current snapshot for export.
    pub fn export_target(&self, event_id: &EventId) -> Option<&Event> {
        let found = self.events.iter().find(|event| &event.id == event_id);
        if found.is_none() {
            warn!(event = %event_id, "export requested for an event not in the current list");
        }
        found
    }

    fn begin_fetch(&mut self) -> Vec<CatalogEvent> {
        let was_loading = self.is_loading();
        self.latest = self.latest.next();
        self.in_flight = Some(self.latest);
        self.phase = LoadPhase::Loading;

        let ticket = FetchTicket {
            generation: self.latest,
            filter: self.filter,
        };
        debug!(
            generation = ticket.generation.get(),
            filter = ticket.filter.label(),
            "catalog fetch started"
        );

        let mut events = Vec::with_capacity(2);
        if !was_loading {
            events.push(CatalogEvent::LoadingChanged(true));
        }
        events.push(CatalogEvent::FetchRequested(ticket));
        events
    }

    fn finish_fetch(&mut self, ticket: FetchTicket, outcome: FetchOutcome) -> Vec<CatalogEvent> {
        if self.in_flight != Some(ticket.generation) {
            debug!(
                generation = ticket.generation.get(),
                latest = self.latest.get(),
                filter = ticket.filter.label(),
                "discarding stale catalog result"
            );
            return vec![CatalogEvent::StaleFetchDiscarded {
                generation: ticket.generation,
            }];
        }
        self.in_flight = None;

        let applied = match outcome {
            Ok(events) => {
                info!(
                    generation = ticket.generation.get(),
                    filter = ticket.filter.label(),
                    count = events.len(),
                    "catalog loaded"
                );
                let count = events.len();
                self.events = events;
                self.phase = LoadPhase::Loaded;
                CatalogEvent::EventsReplaced {
                    generation: ticket.generation,
                    count,
                }
            }
            Err(failure) => {
                warn!(
                    generation = ticket.generation.get(),
                    filter = ticket.filter.label(),
                    "{failure}; showing an empty catalog"
                );
                self.events = Vec::new();
                self.phase = LoadPhase::LoadedWithError;
                CatalogEvent::FetchFailed {
                    generation: ticket.generation,
                    message: failure.message,
                }
            }
        };
        vec![applied, CatalogEvent::LoadingChanged(false)]
    }

    fn raise(&mut self, alert: Alert) -> CatalogEvent {
        self.alerts.push_back(alert.clone());
        CatalogEvent::AlertRaised(alert)
    }
}
