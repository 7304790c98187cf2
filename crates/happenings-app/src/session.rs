// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::EventId;
use crate::model::Filter;
use crate::services::{CalendarExporter, CalendarGate, CatalogSource};
use crate::state::{CatalogCommand, CatalogEvent, CatalogState, FetchTicket};

/// Drives a [`CatalogState`] against its collaborators, running each call to completion.
pub struct CatalogSession<S, G, E> {
    state: CatalogState,
    catalog: S,
    gate: G,
    exporter: E,
}

impl<S, G, E> CatalogSession<S, G, E>
where
    S: CatalogSource,
    G: CalendarGate,
    E: CalendarExporter,
{
    pub fn new(catalog: S, gate: G, exporter: E) -> Self {
        Self {
            state: CatalogState::default(),
            catalog,
            gate,
            exporter,
        }
    }

    pub fn state(&self) -> &CatalogState {
        &self.state
    }

    /// Checks calendar authorization once, then loads the catalog for the current filter.
    pub fn mount(&mut self) -> Vec<CatalogEvent> {
        let permission = self.gate.ensure_authorized();
        let mut events = self
            .state
            .dispatch(CatalogCommand::PermissionResolved(permission));
        let requested = self.state.dispatch(CatalogCommand::Mount);
        events.extend(self.run_fetches(requested));
        events
    }

    pub fn select_filter(&mut self, filter: Filter) -> Vec<CatalogEvent> {
        let requested = self.state.dispatch(CatalogCommand::SelectFilter(filter));
        self.run_fetches(requested)
    }

    pub fn toggle_rsvp(&mut self, event_id: &EventId) -> Vec<CatalogEvent> {
        self.state
            .dispatch(CatalogCommand::ToggleRsvp(event_id.clone()))
    }

    pub fn export(&mut self, event_id: &EventId) -> Vec<CatalogEvent> {
        let Some(event) = self.state.export_target(event_id).cloned() else {
            return Vec::new();
        };
        let outcome = self.exporter.export(&event);
        self.state.dispatch(CatalogCommand::ExportFinished {
            event_id: event.id,
            outcome,
        })
    }

    pub fn dismiss_alert(&mut self) -> Vec<CatalogEvent> {
        self.state.dispatch(CatalogCommand::DismissAlert)
    }

    fn run_fetches(&mut self, mut events: Vec<CatalogEvent>) -> Vec<CatalogEvent> {
        let tickets: Vec<FetchTicket> = events
            .iter()
            .filter_map(|event| match event {
                CatalogEvent::FetchRequested(ticket) => Some(*ticket),
                _ => None,
            })
            .collect();
        for ticket in tickets {
            let outcome = self.catalog.fetch(ticket.filter);
            events.extend(
                self.state
                    .dispatch(CatalogCommand::FetchFinished { ticket, outcome }),
            );
        }
        events
    }
}
