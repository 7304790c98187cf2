// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use happenings_app::{
    CalendarExporter, CalendarGate, CatalogSource, Event, ExportOutcome, FetchOutcome,
    FetchTicket, Filter, Permission,
};
use happenings_calendar::{CalendarStore, ExportService, PermissionGate, Platform};
use happenings_tui::InternalEvent;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

pub type SharedCatalog = Arc<dyn CatalogSource + Send + Sync>;

/// Catalog queries run on worker threads; calendar work stays on the UI thread
/// with the store.
pub struct CliRuntime<'a> {
    catalog: SharedCatalog,
    gate: PermissionGate<&'a CalendarStore>,
    exporter: ExportService<&'a CalendarStore>,
}

impl<'a> CliRuntime<'a> {
    pub fn new(catalog: SharedCatalog, store: &'a CalendarStore, platform: Platform) -> Self {
        Self {
            catalog,
            gate: PermissionGate::new(store),
            exporter: ExportService::new(store, platform),
        }
    }
}

impl happenings_tui::CatalogRuntime for CliRuntime<'_> {
    fn check_permission(&mut self) -> Permission {
        self.gate.ensure_authorized()
    }

    fn fetch(&mut self, filter: Filter) -> FetchOutcome {
        self.catalog.fetch(filter)
    }

    fn export(&mut self, event: &Event) -> ExportOutcome {
        self.exporter.export(event)
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        thread::Builder::new()
            .name(format!("catalog-fetch-{}", ticket.generation.get()))
            .spawn(move || {
                let outcome = catalog.fetch(ticket.filter);
                if tx
                    .send(InternalEvent::FetchFinished { ticket, outcome })
                    .is_err()
                {
                    debug!(
                        generation = ticket.generation.get(),
                        "fetch finished after the app closed"
                    );
                }
            })
            .context("spawn catalog fetch thread")?;
        Ok(())
    }
}
