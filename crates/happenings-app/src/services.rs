// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::{ExportFailure, QueryFailure};
use crate::ids::{CalendarEntryId, CalendarId, EventId};
use crate::model::{Event, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub event_id: EventId,
    pub calendar_id: CalendarId,
    pub entry_id: CalendarEntryId,
}

pub type FetchOutcome = Result<Vec<Event>, QueryFailure>;
pub type ExportOutcome = Result<ExportReceipt, ExportFailure>;

/// Category-scoped query against the remote event store. One round trip per call.
pub trait CatalogSource {
    fn fetch(&self, filter: Filter) -> FetchOutcome;
}

pub trait CalendarGate {
    fn ensure_authorized(&self) -> Permission;
}

pub trait CalendarExporter {
    fn export(&self, event: &Event) -> ExportOutcome;
}

impl<T: CatalogSource + ?Sized> CatalogSource for &T {
    fn fetch(&self, filter: Filter) -> FetchOutcome {
        (**self).fetch(filter)
    }
}

impl<T: CalendarGate + ?Sized> CalendarGate for &T {
    fn ensure_authorized(&self) -> Permission {
        (**self).ensure_authorized()
    }
}

impl<T: CalendarExporter + ?Sized> CalendarExporter for &T {
    fn export(&self, event: &Event) -> ExportOutcome {
        (**self).export(event)
    }
}
