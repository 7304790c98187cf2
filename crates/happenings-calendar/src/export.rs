// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::device::{
    AccessLevel, CalendarSource, DeviceCalendar, EntityType, NewCalendar, NewCalendarEntry,
};
use anyhow::{Result, bail};
use happenings_app::{
    CalendarExporter, Event, ExportFailure, ExportOutcome, ExportReceipt, ExportStage,
};
use time::UtcOffset;
use tracing::{debug, error, info};

pub const CALENDAR_TITLE: &str = "Happenings";
pub const CALENDAR_COLOR: &str = "blue";
pub const CALENDAR_NAME: &str = "happeningsCalendar";
pub const OWNER_ACCOUNT: &str = "personal";
pub const LOCAL_SOURCE_NAME: &str = "Happenings";
pub const ENTRY_TIME_ZONE: &str = "UTC";

/// How the device exposes calendar sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    /// Calendars hang off accounts; new calendars reuse the default calendar's source.
    AccountBacked,
    /// No account concept; new calendars get the fixed local source.
    #[default]
    LocalOnly,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountBacked => "account",
            Self::LocalOnly => "local",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "account" => Ok(Self::AccountBacked),
            "local" => Ok(Self::LocalOnly),
            other => bail!("calendar.platform must be \"local\" or \"account\", got {other:?}"),
        }
    }
}

/// Writes an event into a freshly created calendar. Each export creates its own
/// calendar and nothing is rolled back when a later step fails.
#[derive(Debug, Clone)]
pub struct ExportService<D> {
    device: D,
    platform: Platform,
}

impl<D: DeviceCalendar> ExportService<D> {
    pub fn new(device: D, platform: Platform) -> Self {
        Self { device, platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn resolve_source(&self) -> Result<CalendarSource> {
        match self.platform {
            Platform::AccountBacked => Ok(self.device.default_calendar()?.source),
            Platform::LocalOnly => Ok(CalendarSource::local(LOCAL_SOURCE_NAME)),
        }
    }

    fn run(&self, event: &Event) -> ExportOutcome {
        let source = self
            .resolve_source()
            .map_err(|error| failure(ExportStage::ResolveSource, &error))?;
        debug!(source = %source.id, "resolved calendar source");

        let calendar_id = self
            .device
            .create_calendar(&calendar_request(source))
            .map_err(|error| failure(ExportStage::CreateCalendar, &error))?;
        info!(calendar = %calendar_id, "created calendar");

        let entry_id = entry_request(event)
            .and_then(|entry| self.device.create_entry(&calendar_id, &entry))
            .map_err(|error| failure(ExportStage::CreateEntry, &error))?;

        Ok(ExportReceipt {
            event_id: event.id.clone(),
            calendar_id,
            entry_id,
        })
    }
}

impl<D: DeviceCalendar> CalendarExporter for ExportService<D> {
    fn export(&self, event: &Event) -> ExportOutcome {
        let outcome = self.run(event);
        match &outcome {
            Ok(receipt) => info!(
                event = %receipt.event_id,
                calendar = %receipt.calendar_id,
                entry = %receipt.entry_id,
                "event exported"
            ),
            Err(failure) => error!(
                event = %event.id,
                stage = failure.stage.as_str(),
                message = %failure.message,
                "export failed"
            ),
        }
        outcome
    }
}

pub fn calendar_request(source: CalendarSource) -> NewCalendar {
    NewCalendar {
        title: CALENDAR_TITLE.to_owned(),
        color: CALENDAR_COLOR.to_owned(),
        entity_type: EntityType::Event,
        source,
        name: CALENDAR_NAME.to_owned(),
        owner_account: OWNER_ACCOUNT.to_owned(),
        access_level: AccessLevel::Owner,
    }
}

pub fn entry_request(event: &Event) -> Result<NewCalendarEntry> {
    let start = event.start_date.to_utc()?.to_offset(UtcOffset::UTC);
    let end = event.end_date.to_utc()?.to_offset(UtcOffset::UTC);
    Ok(NewCalendarEntry {
        title: event.name.clone(),
        start,
        end,
        time_zone: ENTRY_TIME_ZONE.to_owned(),
        location: event.location.clone(),
    })
}

fn failure(stage: ExportStage, error: &anyhow::Error) -> ExportFailure {
    ExportFailure::new(stage, format!("{error:#}"))
}
