// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use happenings_app::{CalendarEntryId, CalendarId};
use time::OffsetDateTime;

/// Which account or local store a calendar belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSource {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub is_local_account: bool,
}

impl CalendarSource {
    pub fn local(name: &str) -> Self {
        Self {
            id: "local".to_owned(),
            name: name.to_owned(),
            source_type: "local".to_owned(),
            is_local_account: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Event,
    Reminder,
}

impl EntityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Reminder => "reminder",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "event" => Ok(Self::Event),
            "reminder" => Ok(Self::Reminder),
            other => bail!("unknown calendar entity type {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Owner,
    Editor,
    Read,
}

impl AccessLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Read => "read",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "read" => Ok(Self::Read),
            other => bail!("unknown calendar access level {other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendar {
    pub title: String,
    pub color: String,
    pub entity_type: EntityType,
    pub source: CalendarSource,
    pub name: String,
    pub owner_account: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendarEntry {
    pub title: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub time_zone: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCalendarInfo {
    pub id: CalendarId,
    pub title: String,
    pub source: CalendarSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Undetermined,
    Granted,
    Denied,
}

impl PermissionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undetermined => "undetermined",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

/// The device calendar subsystem. Every call may fail; callers decide how to surface it.
pub trait DeviceCalendar {
    /// Prompts for access if undetermined and returns the resulting status.
    fn request_permissions(&self) -> Result<PermissionStatus>;
    fn permission_status(&self) -> Result<PermissionStatus>;
    fn default_calendar(&self) -> Result<DeviceCalendarInfo>;
    fn create_calendar(&self, calendar: &NewCalendar) -> Result<CalendarId>;
    fn create_entry(
        &self,
        calendar_id: &CalendarId,
        entry: &NewCalendarEntry,
    ) -> Result<CalendarEntryId>;
}

impl<T: DeviceCalendar + ?Sized> DeviceCalendar for &T {
    fn request_permissions(&self) -> Result<PermissionStatus> {
        (**self).request_permissions()
    }

    fn permission_status(&self) -> Result<PermissionStatus> {
        (**self).permission_status()
    }

    fn default_calendar(&self) -> Result<DeviceCalendarInfo> {
        (**self).default_calendar()
    }

    fn create_calendar(&self, calendar: &NewCalendar) -> Result<CalendarId> {
        (**self).create_calendar(calendar)
    }

    fn create_entry(
        &self,
        calendar_id: &CalendarId,
        entry: &NewCalendarEntry,
    ) -> Result<CalendarEntryId> {
        (**self).create_entry(calendar_id, entry)
    }
}
