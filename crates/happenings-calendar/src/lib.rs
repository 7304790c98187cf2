// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod device;
mod export;
mod gate;
mod store;

pub use device::{
    AccessLevel, CalendarSource, DeviceCalendar, DeviceCalendarInfo, EntityType, NewCalendar,
    NewCalendarEntry, PermissionStatus,
};
pub use export::{
    CALENDAR_COLOR, CALENDAR_NAME, CALENDAR_TITLE, ENTRY_TIME_ZONE, ExportService,
    LOCAL_SOURCE_NAME, OWNER_ACCOUNT, Platform, calendar_request, entry_request,
};
pub use gate::PermissionGate;
pub use store::{
    APP_NAME, CalendarStore, StoredCalendar, StoredEntry, data_dir, default_db_path,
    validate_db_path,
};
