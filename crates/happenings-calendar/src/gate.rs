// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::device::{DeviceCalendar, PermissionStatus};
use happenings_app::{CalendarGate, Permission};
use tracing::{info, warn};

/// Asks the device for calendar access. A request that errors counts as denied.
#[derive(Debug, Clone)]
pub struct PermissionGate<D> {
    device: D,
}

impl<D: DeviceCalendar> PermissionGate<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }
}

impl<D: DeviceCalendar> CalendarGate for PermissionGate<D> {
    fn ensure_authorized(&self) -> Permission {
        match self.device.request_permissions() {
            Ok(PermissionStatus::Granted) => {
                info!("calendar access granted");
                Permission::Granted
            }
            Ok(status) => {
                warn!(status = status.as_str(), "calendar access not granted");
                Permission::Denied
            }
            Err(error) => {
                warn!(error = format!("{error:#}"), "calendar permission request failed");
                Permission::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PermissionGate;
    use crate::store::CalendarStore;
    use anyhow::Result;
    use happenings_app::{CalendarGate, Permission};

    #[test]
    fn granted_when_store_allows_access() -> Result<()> {
        let store = CalendarStore::open_memory()?;
        store.bootstrap()?;
        assert_eq!(PermissionGate::new(&store).ensure_authorized(), Permission::Granted);
        Ok(())
    }

    #[test]
    fn denied_when_store_refuses_access() -> Result<()> {
        let store = CalendarStore::open_memory()?.with_access(false);
        store.bootstrap()?;
        assert_eq!(PermissionGate::new(&store).ensure_authorized(), Permission::Denied);
        Ok(())
    }

    #[test]
    fn request_error_counts_as_denied() -> Result<()> {
        // No schema: the permission request cannot be recorded.
        let store = CalendarStore::open_memory()?;
        assert_eq!(PermissionGate::new(&store).ensure_authorized(), Permission::Denied);
        Ok(())
    }
}
