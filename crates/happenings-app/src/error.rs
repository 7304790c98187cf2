// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// The remote store was unreachable or answered with an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("catalog query failed: {message}")]
pub struct QueryFailure {
    pub message: String,
}

impl QueryFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    ResolveSource,
    CreateCalendar,
    CreateEntry,
}

impl ExportStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolveSource => "resolve source",
            Self::CreateCalendar => "create calendar",
            Self::CreateEntry => "create entry",
        }
    }
}

/// Displays as the bare underlying message so it can be shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExportFailure {
    pub stage: ExportStage,
    pub message: String,
}

impl ExportFailure {
    pub fn new(stage: ExportStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Calendar writes attempted while the device withholds access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("calendar access was denied")]
pub struct PermissionDenied;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {raw:?}; expected ISO-8601 such as 2026-05-10T18:00:00Z")]
pub struct InvalidTimestamp {
    pub raw: String,
}
