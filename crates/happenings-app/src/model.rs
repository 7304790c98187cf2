// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::InvalidTimestamp;
use crate::ids::EventId;

const UNKNOWN_GLYPH: &str = "★";
const UNKNOWN_COLOR: &str = "#007AFF";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Food,
    Music,
    Sports,
    Gaming,
    Unknown(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Food => "Food",
            Self::Music => "Music",
            Self::Sports => "Sports",
            Self::Gaming => "Gaming",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "Food" => Self::Food,
            "Music" => Self::Music,
            "Sports" => Self::Sports,
            "Gaming" => Self::Gaming,
            other => Self::Unknown(other.to_owned()),
        }
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Food => Filter::Food.glyph(),
            Self::Music => Filter::Music.glyph(),
            Self::Sports => Filter::Sports.glyph(),
            Self::Gaming => Filter::Gaming.glyph(),
            Self::Unknown(_) => UNKNOWN_GLYPH,
        }
    }

    pub fn color_hex(&self) -> &'static str {
        match self {
            Self::Food => Filter::Food.color_hex(),
            Self::Music => Filter::Music.color_hex(),
            Self::Sports => Filter::Sports.color_hex(),
            Self::Gaming => Filter::Gaming.color_hex(),
            Self::Unknown(_) => UNKNOWN_COLOR,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Unknown(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Filter {
    #[default]
    All,
    Food,
    Music,
    Sports,
    Gaming,
}

impl Filter {
    pub const ALL: [Self; 5] = [
        Self::All,
        Self::Food,
        Self::Music,
        Self::Sports,
        Self::Gaming,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Food => "Food",
            Self::Music => "Music",
            Self::Sports => "Sports",
            Self::Gaming => "Gaming",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|filter| filter.label().eq_ignore_ascii_case(value))
    }

    /// The category a query must be constrained to, `None` for the unconstrained catalog.
    pub const fn category(self) -> Option<Category> {
        match self {
            Self::All => None,
            Self::Food => Some(Category::Food),
            Self::Music => Some(Category::Music),
            Self::Sports => Some(Category::Sports),
            Self::Gaming => Some(Category::Gaming),
        }
    }

    pub const fn glyph(self) -> &'static str {
        match self {
            Self::All => "◉",
            Self::Food => "♨",
            Self::Music => "♪",
            Self::Sports => "⚑",
            Self::Gaming => "♞",
        }
    }

    pub const fn color_hex(self) -> &'static str {
        match self {
            Self::All => "#0B1D51",
            Self::Food => "#901E3E",
            Self::Music => "#72BAA9",
            Self::Sports => "#2ecc71",
            Self::Gaming => "#1abc9c",
        }
    }

    pub fn rotate(self, delta: isize) -> Self {
        let filters = Self::ALL;
        let current = filters
            .iter()
            .position(|filter| *filter == self)
            .unwrap_or(0) as isize;
        let len = filters.len() as isize;
        filters[(current + delta).rem_euclid(len) as usize]
    }
}

/// ISO-8601 timestamp exactly as the store encoded it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsoTimestamp(String);

impl IsoTimestamp {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute UTC instant. Values without an offset are read as UTC.
    pub fn to_utc(&self) -> Result<OffsetDateTime, InvalidTimestamp> {
        let raw = self.0.trim();
        if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(value.to_offset(UtcOffset::UTC));
        }
        if let Ok(value) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
            return Ok(value.to_offset(UtcOffset::UTC));
        }
        if let Ok(value) = PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT) {
            return Ok(value.assume_utc());
        }
        if let Ok(value) = PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ) {
            return Ok(value.assume_utc());
        }
        if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
            return Ok(date.midnight().assume_utc());
        }
        Err(InvalidTimestamp {
            raw: self.0.clone(),
        })
    }
}

impl From<&str> for IsoTimestamp {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub category: Category,
    pub image: String,
    pub host: String,
    pub start_date: IsoTimestamp,
    pub end_date: IsoTimestamp,
    pub location: String,
}
