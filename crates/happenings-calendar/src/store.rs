// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::device::{
    AccessLevel, CalendarSource, DeviceCalendar, DeviceCalendarInfo, EntityType, NewCalendar,
    NewCalendarEntry, PermissionStatus,
};
use anyhow::{Context, Result, anyhow, bail};
use happenings_app::{CalendarEntryId, CalendarId, PermissionDenied};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

pub const APP_NAME: &str = "happenings";

const SCHEMA: &str = "
CREATE TABLE sources (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  source_type TEXT NOT NULL,
  is_local_account INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE calendars (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  color TEXT NOT NULL,
  entity_type TEXT NOT NULL,
  source_id TEXT NOT NULL REFERENCES sources(id),
  name TEXT NOT NULL,
  owner_account TEXT NOT NULL,
  access_level TEXT NOT NULL,
  is_default INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL
);

CREATE TABLE entries (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  calendar_id INTEGER NOT NULL REFERENCES calendars(id),
  title TEXT NOT NULL,
  start_at TEXT NOT NULL,
  end_at TEXT NOT NULL,
  time_zone TEXT NOT NULL,
  location TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX idx_entries_calendar_id ON entries (calendar_id);

CREATE TABLE access (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  status TEXT NOT NULL
);
";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("sources", &["id", "name", "source_type", "is_local_account"]),
    (
        "calendars",
        &[
            "id",
            "title",
            "color",
            "entity_type",
            "source_id",
            "name",
            "owner_account",
            "access_level",
            "is_default",
            "created_at",
        ],
    ),
    (
        "entries",
        &[
            "id",
            "calendar_id",
            "title",
            "start_at",
            "end_at",
            "time_zone",
            "location",
            "created_at",
        ],
    ),
    ("access", &["id", "status"]),
];

const DEFAULT_SOURCE: (&str, &str, &str) = ("personal", "Personal", "account");
const DEFAULT_CALENDAR_TITLE: &str = "Calendar";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCalendar {
    pub id: CalendarId,
    pub title: String,
    pub color: String,
    pub entity_type: EntityType,
    pub source: CalendarSource,
    pub name: String,
    pub owner_account: String,
    pub access_level: AccessLevel,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: CalendarEntryId,
    pub calendar_id: CalendarId,
    pub title: String,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub time_zone: String,
    pub location: String,
}

/// A device calendar kept in SQLite. Access is decided by the store's policy the
/// first time permission is requested in a session.
pub struct CalendarStore {
    conn: Connection,
    allow_access: bool,
}

impl CalendarStore {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open calendar database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self {
            conn,
            allow_access: true,
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory calendar database")?;
        configure_connection(&conn)?;
        Ok(Self {
            conn,
            allow_access: true,
        })
    }

    #[must_use]
    pub fn with_access(mut self, allow_access: bool) -> Self {
        self.allow_access = allow_access;
        self
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(SCHEMA)
                .context("create calendar schema")?;
        }
        self.seed_defaults()
    }

    pub fn seed_defaults(&self) -> Result<()> {
        let (id, name, source_type) = DEFAULT_SOURCE;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO sources (id, name, source_type, is_local_account)
                 VALUES (?, ?, ?, 0)",
                params![id, name, source_type],
            )
            .context("insert default calendar source")?;

        let has_default: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM calendars WHERE is_default = 1)",
                [],
                |row| row.get(0),
            )
            .context("check for default calendar")?;
        if !has_default {
            self.conn
                .execute(
                    "INSERT INTO calendars
                       (title, color, entity_type, source_id, name, owner_account,
                        access_level, is_default, created_at)
                     VALUES (?, 'gray', 'event', ?, 'defaultCalendar', ?, 'owner', 1, ?)",
                    params![DEFAULT_CALENDAR_TITLE, id, id, now_rfc3339()?],
                )
                .context("insert default calendar")?;
        }
        Ok(())
    }

    pub fn list_calendars(&self) -> Result<Vec<StoredCalendar>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT c.id, c.title, c.color, c.entity_type, c.name, c.owner_account,
                       c.access_level, c.is_default,
                       s.id, s.name, s.source_type, s.is_local_account
                FROM calendars c
                JOIN sources s ON s.id = c.source_id
                ORDER BY c.id ASC
                ",
            )
            .context("prepare calendar list query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, bool>(7)?,
                    CalendarSource {
                        id: row.get(8)?,
                        name: row.get(9)?,
                        source_type: row.get(10)?,
                        is_local_account: row.get(11)?,
                    },
                ))
            })
            .context("query calendars")?;

        let mut calendars = Vec::new();
        for row in rows {
            let (
                id,
                title,
                color,
                entity_type,
                name,
                owner_account,
                access_level,
                is_default,
                source,
            ) = row.context("read calendar row")?;
            calendars.push(StoredCalendar {
                id: CalendarId::new(id.to_string()),
                title,
                color,
                entity_type: EntityType::parse(&entity_type)?,
                source,
                name,
                owner_account,
                access_level: AccessLevel::parse(&access_level)?,
                is_default,
            });
        }
        Ok(calendars)
    }

    pub fn list_entries(&self) -> Result<Vec<StoredEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, calendar_id, title, start_at, end_at, time_zone, location
                FROM entries
                ORDER BY id ASC
                ",
            )
            .context("prepare entry list query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .context("query entries")?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, calendar_id, title, start_at, end_at, time_zone, location) =
                row.context("read entry row")?;
            entries.push(StoredEntry {
                id: CalendarEntryId::new(id.to_string()),
                calendar_id: CalendarId::new(calendar_id.to_string()),
                title,
                start: parse_stored_timestamp(&start_at)?,
                end: parse_stored_timestamp(&end_at)?,
                time_zone,
                location,
            });
        }
        Ok(entries)
    }

    fn stored_status(&self) -> Result<PermissionStatus> {
        let status: Option<String> = self
            .conn
            .query_row("SELECT status FROM access WHERE id = 1", [], |row| row.get(0))
            .optional()
            .context("read calendar access status")?;
        Ok(match status.as_deref() {
            Some("granted") => PermissionStatus::Granted,
            Some("denied") => PermissionStatus::Denied,
            _ => PermissionStatus::Undetermined,
        })
    }

    fn require_access(&self) -> Result<()> {
        match self.stored_status()? {
            PermissionStatus::Granted => Ok(()),
            PermissionStatus::Denied => Err(PermissionDenied)
                .context("calendar writes need access -- set [calendar].allow_access = true"),
            PermissionStatus::Undetermined => {
                bail!("calendar access has not been requested yet")
            }
        }
    }

    fn ensure_source(&self, source: &CalendarSource) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO sources (id, name, source_type, is_local_account)
                 VALUES (?, ?, ?, ?)",
                params![
                    source.id,
                    source.name,
                    source.source_type,
                    source.is_local_account
                ],
            )
            .with_context(|| format!("register calendar source {}", source.id))?;
        Ok(())
    }
}

impl DeviceCalendar for CalendarStore {
    fn request_permissions(&self) -> Result<PermissionStatus> {
        let status = if self.allow_access {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        self.conn
            .execute(
                "INSERT INTO access (id, status) VALUES (1, ?)
                 ON CONFLICT (id) DO UPDATE SET status = excluded.status",
                params![status.as_str()],
            )
            .context("record calendar access status")?;
        Ok(status)
    }

    fn permission_status(&self) -> Result<PermissionStatus> {
        self.stored_status()
    }

    fn default_calendar(&self) -> Result<DeviceCalendarInfo> {
        self.require_access()?;
        self.conn
            .query_row(
                "
                SELECT c.id, c.title, s.id, s.name, s.source_type, s.is_local_account
                FROM calendars c
                JOIN sources s ON s.id = c.source_id
                WHERE c.is_default = 1
                ORDER BY c.id ASC
                LIMIT 1
                ",
                [],
                |row| {
                    Ok(DeviceCalendarInfo {
                        id: CalendarId::new(row.get::<_, i64>(0)?.to_string()),
                        title: row.get(1)?,
                        source: CalendarSource {
                            id: row.get(2)?,
                            name: row.get(3)?,
                            source_type: row.get(4)?,
                            is_local_account: row.get(5)?,
                        },
                    })
                },
            )
            .optional()
            .context("look up default calendar")?
            .ok_or_else(|| anyhow!("no default calendar on this device"))
    }

    fn create_calendar(&self, calendar: &NewCalendar) -> Result<CalendarId> {
        self.require_access()?;
        self.ensure_source(&calendar.source)?;
        self.conn
            .execute(
                "INSERT INTO calendars
                   (title, color, entity_type, source_id, name, owner_account,
                    access_level, is_default, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
                params![
                    calendar.title,
                    calendar.color,
                    calendar.entity_type.as_str(),
                    calendar.source.id,
                    calendar.name,
                    calendar.owner_account,
                    calendar.access_level.as_str(),
                    now_rfc3339()?,
                ],
            )
            .with_context(|| format!("create calendar {:?}", calendar.title))?;
        let id = self.conn.last_insert_rowid();
        debug!(id, title = %calendar.title, "calendar row inserted");
        Ok(CalendarId::new(id.to_string()))
    }

    fn create_entry(
        &self,
        calendar_id: &CalendarId,
        entry: &NewCalendarEntry,
    ) -> Result<CalendarEntryId> {
        self.require_access()?;
        let row_id: i64 = calendar_id
            .as_str()
            .parse()
            .with_context(|| format!("calendar id {calendar_id} is not a local calendar"))?;
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM calendars WHERE id = ?)",
                params![row_id],
                |row| row.get(0),
            )
            .context("check calendar existence")?;
        if !exists {
            bail!("calendar {calendar_id} does not exist");
        }

        self.conn
            .execute(
                "INSERT INTO entries
                   (calendar_id, title, start_at, end_at, time_zone, location, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    row_id,
                    entry.title,
                    entry.start.format(&Rfc3339).context("format entry start")?,
                    entry.end.format(&Rfc3339).context("format entry end")?,
                    entry.time_zone,
                    entry.location,
                    now_rfc3339()?,
                ],
            )
            .with_context(|| format!("create entry {:?}", entry.title))?;
        Ok(CalendarEntryId::new(self.conn.last_insert_rowid().to_string()))
    }
}

const CALENDAR_PATH_ENV: &str = "HAPPENINGS_CALENDAR_PATH";

/// `<data dir>/happenings`, created on first use.
pub fn data_dir() -> Result<PathBuf> {
    let app_dir = dirs::data_local_dir()
        .map(|root| root.join(APP_NAME))
        .ok_or_else(|| {
            anyhow!("cannot resolve data directory; set {CALENDAR_PATH_ENV} to a writable database path")
        })?;
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir)
}

pub fn default_db_path() -> Result<PathBuf> {
    match env::var_os(CALENDAR_PATH_ENV) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(data_dir()?.join("calendar.db")),
    }
}

/// Rejects anything SQLite would read as a URI instead of a file on disk.
pub fn validate_db_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("calendar database path must not be empty");
    }
    match uri_form(path) {
        Some(form) => bail!("calendar database path {path:?} {form}; pass a plain filesystem path"),
        None => Ok(()),
    }
}

fn uri_form(path: &str) -> Option<String> {
    if path == ":memory:" {
        return None;
    }
    if let Some((scheme, _)) = path.split_once("://")
        && !scheme.is_empty()
        && scheme.chars().all(char::is_alphabetic)
    {
        return Some(format!("looks like a URI ({scheme}://)"));
    }
    if path.starts_with("file:") {
        return Some("uses file: URI syntax".to_owned());
    }
    path.contains('?')
        .then(|| "carries query parameters after '?'".to_owned())
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current time")
}

fn parse_stored_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .with_context(|| format!("stored timestamp {value:?} is not RFC 3339"))
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%')",
        [],
        |row| row.get(0),
    )
    .context("inspect existing tables")
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            bail!(
                "calendar database is missing table `{table}`; point [calendar].db_path at a happenings calendar"
            );
        }

        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}",
                missing.join(", ")
            );
        }
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))
        .context("set sqlite busy timeout")?;
    conn.pragma_update(None, "foreign_keys", true)
        .context("enable foreign keys")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("set synchronous mode")?;
    // In-memory databases answer "memory" instead of switching to WAL.
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("set journal mode")?;
    debug!(journal_mode = %mode, "calendar database configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CalendarStore, validate_schema};
    use crate::device::{CalendarSource, DeviceCalendar, PermissionStatus};
    use crate::export::calendar_request;
    use anyhow::Result;
    use happenings_app::PermissionDenied;

    #[test]
    fn bootstrap_seeds_one_default_calendar() -> Result<()> {
        let store = CalendarStore::open_memory()?;
        store.bootstrap()?;
        store.bootstrap()?;
        let calendars = store.list_calendars()?;
        assert_eq!(calendars.len(), 1);
        assert!(calendars[0].is_default);
        assert_eq!(calendars[0].source.id, "personal");
        assert!(!calendars[0].source.is_local_account);
        Ok(())
    }

    #[test]
    fn permission_starts_undetermined() -> Result<()> {
        let store = CalendarStore::open_memory()?;
        store.bootstrap()?;
        assert_eq!(store.permission_status()?, PermissionStatus::Undetermined);
        assert!(store.default_calendar().is_err());
        assert_eq!(store.request_permissions()?, PermissionStatus::Granted);
        assert_eq!(store.permission_status()?, PermissionStatus::Granted);
        assert_eq!(store.default_calendar()?.title, "Calendar");
        Ok(())
    }

    #[test]
    fn policy_change_takes_effect_on_next_request() -> Result<()> {
        let store = CalendarStore::open_memory()?.with_access(false);
        store.bootstrap()?;
        assert_eq!(store.request_permissions()?, PermissionStatus::Denied);
        let store = store.with_access(true);
        assert_eq!(store.request_permissions()?, PermissionStatus::Granted);
        Ok(())
    }

    #[test]
    fn denied_store_refuses_calendar_writes() -> Result<()> {
        let store = CalendarStore::open_memory()?.with_access(false);
        store.bootstrap()?;
        assert_eq!(store.request_permissions()?, PermissionStatus::Denied);

        let error = store
            .create_calendar(&calendar_request(CalendarSource::local("Happenings")))
            .expect_err("writes should be refused");
        assert!(error.downcast_ref::<PermissionDenied>().is_some());
        assert!(format!("{error:#}").contains("allow_access"));
        assert_eq!(store.list_calendars()?.len(), 1);
        Ok(())
    }

    #[test]
    fn validate_schema_reports_missing_columns() -> Result<()> {
        let store = CalendarStore::open_memory()?;
        store
            .raw_connection()
            .execute_batch("CREATE TABLE sources (id TEXT PRIMARY KEY, name TEXT NOT NULL);")?;
        let error = validate_schema(store.raw_connection()).expect_err("incomplete schema");
        assert!(error.to_string().contains("source_type"));
        Ok(())
    }
}
