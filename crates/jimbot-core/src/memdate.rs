//! Special-date ("mem date") detection.
//!
//! The tracker is a two-state machine persisted through a `MarkerStore`:
//! `Idle` (marker absent) and `Fired` (marker present, stamped with the date
//! that fired). It fires once per occurrence of the configured birthday or
//! anniversary, and only for the secondary identity. The marker is removed on
//! the first check after the date has passed, or when today is a special date
//! other than the stamped one, so back-to-back occasions and next year's
//! occurrence fire again.

use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::PathBuf,
    sync::{Arc, Mutex as StdMutex},
};

use chrono::{DateTime, Datelike, NaiveDate};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{config::Config, domain::UserId, ports::MarkerStore, Result};

// ============== Date matching ==============

/// Day-and-month of a configured date; the year is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn matches(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

/// Parse a configured date into its month and day.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD`, and `MM-DD`. Anything else
/// yields `None` and never matches.
pub fn parse_month_day(raw: &str) -> Option<MonthDay> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(MonthDay {
            month: dt.month(),
            day: dt.day(),
        });
    }

    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(MonthDay {
            month: d.month(),
            day: d.day(),
        });
    }

    let (m, d) = raw.split_once('-')?;
    let month = m.parse::<u32>().ok()?;
    let day = d.parse::<u32>().ok()?;
    // Validate against a leap year so `02-29` is accepted.
    NaiveDate::from_ymd_opt(2000, month, day)?;
    Some(MonthDay { month, day })
}

/// Whether `today` is the configured birthday or anniversary.
pub fn is_special_date(today: NaiveDate, cfg: &Config) -> bool {
    [cfg.birthday.as_str(), cfg.anniversary.as_str()]
        .into_iter()
        .filter_map(|raw| {
            let parsed = parse_month_day(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                debug!("ignoring malformed special date {raw:?}");
            }
            parsed
        })
        .any(|md| md.matches(today))
}

// ============== Marker stores ==============

/// Marker file whose contents are the stamp.
#[derive(Clone, Debug)]
pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MarkerStore for FileMarkerStore {
    fn current(&self) -> Option<String> {
        fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
    }

    fn create_if_absent(&self, stamp: &str) -> Result<bool> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        file.write_all(stamp.as_bytes())?;
        file.flush()?;
        Ok(true)
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local marker.
#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    stamp: StdMutex<Option<String>>,
}

impl InMemoryMarkerStore {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.stamp.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn current(&self) -> Option<String> {
        self.slot().clone()
    }

    fn create_if_absent(&self, stamp: &str) -> Result<bool> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(stamp.to_string());
        Ok(true)
    }

    fn remove(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

// ============== Tracker ==============

pub struct MemDateTracker {
    marker: Arc<dyn MarkerStore>,
    lock: Mutex<()>,
}

impl MemDateTracker {
    pub fn new(marker: Arc<dyn MarkerStore>) -> Self {
        Self {
            marker,
            lock: Mutex::new(()),
        }
    }

    /// Returns `true` exactly once per special-date occurrence, for the first
    /// message the secondary identity sends that day.
    pub async fn check(&self, sender: UserId, today: NaiveDate, cfg: &Config) -> bool {
        let _guard = self.lock.lock().await;
        let stamp = today.to_string();

        if !is_special_date(today, cfg) {
            if self.marker.current().is_some() {
                match self.marker.remove() {
                    Ok(()) => info!("[MEMDATE] date passed, marker removed"),
                    Err(e) => warn!("[MEMDATE] failed to remove marker: {e}"),
                }
            }
            return false;
        }

        // A marker left by a different occasion (e.g. yesterday's birthday
        // followed by today's anniversary) does not count for today.
        if let Some(previous) = self.marker.current() {
            if previous != stamp {
                match self.marker.remove() {
                    Ok(()) => info!("[MEMDATE] marker from {previous:?} is stale, removed"),
                    Err(e) => warn!("[MEMDATE] failed to remove stale marker: {e}"),
                }
            }
        }

        if sender != cfg.secondary.id {
            return false;
        }

        match self.marker.create_if_absent(&stamp) {
            Ok(true) => {
                info!("[MEMDATE] special date {stamp} detected, marker created");
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("[MEMDATE] failed to create marker, skipping celebration: {e}");
                false
            }
        }
    }
}
