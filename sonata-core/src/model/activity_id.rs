//! Activity identifiers and the counters that allocate them.
//!
//! Every activity carries a monotonically increasing [`ActivityId`]. The
//! sentinel [`NO_ACTIVITY_ID`] marks messages that are not tied to any
//! activity (status pings, handshake traffic).

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

use thiserror::Error;

/// Sentinel meaning "this message is not tied to an activity".
pub const NO_ACTIVITY_ID: ActivityId = ActivityId(-1);

/// A monotonically increasing activity identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ActivityId(pub i32);

impl ActivityId {
    /// Wraps a raw integer id.
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns true if this is the [`NO_ACTIVITY_ID`] sentinel.
    pub fn is_none(&self) -> bool {
        *self == NO_ACTIVITY_ID
    }

    /// Returns the raw integer value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        NO_ACTIVITY_ID
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "NO_ACTIVITY_ID")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Errors raised while allocating a new activity id.
#[derive(Debug, Error)]
pub enum ActivityIdError {
    /// The backing counter file could not be read or written.
    #[error("activity id counter I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The counter file held a value that did not parse as an integer.
    #[error("activity id counter file is corrupt: {0}")]
    Corrupt(String),
}

/// Allocates new, never-repeating [`ActivityId`]s.
///
/// Two implementations ship with the core: a file-backed counter for
/// standalone deployments without a database, and a database-delegating
/// counter for deployments that persist activity rows (§6 "Persistence").
/// Both guarantee monotonic, non-repeating ids for the lifetime of the
/// backing store.
pub trait ActivityIdSource: Send + Sync {
    /// Allocates and returns the next activity id.
    fn next_id(&self) -> Result<ActivityId, ActivityIdError>;
}

/// A persistent counter backed by a single file on disk.
///
/// The file holds the last-allocated id as ASCII decimal text. Every
/// allocation rewrites the file and calls `sync_all` before returning,
/// so a crash between allocations never hands out a duplicate id.
pub struct FileCounter {
    path: PathBuf,
    cached: AtomicI32,
}

impl FileCounter {
    /// Opens (creating if necessary) a counter file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ActivityIdError> {
        let path = path.into();
        let initial = Self::read_or_init(&path)?;
        Ok(Self {
            path,
            cached: AtomicI32::new(initial),
        })
    }

    fn read_or_init(path: &Path) -> Result<i32, ActivityIdError> {
        if !path.exists() {
            let mut file = File::create(path)?;
            file.write_all(b"0")?;
            file.sync_all()?;
            return Ok(0);
        }
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed
            .parse::<i32>()
            .map_err(|_| ActivityIdError::Corrupt(trimmed.to_string()))
    }
}

impl ActivityIdSource for FileCounter {
    fn next_id(&self) -> Result<ActivityId, ActivityIdError> {
        let next = self.cached.fetch_add(1, Ordering::SeqCst) + 1;
        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", next)?;
        file.sync_all()?;
        Ok(ActivityId::new(next))
    }
}

/// A counter that delegates allocation to the activity-record store.
///
/// Wraps any closure returning the database-assigned id for a freshly
/// inserted activity row, matching §6's "insert a new activity row and
/// retrieve its auto-generated ID".
pub struct DbCounter<F>
where
    F: Fn() -> Result<i32, ActivityIdError> + Send + Sync,
{
    insert_and_fetch_id: F,
}

impl<F> DbCounter<F>
where
    F: Fn() -> Result<i32, ActivityIdError> + Send + Sync,
{
    /// Creates a counter that calls `insert_and_fetch_id` on every allocation.
    pub fn new(insert_and_fetch_id: F) -> Self {
        Self { insert_and_fetch_id }
    }
}

impl<F> ActivityIdSource for DbCounter<F>
where
    F: Fn() -> Result<i32, ActivityIdError> + Send + Sync,
{
    fn next_id(&self) -> Result<ActivityId, ActivityIdError> {
        (self.insert_and_fetch_id)().map(ActivityId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_activity_id_is_negative_one() {
        assert_eq!(NO_ACTIVITY_ID.value(), -1);
        assert!(NO_ACTIVITY_ID.is_none());
    }

    #[test]
    fn activity_id_display() {
        assert_eq!(format!("{}", ActivityId::new(17)), "17");
        assert_eq!(format!("{}", NO_ACTIVITY_ID), "NO_ACTIVITY_ID");
    }

    #[test]
    fn file_counter_allocates_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_id.counter");
        let counter = FileCounter::open(&path).unwrap();

        let first = counter.next_id().unwrap();
        let second = counter.next_id().unwrap();
        let third = counter.next_id().unwrap();

        assert_eq!(first.value() + 1, second.value());
        assert_eq!(second.value() + 1, third.value());
    }

    #[test]
    fn file_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_id.counter");

        {
            let counter = FileCounter::open(&path).unwrap();
            counter.next_id().unwrap();
            counter.next_id().unwrap();
        }

        let reopened = FileCounter::open(&path).unwrap();
        let next = reopened.next_id().unwrap();
        assert_eq!(next.value(), 3);
    }

    #[test]
    fn db_counter_delegates_to_closure() {
        let counter = DbCounter::new(|| Ok(42));
        assert_eq!(counter.next_id().unwrap().value(), 42);
    }
}
