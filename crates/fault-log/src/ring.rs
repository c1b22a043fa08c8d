//! Circular Fault Log Implementation

use crate::record::FaultRecord;
use crate::{is_valid_code, LogError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Default number of slots per log
pub const DEFAULT_CAPACITY: usize = 20;

/// Configuration for a fault log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Name used in diagnostics and rendering
    pub name: String,
    /// Number of slots, fixed for the lifetime of the log
    pub capacity: usize,
    /// Hours east of UTC used when rendering timestamps
    pub timezone_offset: i32,
    /// When false, saves are skipped and report success
    pub persistence_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            name: "faults".to_string(),
            capacity: DEFAULT_CAPACITY,
            timezone_offset: 0,
            persistence_enabled: true,
        }
    }
}

/// Fixed-capacity FIFO of fault records.
///
/// Occupied slots run from `head` to `tail` inclusive, wrapping at
/// `capacity`. Both ends are unset exactly when the log is empty.
#[derive(Debug, Clone)]
pub struct FaultLog {
    name: String,
    storage: Box<[FaultRecord]>,
    /// `(head, tail)`; `None` when empty
    span: Option<(usize, usize)>,
    timezone_offset: i32,
    persistence_enabled: bool,
}

impl FaultLog {
    /// Create an empty log
    pub fn new(config: LogConfig) -> Result<Self, LogError> {
        if config.capacity == 0 || i32::try_from(config.capacity).is_err() {
            return Err(LogError::InvalidCapacity(config.capacity));
        }

        debug!(
            "Creating fault log '{}' with {} slots",
            config.name, config.capacity
        );

        Ok(Self {
            name: config.name,
            storage: vec![FaultRecord::EMPTY; config.capacity].into_boxed_slice(),
            span: None,
            timezone_offset: config.timezone_offset,
            persistence_enabled: config.persistence_enabled,
        })
    }

    /// Create an empty log with default settings and the given capacity
    pub fn with_capacity(name: &str, capacity: usize) -> Result<Self, LogError> {
        Self::new(LogConfig {
            name: name.to_string(),
            capacity,
            ..Default::default()
        })
    }

    /// Log name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Rendering time zone, hours east of UTC
    pub fn timezone_offset(&self) -> i32 {
        self.timezone_offset
    }

    /// Set the rendering time zone
    pub fn set_timezone_offset(&mut self, hours: i32) {
        self.timezone_offset = hours;
    }

    /// Whether saves actually write
    pub fn persistence_enabled(&self) -> bool {
        self.persistence_enabled
    }

    /// Enable or disable saving
    pub fn set_persistence_enabled(&mut self, enabled: bool) {
        self.persistence_enabled = enabled;
    }

    /// Slot index of the oldest record
    pub fn head(&self) -> Option<usize> {
        self.span.map(|(head, _)| head)
    }

    /// Slot index of the newest record
    pub fn tail(&self) -> Option<usize> {
        self.span.map(|(_, tail)| tail)
    }

    /// Check if the log holds no records
    pub fn is_empty(&self) -> bool {
        self.span.is_none()
    }

    /// Check if every slot is occupied
    pub fn is_full(&self) -> bool {
        self.occupied_count() == self.capacity()
    }

    /// Number of slots reachable from head to tail
    pub fn occupied_count(&self) -> usize {
        match self.span {
            None => 0,
            Some((head, tail)) => (tail + self.capacity() - head) % self.capacity() + 1,
        }
    }

    /// Number of occupied records not yet cleared
    pub fn active_count(&self) -> usize {
        self.iter().filter(|r| r.active).count()
    }

    /// Iterate occupied records, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &FaultRecord> + '_ {
        let head = self.head().unwrap_or(0);
        let capacity = self.capacity();
        (0..self.occupied_count()).map(move |i| &self.storage[(head + i) % capacity])
    }

    /// Record a fault code seen at `timestamp`.
    ///
    /// A no-op if an active record with the same code is already logged; the
    /// first-seen timestamp is kept. A full log drops its oldest record to
    /// make room. Codes outside the diagnostic domain are rejected. Returns
    /// whether a record was inserted.
    pub fn record(&mut self, timestamp: u32, code: u32) -> bool {
        if !is_valid_code(code) {
            warn!("{}: bad code {} not logged", self.name, code);
            return false;
        }

        if let Some(existing) = self.iter().find(|r| r.active && r.code == code) {
            debug!(
                "{}: P{:04} already logged at {}",
                self.name, code, existing.timestamp
            );
            return false;
        }

        if self.is_full() {
            trace!("{}: full, evicting oldest", self.name);
            self.remove_oldest();
        }

        let tail = match self.span {
            None => {
                self.span = Some((0, 0));
                0
            }
            Some((head, tail)) => {
                let next = (tail + 1) % self.capacity();
                self.span = Some((head, next));
                next
            }
        };
        self.storage[tail] = FaultRecord::new(timestamp, code);

        debug!("{}: logged P{:04} at {}", self.name, code, timestamp);
        true
    }

    /// Drop the oldest record. The vacated slot keeps its contents but is no
    /// longer reachable.
    pub fn remove_oldest(&mut self) {
        match self.span {
            None => warn!("{}: remove on empty log", self.name),
            Some((head, tail)) if head == tail => self.span = None,
            Some((head, tail)) => self.span = Some(((head + 1) % self.capacity(), tail)),
        }
    }

    /// Mark every occupied record cleared, keeping occupancy and order
    pub fn mark_all_cleared(&mut self) {
        let Some((head, _)) = self.span else {
            return;
        };
        let capacity = self.capacity();
        for i in 0..self.occupied_count() {
            self.storage[(head + i) % capacity].active = false;
        }
        debug!("{}: all records cleared", self.name);
    }

    /// Oldest record, if any
    pub fn oldest(&self) -> Option<&FaultRecord> {
        self.head().map(|head| &self.storage[head])
    }

    /// Newest record, if any
    pub fn newest(&self) -> Option<&FaultRecord> {
        self.tail().map(|tail| &self.storage[tail])
    }

    /// Oldest record, or [`FaultRecord::EMPTY`] with a warning when empty
    pub fn peek_oldest(&self) -> FaultRecord {
        self.oldest().copied().unwrap_or_else(|| {
            warn!("{}: no oldest record; log empty", self.name);
            FaultRecord::EMPTY
        })
    }

    /// Newest record, or [`FaultRecord::EMPTY`] with a warning when empty
    pub fn peek_newest(&self) -> FaultRecord {
        self.newest().copied().unwrap_or_else(|| {
            warn!("{}: no newest record; log empty", self.name);
            FaultRecord::EMPTY
        })
    }

    /// Read slot `index` directly, ignoring occupancy
    pub fn raw_at(&self, index: usize) -> Result<FaultRecord, LogError> {
        self.check_index(index)?;
        Ok(self.storage[index])
    }

    /// Overwrite slot `index` directly, ignoring occupancy
    pub fn set_raw_at(&mut self, index: usize, record: FaultRecord) -> Result<(), LogError> {
        self.check_index(index)?;
        self.storage[index] = record;
        Ok(())
    }

    /// All slots in storage order, occupied or not
    pub(crate) fn slots(&self) -> &[FaultRecord] {
        &self.storage
    }

    /// Replace head and tail; callers validate them first
    pub(crate) fn set_span(&mut self, span: Option<(usize, usize)>) {
        self.span = span;
    }

    fn check_index(&self, index: usize) -> Result<(), LogError> {
        if index >= self.capacity() {
            warn!("{}: slot {} ignored", self.name, index);
            return Err(LogError::IndexOutOfRange {
                index,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}
