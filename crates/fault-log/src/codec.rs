//! Non-Volatile Codec
//!
//! Region layout at `start`, little-endian, no padding:
//!
//! ```text
//! i32 head        // -1 when empty
//! i32 tail        // -1 when empty
//! i32 capacity
//! FaultRecord[capacity]  // u32 timestamp, u32 code, u8 active
//! ```
//!
//! Every write is followed by a full read-back; there is no checksum. A
//! mismatch means the part is failing and is not retried. Power loss between
//! the write and the read-back leaves the region undefined.

use crate::record::FaultRecord;
use crate::ring::FaultLog;
use crate::LogError;
use nvm_storage::{NvmStore, NvmValue, StorageError};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Stored in place of head/tail for an empty log
const EMPTY_SENTINEL: i32 = -1;

/// Width of each header field
const WORD: usize = <i32 as NvmValue>::SIZE;

/// Bytes taken by head, tail and capacity
const HEADER_LEN: usize = WORD * 3;

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Read-back after a write did not match what was written
    #[error("NVM verification failed for '{log}' at offset {offset}")]
    VerifyMismatch { log: String, offset: usize },

    /// The store rejected an access
    #[error("NVM access failed: {0}")]
    Storage(#[from] StorageError),

    /// A slot write was rejected by the log
    #[error("Slot restore failed: {0}")]
    Log(#[from] LogError),
}

/// How `load` treated the stored region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Stored state was accepted and copied into the log
    Restored,
    /// Region was blank or incompatible; the log was left as it was
    Uninitialized,
}

fn encode_index(index: Option<usize>) -> i32 {
    // capacity fits i32, checked at construction
    index.map_or(EMPTY_SENTINEL, |i| i as i32)
}

impl FaultLog {
    /// Bytes this log occupies in non-volatile memory
    pub fn region_len(&self) -> usize {
        HEADER_LEN + self.capacity() * FaultRecord::SIZE
    }

    /// Write the log at `start` and verify it by reading it back.
    ///
    /// Returns the offset just past the region. With persistence disabled
    /// nothing is written and `start` is returned.
    pub fn save<S: NvmStore>(&self, store: &mut S, start: usize) -> Result<usize, CodecError> {
        if !self.persistence_enabled() {
            debug!("{}: persistence disabled, not storing", self.name());
            return Ok(start);
        }

        let header = [
            encode_index(self.head()),
            encode_index(self.tail()),
            self.capacity() as i32,
        ];
        self.write_region(store, start, header, self.slots())?;
        let end = self.verify_region(store, start, header, self.slots())?;

        debug!("{}: stored and verified at {}..{}", self.name(), start, end);
        Ok(end)
    }

    /// Restore the log from the region at `start`.
    ///
    /// The region is accepted only when its capacity matches this log and its
    /// head/tail describe a valid span. Otherwise the log is untouched. Either
    /// way the returned offset is just past this log's region, so sibling
    /// regions stay addressable.
    pub fn load<S: NvmStore>(
        &mut self,
        store: &S,
        start: usize,
    ) -> Result<(usize, LoadOutcome), CodecError> {
        let end = start + self.region_len();

        let head: i32 = store.get(start)?;
        let tail: i32 = store.get(start + WORD)?;
        let capacity: i32 = store.get(start + 2 * WORD)?;
        trace!(
            "{}: load head={} tail={} capacity={}",
            self.name(),
            head,
            tail,
            capacity
        );

        let Some(span) = self.accept_header(head, tail, capacity) else {
            info!("{}: NVM uninitialized, starting empty", self.name());
            return Ok((end, LoadOutcome::Uninitialized));
        };

        // Read every slot before touching the log so a failed read leaves it intact
        let mut records = Vec::with_capacity(self.capacity());
        let mut p = start + HEADER_LEN;
        for i in 0..self.capacity() {
            let record: FaultRecord = store.get(p)?;
            trace!(
                "{}: slot {} = {} P{:04} {}",
                self.name(),
                i,
                record.timestamp,
                record.code,
                record.active
            );
            records.push(record);
            p += FaultRecord::SIZE;
        }

        for (i, record) in records.into_iter().enumerate() {
            self.set_raw_at(i, record)?;
        }
        self.set_span(span);

        debug!(
            "{}: restored {} records ({} active)",
            self.name(),
            self.occupied_count(),
            self.active_count()
        );
        Ok((end, LoadOutcome::Restored))
    }

    /// Blank the region at `start`: empty sentinels and zeroed, inactive
    /// records, verified by read-back. The in-memory log is unchanged.
    pub fn clear_nvm<S: NvmStore>(&self, store: &mut S, start: usize) -> Result<usize, CodecError> {
        let header = [EMPTY_SENTINEL, EMPTY_SENTINEL, self.capacity() as i32];
        let blank = vec![FaultRecord::EMPTY; self.capacity()];
        self.write_region(store, start, header, &blank)?;
        let end = self.verify_region(store, start, header, &blank)?;

        info!("{}: NVM region cleared", self.name());
        Ok(end)
    }

    /// Map a stored header onto a span, or `None` if it is not usable
    fn accept_header(&self, head: i32, tail: i32, capacity: i32) -> Option<Option<(usize, usize)>> {
        let limit = self.capacity() as i32;
        let in_range = |v: i32| (EMPTY_SENTINEL..=limit).contains(&v);
        if capacity != limit || !in_range(head) || !in_range(tail) {
            return None;
        }

        match (head, tail) {
            (EMPTY_SENTINEL, EMPTY_SENTINEL) => Some(None),
            (h, t) if h >= 0 && t >= 0 && h < limit && t < limit => {
                Some(Some((h as usize, t as usize)))
            }
            _ => {
                warn!(
                    "{}: inconsistent stored span head={} tail={}",
                    self.name(),
                    head,
                    tail
                );
                None
            }
        }
    }

    fn write_region<S: NvmStore>(
        &self,
        store: &mut S,
        start: usize,
        header: [i32; 3],
        records: &[FaultRecord],
    ) -> Result<usize, CodecError> {
        let mut p = start;
        for value in header {
            p = store.put(p, &value)?;
        }
        for record in records {
            p = store.put(p, record)?;
        }
        Ok(p)
    }

    fn verify_region<S: NvmStore>(
        &self,
        store: &S,
        start: usize,
        header: [i32; 3],
        records: &[FaultRecord],
    ) -> Result<usize, CodecError> {
        let mismatch = |offset: usize| CodecError::VerifyMismatch {
            log: self.name().to_string(),
            offset,
        };

        let mut p = start;
        for expected in header {
            let read: i32 = store.get(p)?;
            trace!("{}: read {} ?= {} demand", self.name(), read, expected);
            if read != expected {
                warn!("{}: header mismatch at {}", self.name(), p);
                return Err(mismatch(p));
            }
            p += WORD;
        }

        for expected in records {
            let read: FaultRecord = store.get(p)?;
            if !read.same_contents(expected) {
                warn!(
                    "{}: record mismatch at {}: read {:?}, wrote {:?}",
                    self.name(),
                    p,
                    read,
                    expected
                );
                return Err(mismatch(p));
            }
            p += FaultRecord::SIZE;
        }
        Ok(p)
    }
}

/// Save several logs back to back from `start`.
///
/// A log with persistence disabled writes nothing but its region is still
/// skipped, so later logs land where `load_all` expects them.
pub fn save_all<S: NvmStore>(
    logs: &[&FaultLog],
    store: &mut S,
    start: usize,
) -> Result<usize, CodecError> {
    let mut p = start;
    for log in logs {
        let end = log.save(store, p)?;
        p = if end == p { p + log.region_len() } else { end };
    }
    Ok(p)
}

/// Load several logs laid out back to back from `start`
pub fn load_all<S: NvmStore>(
    logs: &mut [&mut FaultLog],
    store: &S,
    start: usize,
) -> Result<usize, CodecError> {
    let mut p = start;
    for log in logs.iter_mut() {
        let (end, _) = log.load(store, p)?;
        p = end;
    }
    Ok(p)
}

/// Blank several regions laid out back to back from `start`
pub fn clear_all<S: NvmStore>(
    logs: &[&FaultLog],
    store: &mut S,
    start: usize,
) -> Result<usize, CodecError> {
    let mut p = start;
    for log in logs {
        p = log.clear_nvm(store, p)?;
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvm_storage::MemoryNvm;

    /// Store whose cells at and beyond `stuck_from` ignore writes
    struct StuckNvm {
        inner: MemoryNvm,
        stuck_from: usize,
    }

    impl NvmStore for StuckNvm {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
            self.inner.read(offset, buf)
        }

        fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
            if offset >= self.stuck_from {
                return Ok(());
            }
            self.inner.write(offset, data)
        }
    }

    fn populated(capacity: usize, codes: &[u32]) -> FaultLog {
        let mut log = FaultLog::with_capacity("faults", capacity).unwrap();
        for (i, &code) in codes.iter().enumerate() {
            log.record(1_600_000_000 + i as u32, code);
        }
        log
    }

    fn contents(log: &FaultLog) -> Vec<(u32, u32, bool)> {
        log.iter().map(|r| (r.timestamp, r.code, r.active)).collect()
    }

    #[test]
    fn test_save_returns_end_offset() {
        let log = populated(4, &[1, 2]);
        let mut nvm = MemoryNvm::new(256);

        let end = log.save(&mut nvm, 16).unwrap();
        assert_eq!(end, 16 + 12 + 4 * 9);
        assert_eq!(end, 16 + log.region_len());
        assert_eq!(nvm.get::<i32>(16).unwrap(), 0);
        assert_eq!(nvm.get::<i32>(20).unwrap(), 1);
        assert_eq!(nvm.get::<i32>(24).unwrap(), 4);
    }

    #[test]
    fn test_round_trip_wrapped_log() {
        let mut log = populated(3, &[10, 20, 30, 40, 50]);
        log.mark_all_cleared();
        log.record(1_700_000_000, 60);
        let mut nvm = MemoryNvm::new(128);
        log.save(&mut nvm, 0).unwrap();

        let mut restored = FaultLog::with_capacity("faults", 3).unwrap();
        let (end, outcome) = restored.load(&nvm, 0).unwrap();

        assert_eq!(outcome, LoadOutcome::Restored);
        assert_eq!(end, log.region_len());
        assert_eq!(contents(&restored), contents(&log));
        assert_eq!(restored.head(), log.head());
        assert_eq!(restored.tail(), log.tail());
    }

    #[test]
    fn test_round_trip_empty_log() {
        let log = FaultLog::with_capacity("faults", 2).unwrap();
        let mut nvm = MemoryNvm::new(64);
        log.save(&mut nvm, 0).unwrap();

        let mut restored = populated(2, &[5]);
        let (_, outcome) = restored.load(&nvm, 0).unwrap();
        assert_eq!(outcome, LoadOutcome::Restored);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_capacity_mismatch_leaves_log_untouched() {
        let log = populated(4, &[1, 2, 3]);
        let mut nvm = MemoryNvm::new(128);
        log.save(&mut nvm, 0).unwrap();

        let mut other = populated(5, &[9]);
        let (end, outcome) = other.load(&nvm, 0).unwrap();

        assert_eq!(outcome, LoadOutcome::Uninitialized);
        assert_eq!(end, other.region_len());
        assert_eq!(contents(&other), vec![(1_600_000_000, 9, true)]);
    }

    #[test]
    fn test_erased_region_is_uninitialized() {
        let nvm = MemoryNvm::new(128);
        let mut log = FaultLog::with_capacity("faults", 4).unwrap();
        let (end, outcome) = log.load(&nvm, 8).unwrap();
        assert_eq!(outcome, LoadOutcome::Uninitialized);
        assert_eq!(end, 8 + log.region_len());
        assert!(log.is_empty());
    }

    #[test]
    fn test_inconsistent_span_is_uninitialized() {
        let mut nvm = MemoryNvm::new(128);
        nvm.put(0, &-1i32).unwrap();
        nvm.put(4, &2i32).unwrap();
        nvm.put(8, &4i32).unwrap();

        let mut log = FaultLog::with_capacity("faults", 4).unwrap();
        let (_, outcome) = log.load(&nvm, 0).unwrap();
        assert_eq!(outcome, LoadOutcome::Uninitialized);

        nvm.put(0, &4i32).unwrap();
        let (_, outcome) = log.load(&nvm, 0).unwrap();
        assert_eq!(outcome, LoadOutcome::Uninitialized);
    }

    #[test]
    fn test_truncated_image_leaves_log_untouched() {
        let log = populated(3, &[1, 2, 3]);
        let mut nvm = MemoryNvm::new(128);
        log.save(&mut nvm, 0).unwrap();
        let kept = HEADER_LEN + FaultRecord::SIZE;
        let truncated = MemoryNvm::from_bytes(nvm.as_bytes()[..kept].to_vec());

        let mut target = FaultLog::with_capacity("faults", 3).unwrap();
        target.record(900, 9);
        let before = contents(&target);

        assert!(matches!(
            target.load(&truncated, 0),
            Err(CodecError::Storage(StorageError::OutOfBounds { .. }))
        ));
        assert_eq!(contents(&target), before);
        assert_eq!(target.raw_at(1).unwrap(), FaultRecord::EMPTY);
    }

    #[test]
    fn test_persistence_disabled_skips_write() {
        let mut log = populated(2, &[1]);
        log.set_persistence_enabled(false);
        let mut nvm = MemoryNvm::new(64);

        assert_eq!(log.save(&mut nvm, 10).unwrap(), 10);
        assert!(nvm.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_verification_failure_reported() {
        let log = populated(3, &[1, 2, 3]);
        let mut nvm = StuckNvm {
            inner: MemoryNvm::new(128),
            stuck_from: 20,
        };

        match log.save(&mut nvm, 0) {
            Err(CodecError::VerifyMismatch { offset, .. }) => assert_eq!(offset, 12 + 9),
            other => panic!("expected verification failure, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_nvm_blanks_region() {
        let log = populated(3, &[1, 2]);
        let mut nvm = MemoryNvm::new(128);
        log.save(&mut nvm, 0).unwrap();

        let end = log.clear_nvm(&mut nvm, 0).unwrap();
        assert_eq!(end, log.region_len());
        assert_eq!(log.occupied_count(), 2);

        let mut restored = populated(3, &[7]);
        let (_, outcome) = restored.load(&nvm, 0).unwrap();
        assert_eq!(outcome, LoadOutcome::Restored);
        assert!(restored.is_empty());
        assert!(restored.raw_at(0).unwrap().same_contents(&FaultRecord::EMPTY));
    }

    #[test]
    fn test_clear_nvm_verification_failure() {
        let log = populated(2, &[1]);
        let mut nvm = StuckNvm {
            inner: MemoryNvm::new(64),
            stuck_from: 0,
        };
        assert!(matches!(
            log.clear_nvm(&mut nvm, 0),
            Err(CodecError::VerifyMismatch { offset: 8, .. })
        ));
    }

    #[test]
    fn test_region_past_store_end() {
        let log = populated(8, &[1]);
        let mut nvm = MemoryNvm::new(32);
        assert!(matches!(
            log.save(&mut nvm, 0),
            Err(CodecError::Storage(StorageError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_chained_logs() {
        let faults = populated(3, &[100, 200]);
        let jumpers = populated(2, &[7]);
        let mut nvm = MemoryNvm::new(256);

        let end = save_all(&[&faults, &jumpers], &mut nvm, 4).unwrap();
        assert_eq!(end, 4 + faults.region_len() + jumpers.region_len());

        let mut f2 = FaultLog::with_capacity("faults", 3).unwrap();
        let mut j2 = FaultLog::with_capacity("jumpers", 2).unwrap();
        let loaded_end = load_all(&mut [&mut f2, &mut j2], &nvm, 4).unwrap();

        assert_eq!(loaded_end, end);
        assert_eq!(contents(&f2), contents(&faults));
        assert_eq!(contents(&j2), contents(&jumpers));
    }

    #[test]
    fn test_chain_skips_disabled_region() {
        let mut faults = populated(3, &[100]);
        faults.set_persistence_enabled(false);
        let jumpers = populated(2, &[7]);
        let mut nvm = MemoryNvm::new(256);

        let end = save_all(&[&faults, &jumpers], &mut nvm, 0).unwrap();
        assert_eq!(end, faults.region_len() + jumpers.region_len());

        let mut f2 = FaultLog::with_capacity("faults", 3).unwrap();
        let mut j2 = FaultLog::with_capacity("jumpers", 2).unwrap();
        load_all(&mut [&mut f2, &mut j2], &nvm, 0).unwrap();
        assert!(f2.is_empty());
        assert_eq!(contents(&j2), contents(&jumpers));
    }

    #[test]
    fn test_clear_all_chain() {
        let faults = populated(3, &[100]);
        let jumpers = populated(2, &[7]);
        let mut nvm = MemoryNvm::new(256);
        save_all(&[&faults, &jumpers], &mut nvm, 0).unwrap();

        let end = clear_all(&[&faults, &jumpers], &mut nvm, 0).unwrap();
        assert_eq!(end, faults.region_len() + jumpers.region_len());
        assert_eq!(nvm.get::<i32>(faults.region_len()).unwrap(), -1);
    }
}
