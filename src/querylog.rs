//! Query records and the log collaborator they are handed to.

use hickory_proto::rr::RecordType;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::error::LogWriteError;

/// One handled query. Built once and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub name: String,
    pub record_type: RecordType,
    pub client: IpAddr,
    pub blocked: bool,
    pub cached: bool,
    pub latency: Duration,
    pub timestamp: SystemTime,
}

/// Sink for query records. Implementations own persistence.
pub trait QueryLog: Send + Sync {
    fn write(&self, record: QueryRecord) -> Result<(), LogWriteError>;
}

/// Bounded in-memory log; the oldest record is dropped when full.
pub struct MemoryQueryLog {
    records: Mutex<VecDeque<QueryRecord>>,
    capacity: usize,
}

impl MemoryQueryLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        }
    }

    /// Snapshot of the stored records, oldest first.
    pub fn records(&self) -> Vec<QueryRecord> {
        self.records
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueryLog for MemoryQueryLog {
    fn write(&self, record: QueryRecord) -> Result<(), LogWriteError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut records = self.records.lock().map_err(|_| LogWriteError::Unavailable)?;
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);

        Ok(())
    }
}
