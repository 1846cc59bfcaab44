mod parser;

pub use parser::parse_snapshot;
use serde::Serialize;
use thiserror::Error;

/// One GPU as reported by the query tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Zero-based position among the devices of the snapshot
    pub index: u32,
    pub uuid: String,
    pub name: String,
    pub memory_total_mib: Option<u64>,
    pub memory_used_mib: Option<u64>,
    pub utilization_percent: Option<u8>,
    pub temperature_celsius: Option<u32>,
}

/// One compute process holding memory on one GPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessUsage {
    pub device_index: u32,
    /// `None` when the process vanished before its owner could be read
    pub owner_id: Option<u32>,
    pub memory_used_mib: Option<u64>,
    pub pid: u32,
    pub name: Option<String>,
}

/// Everything the query tool reported for one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Always `devices.len()`, valid indices are `0..device_count`
    pub device_count: usize,
    pub devices: Vec<Device>,
    pub processes: Vec<ProcessUsage>,
}

impl Snapshot {
    pub fn processes_on(&self, device_index: u32) -> impl Iterator<Item = &ProcessUsage> {
        self.processes
            .iter()
            .filter(move |process| process.device_index == device_index)
    }
}

/// The raw text has nothing usable in it, the whole cycle is skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed GPU query output: {0}")]
    MalformedOutput(String),
}

/// A single device or process line could not be converted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    MissingFields { expected: usize, found: usize },
    #[error("missing value for {0}")]
    MissingValue(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("GPU {0} is listed twice")]
    DuplicateDevice(String),
    #[error("no GPU with UUID {0}")]
    UnknownDevice(String),
}
