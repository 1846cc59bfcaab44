use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;

/// The implementer maps a pid to the uid owning it, useful for mocking in tests
#[cfg_attr(test, automock)]
pub trait ProcessOwners {
    fn owner_of(&self, pid: u32) -> Option<u32>;
}

/// Reads process owners from the `/proc` filesystem (by default): `/proc/<pid>`
/// belongs to the process' uid.
pub struct ProcFsOwners {
    proc_path: PathBuf,
}

impl ProcFsOwners {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: path.into(),
        }
    }
}

impl ProcessOwners for ProcFsOwners {
    fn owner_of(&self, pid: u32) -> Option<u32> {
        fs::metadata(self.proc_path.join(pid.to_string()))
            .ok()
            .map(|metadata| metadata.uid())
    }
}
