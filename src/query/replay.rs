use super::GpuQueryProvider;
use std::fs;
use std::io;
use std::path::PathBuf;

const DEVICES_FILE: &str = "gpus.csv";
const PROCESSES_FILE: &str = "apps.csv";

/// Serves previously captured query output from a directory, for machines without GPUs.
pub struct ReplayReader {
    dir: PathBuf,
}

impl ReplayReader {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn read(&self, file_name: &str) -> io::Result<String> {
        let path = self.dir.join(file_name);
        fs::read_to_string(&path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to read {}: {e}", path.display()),
            )
        })
    }
}

impl GpuQueryProvider for ReplayReader {
    fn query_devices(&self) -> io::Result<String> {
        self.read(DEVICES_FILE)
    }

    fn query_processes(&self) -> io::Result<String> {
        self.read(PROCESSES_FILE)
    }
}
