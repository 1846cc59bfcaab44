mod replay;

pub use replay::ReplayReader;
use crate::config::QuerySource;
use std::io;
use std::path::PathBuf;
use std::process::Command;

#[cfg(test)]
use mockall::automock;
use tracing::debug;

const DEVICE_QUERY: &str = "--query-gpu=count,index,uuid,memory.total,memory.used,utilization.gpu,temperature.gpu,name";
const PROCESS_QUERY: &str = "--query-compute-apps=gpu_uuid,pid,used_memory,process_name";
const CSV_FORMAT: &str = "--format=csv,noheader,nounits";

/// The text captured from the GPU query tool for one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    pub devices: String,
    pub processes: String,
}

/// The implementer provides query tool output from somewhere, useful for mocking in tests
#[cfg_attr(test, automock)]
pub trait GpuQueryProvider {
    fn query_devices(&self) -> io::Result<String>;
    fn query_processes(&self) -> io::Result<String>;
}

/// Capture both listings. Only the device listing is required: a failed process
/// query leaves the process listing empty and is handed back next to it.
pub fn capture<P: GpuQueryProvider + ?Sized>(
    provider: &P,
) -> io::Result<(RawQuery, Option<io::Error>)> {
    let devices = provider.query_devices()?;
    let (processes, process_error) = match provider.query_processes() {
        Ok(processes) => (processes, None),
        Err(e) => (String::new(), Some(e)),
    };

    Ok((RawQuery { devices, processes }, process_error))
}

pub fn provider_for(source: &QuerySource) -> Box<dyn GpuQueryProvider> {
    match source {
        QuerySource::NvidiaSmi { program } => {
            debug!("Querying GPUs with {:?}", program);
            Box::new(NvidiaSmiExecutor::new(program.clone()))
        }
        QuerySource::Replay { dir } => {
            debug!("Replaying captured GPU output from {:?}", dir);
            Box::new(ReplayReader::new(dir.clone()))
        }
    }
}

/// The default provider, runs `nvidia-smi`.
pub struct NvidiaSmiExecutor {
    program: PathBuf,
}

impl NvidiaSmiExecutor {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn run(&self, query: &str) -> io::Result<String> {
        let output = Command::new(&self.program)
            .args([query, CSV_FORMAT])
            .output()
            .map_err(|e| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Failed to run {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with non-zero status: {}. stderr: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl GpuQueryProvider for NvidiaSmiExecutor {
    fn query_devices(&self) -> io::Result<String> {
        self.run(DEVICE_QUERY)
    }

    fn query_processes(&self) -> io::Result<String> {
        self.run(PROCESS_QUERY)
    }
}
