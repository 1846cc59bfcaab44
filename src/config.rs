use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonlToStdoutConfig {
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Terminal,
    JsonlToStdout(JsonlToStdoutConfig),
}

impl OutputMode {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutputMode::Terminal)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputMode::Terminal => "terminal",
            OutputMode::JsonlToStdout(_) => "jsonl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    NvidiaSmi { program: PathBuf },
    Replay { dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub sentry_dsn: Option<String>,
    pub cluster_name: String,
    pub refresh_interval: Duration,
    pub output_mode: OutputMode,
    pub query_source: QuerySource,
    pub proc_root: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(var: F) -> anyhow::Result<Self> {
        Ok(Config {
            sentry_dsn: var("SENTRY_DSN"),
            cluster_name: var("CLUSTER_NAME").unwrap_or_else(|| "Unknown".to_string()),
            refresh_interval: get_refresh_interval(&var),
            output_mode: get_output_mode(&var)?,
            query_source: get_query_source(&var),
            proc_root: var("NVTOP_PROC_ROOT")
                .unwrap_or_else(|| "/proc".to_string())
                .into(),
        })
    }
}

fn get_refresh_interval<F: Fn(&str) -> Option<String>>(var: &F) -> Duration {
    let ms = var("NVTOP_REFRESH_INTERVAL_MS")
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(1000);
    Duration::from_millis(ms)
}

fn get_output_mode<F: Fn(&str) -> Option<String>>(var: &F) -> anyhow::Result<OutputMode> {
    match var("NVTOP_OUTPUT_MODE").as_deref() {
        Some("terminal") | None => Ok(OutputMode::Terminal),
        Some("jsonl") => {
            let prefix = var("NVTOP_OUTPUT_PREFIX").unwrap_or_default();
            Ok(OutputMode::JsonlToStdout(JsonlToStdoutConfig { prefix }))
        }
        Some(other) => Err(anyhow::anyhow!("Invalid NVTOP_OUTPUT_MODE: {other}.")),
    }
}

fn get_query_source<F: Fn(&str) -> Option<String>>(var: &F) -> QuerySource {
    match var("NVTOP_REPLAY_DIR") {
        Some(dir) => QuerySource::Replay { dir: dir.into() },
        None => QuerySource::NvidiaSmi {
            program: var("NVTOP_NVIDIA_SMI")
                .unwrap_or_else(|| "nvidia-smi".to_string())
                .into(),
        },
    }
}
