use nvtop::cli;
use nvtop::config::Config;
use std::{env, io, process};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

fn main() {
    // before anything else, `--help` must not depend on a working environment
    let cli = cli::parse_args(env::args_os());
    let config = Config::from_env();

    // warnings interleave with the tables on stdout, unless stdout carries JSON
    let to_stdout = config
        .as_ref()
        .map(|config| config.output_mode.is_terminal())
        .unwrap_or(true);
    init_tracing(to_stdout);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            process::exit(1);
        }
    };

    let sentry_guard = init_sentry(&config);
    if sentry_guard.is_some() {
        info!("Sentry initialized");
    }

    let options = cli.display_options();

    if let Err(e) = nvtop::run_nvtop(&config, &options) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn init_tracing(to_stdout: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let writer = if to_stdout {
        BoxMakeWriter::new(io::stdout)
    } else {
        BoxMakeWriter::new(io::stderr)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .with(sentry_tracing::layer())
        .init();
}

fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.clone()?;
    let release = sentry::release_name!();
    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release,
            ..Default::default()
        },
    ));

    sentry::configure_scope(|scope| {
        scope.set_tag("cluster.name", &config.cluster_name);
        scope.set_tag("output.mode", config.output_mode.name());
    });

    Some(guard)
}
