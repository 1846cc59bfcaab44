use crate::filter::{DEFAULT_EXCLUDED_OWNERS, DisplayOptions};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::process;

const COLORS_HELP: &str = "\
What do the colors mean?
  The graphs are green when there is low usage, and turn red when they are 80% full or more.
  The processes are blue when they are associated with your user name, which helps to
  distinguish scripts and programs run by yourself.

To quit nvtop, press CTRL-C.";

/// Equivalent of the Linux `top` command for NVIDIA GPUs.
#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(name = "nvtop", disable_version_flag = true, after_help = COLORS_HELP)]
pub struct Cli {
    /// Make the view more compact by leaving out the graphs of the current GPU usage
    #[arg(short, long)]
    pub compact: bool,

    /// Only show the tables for these GPUs, e.g. -g=1 or -g=1,2
    #[arg(
        short = 'g',
        long = "gpus",
        value_name = "IDS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub gpus: Vec<String>,

    /// Also show processes of system accounts (root, gdm)
    #[arg(short, long)]
    pub all: bool,

    /// Tokens dropped because they were not understood
    #[arg(skip)]
    pub ignored_arguments: Vec<String>,
}

/// Parse the command line. Help anywhere on the line prints usage and exits with
/// status 0. Tokens clap does not accept are dropped one at a time and kept in
/// `ignored_arguments`, so the rest of the line still applies.
pub fn parse_args<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if let Some(flag) = args.iter().skip(1).find_map(help_flag) {
        print_help_and_exit(flag);
    }

    let mut ignored_arguments = Vec::new();
    loop {
        match Cli::try_parse_from(args.iter().cloned()) {
            Ok(cli) => {
                return Cli {
                    ignored_arguments,
                    ..cli
                };
            }
            Err(err) if err.kind() == ErrorKind::DisplayHelp => err.exit(),
            Err(err) => match offending_position(&args, &err) {
                Some(position) => {
                    ignored_arguments.push(args.remove(position).to_string_lossy().into_owned())
                }
                None => {
                    ignored_arguments.extend(
                        args.iter()
                            .skip(1)
                            .map(|arg| arg.to_string_lossy().into_owned()),
                    );
                    return Cli {
                        ignored_arguments,
                        ..Cli::default()
                    };
                }
            },
        }
    }
}

fn help_flag(arg: &OsString) -> Option<&'static str> {
    match arg.to_str() {
        Some("-h") => Some("-h"),
        Some("--help") => Some("--help"),
        _ => None,
    }
}

fn print_help_and_exit(flag: &str) -> ! {
    let mut command = Cli::command();
    let printed = if flag == "--help" {
        command.print_long_help()
    } else {
        command.print_help()
    };
    process::exit(if printed.is_ok() { 0 } else { 1 })
}

/// Position in `args` of the token clap rejected, if it can be pinned down.
fn offending_position(args: &[OsString], err: &clap::Error) -> Option<usize> {
    let Some(ContextValue::String(invalid)) = err.get(ContextKind::InvalidArg) else {
        return None;
    };
    let with_value = format!("{invalid}=");

    args.iter()
        .skip(1)
        .position(|arg| {
            let arg = arg.to_string_lossy();
            arg == invalid.as_str() || arg.starts_with(&with_value)
        })
        .map(|position| position + 1)
}

impl Cli {
    pub fn display_options(&self) -> DisplayOptions {
        let excluded_owners = if self.all {
            BTreeSet::new()
        } else {
            DEFAULT_EXCLUDED_OWNERS
                .iter()
                .map(|name| name.to_string())
                .collect()
        };

        let mut selected_devices = BTreeSet::new();
        let mut unparsable_devices = Vec::new();
        for id in self.gpus.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            match id.parse::<i64>() {
                Ok(index) => {
                    selected_devices.insert(index);
                }
                Err(_) => unparsable_devices.push(id.to_string()),
            }
        }

        DisplayOptions {
            compact: self.compact,
            excluded_owners,
            selected_devices,
            unparsable_devices,
            ignored_arguments: self.ignored_arguments.clone(),
        }
    }
}
