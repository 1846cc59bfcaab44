use crate::config::OutputMode;
use crate::filter::{DeviceView, DisplayOptions, FilteredView};
use crate::render;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use serde::Serialize;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Debug)]
pub struct ReportEntry<'a> {
    pub time: f64,
    pub devices: &'a [DeviceView<'a>],
}

impl<'a> ReportEntry<'a> {
    pub fn new(view: &'a FilteredView<'a>) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        ReportEntry {
            time: now,
            devices: &view.devices,
        }
    }
}

/// Where each refresh cycle ends up: a redrawn terminal or one JSON line.
pub struct Output<W: Write> {
    writer: W,
    mode: OutputMode,
}

impl<W: Write> Output<W> {
    pub fn new(writer: W, mode: OutputMode) -> Self {
        Self { writer, mode }
    }

    /// Called before parsing so warnings of this cycle show above its tables.
    pub fn begin_cycle(&mut self) -> io::Result<()> {
        if self.mode.is_terminal() {
            queue!(self.writer, Clear(ClearType::All), MoveTo(0, 0))?;
            self.writer.flush()?;
        }
        Ok(())
    }

    pub fn write_view(&mut self, view: &FilteredView, options: &DisplayOptions) -> io::Result<()> {
        match &self.mode {
            OutputMode::Terminal => {
                let lines = render::render(view, options);
                self.writer.write_all(render::paint(&lines).as_bytes())?;
            }
            OutputMode::JsonlToStdout(config) => {
                let as_json = serde_json::to_string(&ReportEntry::new(view))?;
                writeln!(self.writer, "{}{}", config.prefix, as_json)?;
            }
        }
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
