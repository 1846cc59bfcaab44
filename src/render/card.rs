use super::text::{fit_left, fit_right, mebibytes};
use super::{Line, Span, Style};
use crate::filter::{DeviceView, DisplayOptions, FilteredView, ProcessRow};
use crate::snapshot::Device;

const PID_WIDTH: usize = 7;
const OWNER_WIDTH: usize = 12;
const MEMORY_WIDTH: usize = 10;
const COMMAND_WIDTH: usize = 36;

/// "| " + four columns joined by " | " + " |"
pub const TABLE_WIDTH: usize = PID_WIDTH + OWNER_WIDTH + MEMORY_WIDTH + COMMAND_WIDTH + 13;

const LABEL_WIDTH: usize = 8;
const BAR_WIDTH: usize = 40;
/// "| " + label + " [" + bar + "] " + value + " |"
const VALUE_WIDTH: usize = TABLE_WIDTH - LABEL_WIDTH - BAR_WIDTH - 8;

const BAR_FILL: &str = "|";
const WARNING_PERCENT: u64 = 80;
const NO_PROCESSES: &str = "No running processes";
const QUIT_HINT: &str = " Press CTRL-C to quit ---";

/// Render every device card of the view followed by the footer.
pub fn render(view: &FilteredView, options: &DisplayOptions) -> Vec<Line> {
    let mut lines = Vec::new();
    for device_view in &view.devices {
        lines.push(title_line(device_view.device));
        if !options.compact {
            lines.extend(header_block(device_view.device));
        }
        lines.extend(process_block(device_view));
    }
    lines.push(footer_line());
    lines
}

fn title_line(device: &Device) -> Line {
    let temperature = match device.temperature_celsius {
        Some(celsius) => format!("{celsius}°C"),
        None => "N/A".to_string(),
    };
    let status = format!("{:>6}   {} util", temperature, percent(device.utilization_percent));
    let name = format!("GPU {}: {}", device.index, device.name);

    Line::new(vec![
        Span::styled(
            fit_left(&name, TABLE_WIDTH - status.chars().count()),
            Style::Bold,
        ),
        Span::plain(status),
    ])
}

fn header_block(device: &Device) -> Vec<Line> {
    let utilization = device.utilization_percent.map(|p| (u64::from(p), 100));
    let memory = match (device.memory_used_mib, device.memory_total_mib) {
        (Some(used), Some(total)) => Some((used, total)),
        _ => None,
    };
    let memory_text = match (device.memory_used_mib, device.memory_total_mib) {
        (Some(used), Some(total)) => format!("{used} / {total} MiB"),
        (used, total) => format!("{} / {}", mebibytes(used), mebibytes(total)),
    };

    vec![
        plain_rule(),
        bar_line("GPU", utilization, &percent(device.utilization_percent)),
        bar_line("Memory", memory, &memory_text),
    ]
}

fn process_block(device_view: &DeviceView) -> Vec<Line> {
    let mut lines = vec![
        table_rule(),
        Line::new(vec![Span::styled(
            table_row("PID", "USER", "GPU MEM", "COMMAND"),
            Style::Bold,
        )]),
        table_rule(),
    ];

    if device_view.processes.is_empty() {
        lines.push(Line::new(vec![Span::plain(format!(
            "| {} |",
            fit_left(NO_PROCESSES, TABLE_WIDTH - 4)
        ))]));
    } else {
        lines.extend(device_view.processes.iter().map(process_line));
    }

    lines.push(table_rule());
    lines
}

fn process_line(row: &ProcessRow) -> Line {
    let style = if row.owner.is_current_user {
        Style::SelfOwned
    } else {
        Style::OtherOwned
    };
    let command = row.usage.name.as_deref().unwrap_or("N/A");

    Line::new(vec![Span::styled(
        table_row(
            &row.usage.pid.to_string(),
            &row.owner.name,
            &mebibytes(row.usage.memory_used_mib),
            command,
        ),
        style,
    )])
}

fn footer_line() -> Line {
    Line::new(vec![Span::styled(
        format!("{}{}", "-".repeat(TABLE_WIDTH - QUIT_HINT.len()), QUIT_HINT),
        Style::Bold,
    )])
}

fn table_row(pid: &str, owner: &str, memory: &str, command: &str) -> String {
    format!(
        "| {} | {} | {} | {} |",
        fit_right(pid, PID_WIDTH),
        fit_left(owner, OWNER_WIDTH),
        fit_right(memory, MEMORY_WIDTH),
        fit_left(command, COMMAND_WIDTH)
    )
}

fn table_rule() -> Line {
    let segments: Vec<String> = [PID_WIDTH, OWNER_WIDTH, MEMORY_WIDTH, COMMAND_WIDTH]
        .iter()
        .map(|width| "-".repeat(width + 2))
        .collect();
    Line::new(vec![Span::plain(format!("+{}+", segments.join("+")))])
}

fn plain_rule() -> Line {
    Line::new(vec![Span::plain(format!("+{}+", "-".repeat(TABLE_WIDTH - 2)))])
}

/// A labelled bar filled in proportion to `usage` = (used, capacity).
fn bar_line(label: &str, usage: Option<(u64, u64)>, value: &str) -> Line {
    let (filled, style) = match usage {
        Some((used, capacity)) => (bar_fill(used, capacity), usage_style(used, capacity)),
        None => (0, Style::Safe),
    };

    Line::new(vec![
        Span::plain(format!("| {} [", fit_left(label, LABEL_WIDTH))),
        Span::styled(BAR_FILL.repeat(filled), style),
        Span::plain(" ".repeat(BAR_WIDTH - filled)),
        Span::plain(format!("] {} |", fit_left(value, VALUE_WIDTH))),
    ])
}

fn bar_fill(used: u64, capacity: u64) -> usize {
    if capacity == 0 {
        return 0;
    }
    let used = used.min(capacity);
    let filled = (used.saturating_mul(BAR_WIDTH as u64) + capacity / 2) / capacity;
    filled as usize
}

/// `Warning` from 80% of capacity upwards, compared without floating point.
fn usage_style(used: u64, capacity: u64) -> Style {
    if capacity > 0 && used.saturating_mul(100) >= capacity.saturating_mul(WARNING_PERCENT) {
        Style::Warning
    } else {
        Style::Safe
    }
}

fn percent(value: Option<u8>) -> String {
    match value {
        Some(p) => format!("{p}%"),
        None => "N/A".to_string(),
    }
}
