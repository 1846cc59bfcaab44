use super::{Device, ParseError, ProcessUsage, RecordError, Snapshot};
use crate::owner::ProcessOwners;
use crate::query::RawQuery;
use tracing::{debug, warn};

// count, index, uuid, memory.total [MiB], memory.used [MiB], utilization.gpu [%], temperature.gpu [C], name
// e.g. "2, 0, GPU-5d1c..., 16384, 8000, 85, 67, Tesla V100-SXM2-16GB"
const DEVICE_FIELDS: usize = 8;

// gpu_uuid, pid, used_memory [MiB], process_name
// e.g. "GPU-5d1c..., 4242, 2048, python"
const PROCESS_FIELDS: usize = 4;

const NO_PROCESSES_MESSAGE: &str = "No running processes found";

/// Build a snapshot from the captured device and process listings.
///
/// Only a device listing without any parsable device count fails the whole parse.
/// Lines that cannot be converted are dropped with a warning, so a single odd
/// record never hides the rest of the machine.
pub fn parse_snapshot<O: ProcessOwners + ?Sized>(
    raw: &RawQuery,
    owners: &O,
) -> Result<Snapshot, ParseError> {
    let mut reported_count = None;
    let mut devices: Vec<Device> = Vec::new();

    for line in data_lines(&raw.devices, "count,") {
        let fields = split_fields(line, DEVICE_FIELDS);
        if reported_count.is_none() {
            reported_count = fields[0].parse::<usize>().ok();
        }

        let position = u32::try_from(devices.len()).unwrap_or(u32::MAX);
        match parse_device(&fields, position) {
            Ok(device) if devices.iter().any(|d| d.uuid == device.uuid) => {
                warn!(
                    "Dropping GPU line {:?}: {}",
                    line,
                    RecordError::DuplicateDevice(device.uuid)
                );
            }
            Ok(device) => devices.push(device),
            Err(e) => warn!("Dropping GPU line {:?}: {}", line, e),
        }
    }

    let reported_count = reported_count.ok_or_else(|| {
        ParseError::MalformedOutput("no line with a device count in the GPU listing".to_string())
    })?;

    let mut processes = Vec::new();
    for line in data_lines(&raw.processes, "gpu_uuid,") {
        if line.starts_with(NO_PROCESSES_MESSAGE) {
            continue;
        }

        match parse_process(&split_fields(line, PROCESS_FIELDS), &devices) {
            Ok((device_index, pid, memory_used_mib, name)) => processes.push(ProcessUsage {
                device_index,
                owner_id: owners.owner_of(pid),
                memory_used_mib,
                pid,
                name,
            }),
            Err(e) => warn!("Dropping process line {:?}: {}", line, e),
        }
    }

    debug!(
        "Parsed {} of {} GPUs and {} processes",
        devices.len(),
        reported_count,
        processes.len()
    );

    Ok(Snapshot {
        device_count: devices.len(),
        devices,
        processes,
    })
}

/// `position` becomes the device index, the tool's own index column only has to parse.
fn parse_device(fields: &[&str], position: u32) -> Result<Device, RecordError> {
    if fields.len() < DEVICE_FIELDS {
        return Err(RecordError::MissingFields {
            expected: DEVICE_FIELDS,
            found: fields.len(),
        });
    }

    let reported_index = required_number("index", fields[1])?;
    if reported_index != u64::from(position) {
        warn!("GPU listed as index {reported_index} is shown as GPU {position}");
    }
    let uuid = fields[2];
    if is_absent(uuid) {
        return Err(RecordError::MissingValue("uuid"));
    }

    let memory_total_mib = optional_number("memory.total", fields[3])?;
    let mut memory_used_mib = optional_number("memory.used", fields[4])?;
    if let (Some(used), Some(total)) = (memory_used_mib, memory_total_mib) {
        if used > total {
            warn!("GPU {position} reports {used} MiB used of {total} MiB, clamping");
            memory_used_mib = Some(total);
        }
    }

    let utilization_percent = match optional_number("utilization.gpu", fields[5])? {
        Some(percent) if percent > 100 => {
            return Err(RecordError::InvalidNumber {
                field: "utilization.gpu",
                value: fields[5].to_string(),
            });
        }
        percent => percent.map(|p| p as u8),
    };

    let name = if is_absent(fields[7]) {
        "Unknown GPU".to_string()
    } else {
        fields[7].to_string()
    };

    Ok(Device {
        index: position,
        uuid: uuid.to_string(),
        name,
        memory_total_mib,
        memory_used_mib,
        utilization_percent,
        temperature_celsius: optional_number("temperature.gpu", fields[6])?
            .map(|t| to_u32("temperature.gpu", fields[6], t))
            .transpose()?,
    })
}

type ProcessFields = (u32, u32, Option<u64>, Option<String>);

fn parse_process(fields: &[&str], devices: &[Device]) -> Result<ProcessFields, RecordError> {
    if fields.len() < PROCESS_FIELDS {
        return Err(RecordError::MissingFields {
            expected: PROCESS_FIELDS,
            found: fields.len(),
        });
    }

    let device_index = devices
        .iter()
        .find(|device| device.uuid == fields[0])
        .map(|device| device.index)
        .ok_or_else(|| RecordError::UnknownDevice(fields[0].to_string()))?;

    let pid = required_number("pid", fields[1])?;
    let name = (!is_absent(fields[3])).then(|| fields[3].to_string());

    Ok((
        device_index,
        to_u32("pid", fields[1], pid)?,
        optional_number("used_memory", fields[2])?,
        name,
    ))
}

/// Non-empty lines that are not a CSV header.
fn data_lines<'a>(text: &'a str, header_prefix: &'a str) -> impl Iterator<Item = &'a str> {
    text.lines()
        .map(str::trim)
        .filter(move |line| !line.is_empty() && !line.starts_with(header_prefix))
}

/// Split on a comma followed by whitespace (or ending the line), which is how the
/// tool separates columns. A bare comma is kept inside the field so "12,5" survives
/// as a decimal. The last field takes the rest of the line, names may contain
/// separators.
fn split_fields(line: &str, max_fields: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max_fields);
    let mut rest = line;

    while fields.len() + 1 < max_fields {
        let separator = rest
            .match_indices(',')
            .map(|(i, _)| i)
            .find(|&i| rest[i + 1..].chars().next().is_none_or(char::is_whitespace));
        let Some(i) = separator else {
            break;
        };
        fields.push(rest[..i].trim());
        rest = &rest[i + 1..];
    }

    fields.push(rest.trim());
    fields
}

fn is_absent(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.eq_ignore_ascii_case("N/A")
        || (value.starts_with('[') && value.ends_with(']'))
}

fn required_number(field: &'static str, value: &str) -> Result<u64, RecordError> {
    optional_number(field, value)?.ok_or(RecordError::MissingValue(field))
}

/// Parse a non-negative number, rounding fractions. Unit suffixes are ignored and
/// either `.` or `,` is accepted as the decimal separator.
fn optional_number(field: &'static str, value: &str) -> Result<Option<u64>, RecordError> {
    if is_absent(value) {
        return Ok(None);
    }

    let number = value
        .trim()
        .trim_end_matches(|c: char| c.is_alphabetic() || c == '%' || c == '°')
        .trim()
        .replace(',', ".");

    match number.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 && n <= u64::MAX as f64 => Ok(Some(n.round() as u64)),
        _ => Err(RecordError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn to_u32(field: &'static str, raw: &str, value: u64) -> Result<u32, RecordError> {
    u32::try_from(value).map_err(|_| RecordError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}
