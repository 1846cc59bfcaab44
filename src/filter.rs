use crate::owner::{Owner, OwnershipResolver, UserLookup};
use crate::snapshot::{Device, ProcessUsage, Snapshot};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// System accounts hidden from process tables unless `-a` is given.
pub const DEFAULT_EXCLUDED_OWNERS: [&str; 2] = ["root", "gdm"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    pub compact: bool,
    pub excluded_owners: BTreeSet<String>,
    /// Empty means every device
    pub selected_devices: BTreeSet<i64>,
    /// `-g` entries that are not numbers, reported every cycle
    pub unparsable_devices: Vec<String>,
    /// Command line tokens that were dropped, reported every cycle
    pub ignored_arguments: Vec<String>,
}

impl DisplayOptions {
    pub fn with_default_exclusions() -> Self {
        Self {
            excluded_owners: DEFAULT_EXCLUDED_OWNERS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidSelection {
    #[error("Invalid GPU id number: {index} (valid ids are 0 to {})", .device_count.saturating_sub(1))]
    OutOfRange { index: i64, device_count: usize },
    #[error("Invalid GPU id number: {0:?}")]
    NotANumber(String),
}

#[derive(Debug, Serialize)]
pub struct ProcessRow<'a> {
    #[serde(flatten)]
    pub usage: &'a ProcessUsage,
    pub owner: Owner,
}

#[derive(Debug, Serialize)]
pub struct DeviceView<'a> {
    #[serde(flatten)]
    pub device: &'a Device,
    pub processes: Vec<ProcessRow<'a>>,
}

/// What gets rendered this cycle, devices in snapshot order.
#[derive(Debug)]
pub struct FilteredView<'a> {
    pub devices: Vec<DeviceView<'a>>,
    pub invalid_selection: Vec<InvalidSelection>,
}

pub fn apply<'a, L: UserLookup + ?Sized>(
    snapshot: &'a Snapshot,
    options: &DisplayOptions,
    resolver: &mut OwnershipResolver<'_, L>,
) -> FilteredView<'a> {
    let (selected, mut invalid_selection) =
        validate_selection(&options.selected_devices, snapshot.device_count);
    invalid_selection.extend(
        options
            .unparsable_devices
            .iter()
            .cloned()
            .map(InvalidSelection::NotANumber),
    );

    let devices = snapshot
        .devices
        .iter()
        .filter(|device| selected.is_empty() || selected.contains(&i64::from(device.index)))
        .map(|device| DeviceView {
            device,
            processes: visible_processes(snapshot, device, options, resolver),
        })
        .collect();

    FilteredView {
        devices,
        invalid_selection,
    }
}

/// Split the selection into indices of the snapshot and the ones outside it.
fn validate_selection(
    selected: &BTreeSet<i64>,
    device_count: usize,
) -> (BTreeSet<i64>, Vec<InvalidSelection>) {
    let mut valid = BTreeSet::new();
    let mut invalid = Vec::new();

    for &index in selected {
        if usize::try_from(index).is_ok_and(|i| i < device_count) {
            valid.insert(index);
        } else {
            invalid.push(InvalidSelection::OutOfRange {
                index,
                device_count,
            });
        }
    }

    (valid, invalid)
}

fn visible_processes<'a, L: UserLookup + ?Sized>(
    snapshot: &'a Snapshot,
    device: &Device,
    options: &DisplayOptions,
    resolver: &mut OwnershipResolver<'_, L>,
) -> Vec<ProcessRow<'a>> {
    snapshot
        .processes_on(device.index)
        .map(|usage| ProcessRow {
            usage,
            owner: resolver.resolve(usage.owner_id),
        })
        .filter(|row| !options.excluded_owners.contains(&row.owner.name))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::owner::MockUserLookup;

    pub(crate) fn device(index: u32, utilization: u8) -> Device {
        Device {
            index,
            uuid: format!("GPU-{index}"),
            name: "Tesla V100".to_string(),
            memory_total_mib: Some(16384),
            memory_used_mib: Some(4096),
            utilization_percent: Some(utilization),
            temperature_celsius: Some(50),
        }
    }

    pub(crate) fn process(device_index: u32, pid: u32, owner_id: u32) -> ProcessUsage {
        ProcessUsage {
            device_index,
            owner_id: Some(owner_id),
            memory_used_mib: Some(1024),
            pid,
            name: Some("python".to_string()),
        }
    }

    /// Two GPUs, the first one busy with one process of ours (uid 1000) and one of root.
    pub(crate) fn busy_snapshot() -> Snapshot {
        Snapshot {
            device_count: 2,
            devices: vec![device(0, 85), device(1, 10)],
            processes: vec![process(0, 100, 1000), process(0, 200, 0), process(1, 300, 1001)],
        }
    }

    pub(crate) fn users() -> MockUserLookup {
        let mut lookup = MockUserLookup::new();
        lookup.expect_user_name().returning(|uid| match uid {
            0 => Some("root".to_string()),
            1000 => Some("alice".to_string()),
            1001 => Some("bob".to_string()),
            _ => None,
        });
        lookup
    }

    fn selecting(indices: &[i64]) -> DisplayOptions {
        DisplayOptions {
            selected_devices: indices.iter().copied().collect(),
            ..DisplayOptions::with_default_exclusions()
        }
    }

    fn rendered_indices(view: &FilteredView) -> Vec<u32> {
        view.devices.iter().map(|d| d.device.index).collect()
    }

    #[test]
    fn test_empty_selection_shows_every_device() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &selecting(&[]), &mut resolver);
        assert_eq!(rendered_indices(&view), vec![0, 1]);
        assert!(view.invalid_selection.is_empty());
    }

    #[test]
    fn test_selection_keeps_canonical_order() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &selecting(&[1, 0]), &mut resolver);
        assert_eq!(rendered_indices(&view), vec![0, 1]);

        let view = apply(&snapshot, &selecting(&[1]), &mut resolver);
        assert_eq!(rendered_indices(&view), vec![1]);
    }

    #[test]
    fn test_invalid_indices_are_reported_individually() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &selecting(&[-1, 1, 2, 7]), &mut resolver);
        assert_eq!(rendered_indices(&view), vec![1]);
        let reported: Vec<i64> = view
            .invalid_selection
            .iter()
            .filter_map(|s| match s {
                InvalidSelection::OutOfRange { index, .. } => Some(*index),
                InvalidSelection::NotANumber(_) => None,
            })
            .collect();
        assert_eq!(reported, vec![-1, 2, 7]);
    }

    #[test]
    fn test_only_invalid_indices_fall_back_to_all() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &selecting(&[5]), &mut resolver);
        assert_eq!(rendered_indices(&view), vec![0, 1]);
        assert_eq!(
            view.invalid_selection,
            vec![InvalidSelection::OutOfRange {
                index: 5,
                device_count: 2
            }]
        );
        assert_eq!(
            view.invalid_selection[0].to_string(),
            "Invalid GPU id number: 5 (valid ids are 0 to 1)"
        );
    }

    #[test]
    fn test_unparsable_ids_are_reported_every_cycle() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);
        let options = DisplayOptions {
            selected_devices: [1].into(),
            unparsable_devices: vec!["x".to_string()],
            ..DisplayOptions::with_default_exclusions()
        };

        for _ in 0..2 {
            let view = apply(&snapshot, &options, &mut resolver);
            assert_eq!(rendered_indices(&view), vec![1]);
            assert_eq!(
                view.invalid_selection,
                vec![InvalidSelection::NotANumber("x".to_string())]
            );
            assert_eq!(
                view.invalid_selection[0].to_string(),
                "Invalid GPU id number: \"x\""
            );
        }
    }

    #[test]
    fn test_excluded_owners_are_hidden() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &DisplayOptions::with_default_exclusions(), &mut resolver);
        let first = &view.devices[0];
        assert_eq!(first.processes.len(), 1);
        assert_eq!(first.processes[0].usage.pid, 100);
        assert_eq!(first.processes[0].owner.name, "alice");
        assert!(first.processes[0].owner.is_current_user);

        let second = &view.devices[1];
        assert_eq!(second.processes.len(), 1);
        assert!(!second.processes[0].owner.is_current_user);
    }

    #[test]
    fn test_no_exclusions_shows_system_accounts() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &DisplayOptions::default(), &mut resolver);
        let owners: Vec<&str> = view.devices[0]
            .processes
            .iter()
            .map(|row| row.owner.name.as_str())
            .collect();
        assert_eq!(owners, vec!["alice", "root"]);
    }

    #[test]
    fn test_exclusion_is_case_sensitive() {
        let snapshot = busy_snapshot();
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let options = DisplayOptions {
            excluded_owners: ["Root".to_string(), "ali".to_string()].into(),
            ..Default::default()
        };
        let view = apply(&snapshot, &options, &mut resolver);
        assert_eq!(view.devices[0].processes.len(), 2);
    }

    #[test]
    fn test_device_without_visible_processes_is_still_shown() {
        let snapshot = Snapshot {
            device_count: 1,
            devices: vec![device(0, 0)],
            processes: vec![process(0, 1, 0)],
        };
        let lookup = users();
        let mut resolver = OwnershipResolver::new(&lookup, 1000);

        let view = apply(&snapshot, &DisplayOptions::with_default_exclusions(), &mut resolver);
        assert_eq!(view.devices.len(), 1);
        assert!(view.devices[0].processes.is_empty());
    }
}
