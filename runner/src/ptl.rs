//! PTL power-state guard
//!
//! Counter collection can leave the `ptl_enable` sysfs knob of a card in a
//! different state than before the run. The guard snapshots the knob of
//! every card and writes the snapshot back when dropped.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default DRM class directory
pub const DRM_ROOT: &str = "/sys/class/drm";

const ENABLED: &str = "enabled";
const DISABLED: &str = "disabled";

/// Card index to "PTL enabled"
pub type PtlStates = BTreeMap<u32, bool>;

fn ptl_enable_path(root: &Path, card: u32) -> PathBuf {
    root.join(format!("card{}", card))
        .join("device")
        .join("ptl")
        .join("ptl_enable")
}

/// Read the PTL state of every `card<N>` under `root`.
///
/// Missing directories, non-numeric card suffixes (`card0-DP-1`) and cards
/// without the knob are skipped.
pub fn read_ptl_states(root: &Path) -> PtlStates {
    let mut states = PtlStates::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {}: {}", root.display(), e);
            return states;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(card) = name
            .to_str()
            .and_then(|n| n.strip_prefix("card"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };

        let path = ptl_enable_path(root, card);
        if !path.is_file() {
            continue;
        }

        match fs::read_to_string(&path) {
            Ok(value) => {
                let enabled = value.split_whitespace().next() == Some(ENABLED);
                debug!("PTL state for card{}: {}", card, value.trim());
                states.insert(card, enabled);
            }
            Err(e) => debug!("Cannot read {}: {}", path.display(), e),
        }
    }

    states
}

/// Write `states` back, best effort
pub fn restore_ptl_states(root: &Path, states: &PtlStates) {
    for (card, enabled) in states {
        let path = ptl_enable_path(root, *card);
        if !path.is_file() {
            continue;
        }

        let value = if *enabled { ENABLED } else { DISABLED };
        let result = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{}", value));

        match result {
            Ok(()) => debug!("Restored PTL state for card{}: {}", card, value),
            Err(e) => warn!("Failed to restore PTL state for card{}: {}", card, e),
        }
    }
}

/// Restores the captured PTL states on drop
#[derive(Debug)]
pub struct PtlStateGuard {
    root: PathBuf,
    states: PtlStates,
}

impl PtlStateGuard {
    pub fn capture(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let states = read_ptl_states(&root);
        debug!("Captured PTL state of {} cards", states.len());
        Self { root, states }
    }

    pub fn states(&self) -> &PtlStates {
        &self.states
    }
}

impl Drop for PtlStateGuard {
    fn drop(&mut self) {
        restore_ptl_states(&self.root, &self.states);
    }
}
