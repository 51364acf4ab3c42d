//! Profiles and profile sets produced by the packer

use crate::handle::ConfigHandle;

/// A hardware configuration bundling counters that can be sampled together
#[derive(Debug)]
pub struct Profile {
    pub config: ConfigHandle,

    /// Member counters, in the order they were packed
    pub counters: Vec<String>,

    /// Sum of the members' record counts; the read buffer is sized to this
    pub expected_size: usize,
}

/// Ordered profiles covering one requested counter list
#[derive(Debug, Default)]
pub struct ProfileSet {
    /// Sampling executes profiles in this order
    pub profiles: Vec<Profile>,

    /// Requested names the device does not expose
    pub unsupported: Vec<String>,

    /// Supported names no configuration could be built for
    pub unpackable: Vec<String>,
}

impl ProfileSet {
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Every counter name that will be sampled, in execution order
    pub fn counter_names(&self) -> impl Iterator<Item = &str> {
        self.profiles
            .iter()
            .flat_map(|p| p.counters.iter().map(String::as_str))
    }

    /// Total records one pass over every profile is expected to produce
    pub fn expected_records(&self) -> usize {
        self.profiles.iter().map(|p| p.expected_size).sum()
    }
}
