//! Bidirectional MAC ↔ location table.

use std::collections::{BTreeSet, HashMap};

use nib_types::{Location, MacAddress};

/// Learned host locations.
///
/// Each MAC has at most one location; learning a MAC again silently moves
/// it. The reverse index may hold several MACs per location (hosts behind an
/// unmanaged segment) and is kept in step with the forward map.
#[derive(Debug, Clone, Default)]
pub struct MacTable {
    by_mac: HashMap<MacAddress, Location>,
    by_location: HashMap<Location, BTreeSet<MacAddress>>,
}

impl MacTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_mac.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mac.is_empty()
    }

    pub fn port_for_mac(&self, mac: MacAddress) -> Option<Location> {
        self.by_mac.get(&mac).copied()
    }

    /// One MAC learned at `location`, the lowest if there are several.
    pub fn mac_for_port(&self, location: Location) -> Option<MacAddress> {
        self.by_location
            .get(&location)
            .and_then(|macs| macs.first().copied())
    }

    /// Records `mac` at `location`, replacing any previous location.
    ///
    /// Returns the previous location if the MAC moved.
    pub fn learn(&mut self, mac: MacAddress, location: Location) -> Option<Location> {
        let previous = self.by_mac.insert(mac, location);
        if let Some(old) = previous {
            self.detach(mac, old);
        }
        self.by_location.entry(location).or_default().insert(mac);
        previous.filter(|old| *old != location)
    }

    /// Forgets `mac`. Returns its location if it was known.
    pub fn unlearn(&mut self, mac: MacAddress) -> Option<Location> {
        let location = self.by_mac.remove(&mac)?;
        self.detach(mac, location);
        Some(location)
    }

    /// Forgets every MAC learned at `location`.
    pub fn unlearn_location(&mut self, location: Location) -> Vec<MacAddress> {
        let macs: Vec<MacAddress> = self
            .by_location
            .remove(&location)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for mac in &macs {
            self.by_mac.remove(mac);
        }
        macs
    }

    pub fn iter(&self) -> impl Iterator<Item = (MacAddress, Location)> + '_ {
        self.by_mac.iter().map(|(mac, loc)| (*mac, *loc))
    }

    fn detach(&mut self, mac: MacAddress, location: Location) {
        if let Some(macs) = self.by_location.get_mut(&location) {
            macs.remove(&mac);
            if macs.is_empty() {
                self.by_location.remove(&location);
            }
        }
    }
}
