//! Virtual devices: several physical ports presented under one id.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

/// Prefix of generated virtual device ids.
const VIRTUAL_PREFIX: &str = "virtual::";

/// A named aggregate of physical input ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDevice {
    /// Device id, used as an event alias.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Member ports, sorted and unique.
    pub sources: Vec<String>,
}

/// Registry of virtual devices, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    /// Devices in the order they were added.
    devices: Vec<VirtualDevice>,
}

impl DeviceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a virtual device over `ports`.
    ///
    /// Returns `None` when `ports` is empty. An existing device with the same id
    /// is replaced in place.
    pub fn add_virtual<I, S>(
        &mut self,
        name: &str,
        ports: I,
        id: Option<&str>,
    ) -> Option<VirtualDevice>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = ports
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if sources.is_empty() {
            return None;
        }
        let id = id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{VIRTUAL_PREFIX}{}", Uuid::new_v4().simple()));
        let device = VirtualDevice {
            id,
            name: name.to_string(),
            sources,
        };
        match self.devices.iter_mut().find(|d| d.id == device.id) {
            Some(slot) => *slot = device.clone(),
            None => self.devices.push(device.clone()),
        }
        debug!(id = %device.id, sources = ?device.sources, "virtual device registered");
        Some(device)
    }

    /// Remove a device. Absent ids are ignored.
    pub fn remove(&mut self, id: &str) {
        self.devices.retain(|d| d.id != id);
    }

    /// Look up a device by id.
    pub fn find(&self, id: &str) -> Option<&VirtualDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// All virtual devices.
    pub fn virtual_devices(&self) -> &[VirtualDevice] {
        &self.devices
    }

    /// Ids of the virtual devices that include `port`.
    pub fn aliases_for(&self, port: &str) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| d.sources.iter().any(|s| s == port))
            .map(|d| d.id.clone())
            .collect()
    }

    /// Physical ports to open for a selection of device ids.
    ///
    /// Virtual ids expand to their members; other ids are taken as ports.
    /// The result is sorted and unique.
    pub fn expand_ports<'a, I>(&self, device_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ports = BTreeSet::new();
        for id in device_ids {
            match self.find(id) {
                Some(device) => ports.extend(device.sources.iter().cloned()),
                None => {
                    ports.insert(id.to_string());
                }
            }
        }
        ports.into_iter().collect()
    }

    /// Plain records for persistence.
    pub fn export(&self) -> Vec<Value> {
        self.devices
            .iter()
            .map(|d| json!({"id": d.id, "name": d.name, "sources": d.sources}))
            .collect()
    }

    /// Replace the registry with `records`. Records without a name or sources are skipped.
    pub fn import<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.devices.clear();
        for record in records {
            let name = record
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty());
            let sources: Vec<String> = record
                .get("sources")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            let Some(name) = name else {
                debug!("skipping virtual device without a name");
                continue;
            };
            let id = record.get("id").and_then(Value::as_str);
            if self.add_virtual(name, sources, id).is_none() {
                debug!(device = name, "skipping virtual device without sources");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sorts_and_dedups_sources() {
        let mut reg = DeviceRegistry::new();
        let dev = reg.add_virtual("Desk", ["b", "a", "b"], None).unwrap();
        assert_eq!(dev.sources, vec!["a".to_string(), "b".to_string()]);
        assert!(dev.id.starts_with("virtual::"));
        assert_eq!(reg.find(&dev.id), Some(&dev));
    }

    #[test]
    fn empty_sources_rejected() {
        let mut reg = DeviceRegistry::new();
        assert!(reg.add_virtual("None", Vec::<String>::new(), None).is_none());
        assert!(reg.virtual_devices().is_empty());
    }

    #[test]
    fn aliases_and_expansion() {
        let mut reg = DeviceRegistry::new();
        reg.add_virtual("Desk", ["a", "b"], Some("virtual::desk"));
        reg.add_virtual("Pads", ["b", "c"], Some("virtual::pads"));
        assert_eq!(
            reg.aliases_for("b"),
            vec!["virtual::desk".to_string(), "virtual::pads".to_string()]
        );
        assert!(reg.aliases_for("z").is_empty());
        assert_eq!(
            reg.expand_ports(["virtual::desk", "z", "a"]),
            vec!["a".to_string(), "b".to_string(), "z".to_string()]
        );
        reg.remove("virtual::desk");
        assert_eq!(reg.aliases_for("a"), Vec::<String>::new());
    }

    #[test]
    fn import_skips_incomplete_records() {
        let mut reg = DeviceRegistry::new();
        reg.import(&[
            json!({"id": "virtual::1", "name": "One", "sources": ["p"]}),
            json!({"id": "virtual::2", "sources": ["p"]}),
            json!({"id": "virtual::3", "name": "Three", "sources": []}),
        ]);
        assert_eq!(reg.virtual_devices().len(), 1);
        let exported = reg.export();
        assert_eq!(exported[0]["id"], "virtual::1");
        assert_eq!(exported[0]["sources"], json!(["p"]));
    }
}
