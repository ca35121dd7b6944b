//! HAP (HomeKit Accessory Protocol) JSON types as served by Homebridge

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Short HAP type codes
pub mod hap_type {
    /// `Name` characteristic
    pub const NAME: &str = "23";
    /// `On` characteristic
    pub const ON: &str = "25";
    /// `AccessoryInformation` service
    pub const ACCESSORY_INFORMATION: &str = "3E";
}

/// Normalize a HAP type to its short uppercase form
///
/// `00000025-0000-1000-8000-0026BB765291` and `25` both become `25`.
#[must_use]
pub fn short_type(kind: &str) -> String {
    let head = kind.split('-').next().unwrap_or(kind);
    let trimmed = head.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

/// Interpret a characteristic value as a boolean
#[must_use]
pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Some(false),
            Some(v) if v == 1.0 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Response of `GET /accessories`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryList {
    pub accessories: Vec<Accessory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessory {
    pub aid: u64,
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "type")]
    pub kind: String,
    pub iid: u64,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Characteristic {
    #[serde(rename = "type")]
    pub kind: String,
    pub iid: u64,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub perms: Vec<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Characteristic {
    #[must_use]
    pub fn is(&self, hap: &str) -> bool {
        short_type(&self.kind) == hap
    }
}

impl Service {
    #[must_use]
    pub fn is(&self, hap: &str) -> bool {
        short_type(&self.kind) == hap
    }

    #[must_use]
    pub fn characteristic(&self, hap: &str) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.is(hap))
    }

    /// Value of the `Name` characteristic
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.characteristic(hap_type::NAME)?.value.as_ref()?.as_str()
    }
}

impl Accessory {
    /// Name from the `AccessoryInformation` service
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.is(hap_type::ACCESSORY_INFORMATION))
            .and_then(Service::name)
    }
}

/// Location of a device's `On` characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchHandle {
    pub aid: u64,
    pub iid: u64,
    /// Value reported by the last listing or read
    pub cached: Option<bool>,
}

/// Find the `On` characteristic of the device called `name`
///
/// A service named `name` wins over an accessory named `name`, so a single
/// accessory exposing several switches can be addressed per switch.
#[must_use]
pub fn find_switch(accessories: &[Accessory], name: &str) -> Option<SwitchHandle> {
    let handle = |aid: u64, on: &Characteristic| SwitchHandle {
        aid,
        iid: on.iid,
        cached: on.value.as_ref().and_then(value_as_bool),
    };

    let by_service = accessories.iter().find_map(|accessory| {
        accessory
            .services
            .iter()
            .filter(|s| s.name() == Some(name))
            .find_map(|s| s.characteristic(hap_type::ON))
            .map(|on| handle(accessory.aid, on))
    });

    by_service.or_else(|| {
        accessories
            .iter()
            .filter(|a| a.name() == Some(name))
            .find_map(|accessory| {
                accessory
                    .services
                    .iter()
                    .find_map(|s| s.characteristic(hap_type::ON))
                    .map(|on| handle(accessory.aid, on))
            })
    })
}

/// One entry of `GET /characteristics` or a `207 Multi-Status` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacteristicValue {
    pub aid: u64,
    pub iid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

/// Body of `GET`/`PUT /characteristics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacteristicList {
    pub characteristics: Vec<CharacteristicValue>,
}
