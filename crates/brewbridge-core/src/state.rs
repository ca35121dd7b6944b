//! Tri-state value carried by block records

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Binary state that may not be known yet
///
/// Encoded on the wire as `null`, `0` or `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TriState {
    #[default]
    Unknown,
    Off,
    On,
}

impl TriState {
    /// Boolean value, `None` when unknown
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            TriState::Unknown => None,
            TriState::Off => Some(false),
            TriState::On => Some(true),
        }
    }

    #[must_use]
    pub fn is_known(self) -> bool {
        self != TriState::Unknown
    }

    /// Wire representation
    #[must_use]
    pub fn to_json(self) -> Value {
        match self {
            TriState::Unknown => Value::Null,
            TriState::Off => Value::from(0),
            TriState::On => Value::from(1),
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { TriState::On } else { TriState::Off }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriState::Unknown => write!(f, "unknown"),
            TriState::Off => write!(f, "off"),
            TriState::On => write!(f, "on"),
        }
    }
}

impl Serialize for TriState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TriState::Unknown => serializer.serialize_none(),
            TriState::Off => serializer.serialize_u8(0),
            TriState::On => serializer.serialize_u8(1),
        }
    }
}

struct TriStateVisitor;

impl<'de> Visitor<'de> for TriStateVisitor {
    type Value = TriState;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, 0, 1 or a boolean")
    }

    fn visit_unit<E: de::Error>(self) -> Result<TriState, E> {
        Ok(TriState::Unknown)
    }

    fn visit_none<E: de::Error>(self) -> Result<TriState, E> {
        Ok(TriState::Unknown)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<TriState, D::Error> {
        TriState::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<TriState, E> {
        Ok(TriState::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TriState, E> {
        match v {
            0 => Ok(TriState::Off),
            1 => Ok(TriState::On),
            other => Err(E::invalid_value(de::Unexpected::Unsigned(other), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TriState, E> {
        match v {
            0 => Ok(TriState::Off),
            1 => Ok(TriState::On),
            other => Err(E::invalid_value(de::Unexpected::Signed(other), &self)),
        }
    }

    // Brewblox publishes some integer fields as floats
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<TriState, E> {
        if v == 0.0 {
            Ok(TriState::Off)
        } else if v == 1.0 {
            Ok(TriState::On)
        } else {
            Err(E::invalid_value(de::Unexpected::Float(v), &self))
        }
    }
}

impl<'de> Deserialize<'de> for TriState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TriStateVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        let states: Vec<TriState> = serde_json::from_str("[null, 0, 1, true, false, 1.0]").unwrap();
        assert_eq!(
            states,
            vec![
                TriState::Unknown,
                TriState::Off,
                TriState::On,
                TriState::On,
                TriState::Off,
                TriState::On
            ]
        );
        assert_eq!(
            serde_json::to_string(&[TriState::Unknown, TriState::Off, TriState::On]).unwrap(),
            "[null,0,1]"
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(serde_json::from_str::<TriState>("2").is_err());
        assert!(serde_json::from_str::<TriState>("\"on\"").is_err());
    }

    #[test]
    fn test_as_bool() {
        assert_eq!(TriState::Unknown.as_bool(), None);
        assert_eq!(TriState::Off.as_bool(), Some(false));
        assert_eq!(TriState::from(true), TriState::On);
        assert!(!TriState::Unknown.is_known());
    }
}
