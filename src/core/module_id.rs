//! Module build identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one build of a module.
///
/// Reloading the same build yields a new module instance with the same id,
/// which is what lets cached deltas follow a module across reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(Uuid);

impl ModuleId {
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl From<Uuid> for ModuleId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for ModuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_roundtrip() {
        let id = ModuleId::from_u128(0x8c1b9f3e_5d4a_4f6e_9a1b_2c3d4e5f6a7b);
        let text = id.to_string();
        assert_eq!(text, "8c1b9f3e-5d4a-4f6e-9a1b-2c3d4e5f6a7b");
        assert_eq!(text.parse::<ModuleId>().unwrap(), id);
    }

    #[test]
    fn test_parse_accepts_surrounding_whitespace() {
        let id: ModuleId = " 8c1b9f3e-5d4a-4f6e-9a1b-2c3d4e5f6a7b\n".parse().unwrap();
        assert_eq!(id, ModuleId::from_u128(0x8c1b9f3e_5d4a_4f6e_9a1b_2c3d4e5f6a7b));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-module".parse::<ModuleId>().is_err());
    }
}
