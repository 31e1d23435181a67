//! Item type codes and the location role each one plays
//!
//! Exports from different installations disagree on which integer marks a
//! floor (2, 3 and 4 have all been seen) and some never mark buildings, so
//! the code-to-role table is configuration rather than a constant.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// What a system item means for traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Sets the building of the location context
    Building,
    /// Sets the floor of the location context
    Floor,
    /// Sets the room of the location context
    Room,
    /// Emits one device record
    Device,
    /// Project roots, groups, and any unrecognized code
    Structural,
}

impl NodeRole {
    pub fn is_device(self) -> bool {
        self == Self::Device
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::Floor => "floor",
            Self::Room => "room",
            Self::Device => "device",
            Self::Structural => "structural",
        };
        f.write_str(name)
    }
}

/// Mapping from item `type` codes to roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCodeMap {
    #[serde(default)]
    pub building: Vec<i64>,
    #[serde(default)]
    pub floor: Vec<i64>,
    #[serde(default)]
    pub room: Vec<i64>,
    #[serde(default)]
    pub device: Vec<i64>,
}

impl Default for TypeCodeMap {
    /// Codes observed in one installation export; override per project.
    fn default() -> Self {
        Self {
            building: vec![2],
            floor: vec![3],
            room: vec![8],
            device: vec![6, 7],
        }
    }
}

impl TypeCodeMap {
    /// Map a raw type code to its role. Missing and unknown codes are structural.
    pub fn role_of(&self, code: Option<i64>) -> NodeRole {
        let Some(code) = code else {
            return NodeRole::Structural;
        };
        self.roles()
            .find(|(_, codes)| codes.contains(&code))
            .map(|(role, _)| role)
            .unwrap_or(NodeRole::Structural)
    }

    /// Reject tables that assign one code to two roles
    pub fn validate(&self) -> Result<(), ConfigError> {
        let roles: Vec<_> = self.roles().collect();
        for (i, (role, codes)) in roles.iter().enumerate() {
            for (other, other_codes) in &roles[i + 1..] {
                if let Some(code) = codes.iter().find(|c| other_codes.contains(c)) {
                    return Err(ConfigError::AmbiguousTypeCode {
                        code: *code,
                        first: *role,
                        second: *other,
                    });
                }
            }
        }
        Ok(())
    }

    /// Replace the codes of one role
    pub fn set(&mut self, role: NodeRole, codes: Vec<i64>) {
        match role {
            NodeRole::Building => self.building = codes,
            NodeRole::Floor => self.floor = codes,
            NodeRole::Room => self.room = codes,
            NodeRole::Device => self.device = codes,
            NodeRole::Structural => {}
        }
    }

    fn roles(&self) -> impl Iterator<Item = (NodeRole, &[i64])> {
        [
            (NodeRole::Building, self.building.as_slice()),
            (NodeRole::Floor, self.floor.as_slice()),
            (NodeRole::Room, self.room.as_slice()),
            (NodeRole::Device, self.device.as_slice()),
        ]
        .into_iter()
    }
}
