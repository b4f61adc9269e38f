use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier, issued by the session layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Opaque gateway identifier, issued by the object layer that owns the
/// physical gateways.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GatewayId(pub u64);

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

impl From<u64> for GatewayId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Logical zone identifier, used for visibility checks on relocation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}", self.0)
    }
}

impl From<u32> for ZoneId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
