/// Protocol-level errors for Hoist.
///
/// Business-rule rejections are not errors — they surface to participants
/// as [`crate::party::PartyNotice`] values with reason codes. This enum
/// covers only the runtime and configuration failure modes.
#[derive(Debug, thiserror::Error)]
pub enum HoistProtocolError {
    #[error("runtime closed")]
    RuntimeClosed,

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl From<rmp_serde::encode::Error> for HoistProtocolError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        HoistProtocolError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for HoistProtocolError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        HoistProtocolError::Deserialization(e.to_string())
    }
}
