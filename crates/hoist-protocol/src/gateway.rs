/// External collaborator seams.
///
/// The protocol core never owns gateways, sessions, or the audit log — it
/// queries and commands them through these traits. Implementations live in
/// the hosting layer; tests substitute in-memory stubs.
use crate::types::{GatewayId, ParticipantId};

/// The gateway surface this core requires from the physical layer.
///
/// Query methods return `None`/`false` for unknown gateways — a missing
/// entity is answered with a generic code upstream, never a fault.
pub trait GatewayDirectory {
    /// Whether the directory can resolve this gateway at all.
    fn contains(&self, gateway: GatewayId) -> bool;

    /// Seats currently open, or `None` if the gateway is unknown.
    fn open_seats(&self, gateway: GatewayId) -> Option<usize>;

    /// Whether a participant currently occupies a seat in this gateway.
    fn occupies_seat(&self, gateway: GatewayId, participant: ParticipantId) -> bool;

    /// Seat a participant, optionally with the visible boarding show.
    /// Returns `false` if the gateway or participant handle is gone.
    fn admit(&self, gateway: GatewayId, participant: ParticipantId, with_show: bool) -> bool;

    /// Send a rider list to the gateway's configured destination.
    /// Returns `false` if the gateway handle is gone.
    fn dispatch(&self, gateway: GatewayId, riders: &[ParticipantId]) -> bool;
}

/// Resolves participant ids to live sessions.
pub trait SessionDirectory {
    /// Whether the participant has a live session right now.
    fn is_present(&self, participant: ParticipantId) -> bool;
}

/// Accepts free-form suspicious-activity records.
pub trait AuditSink {
    fn record(&self, participant: ParticipantId, detail: &str);
}

/// Audit sink that forwards records to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, participant: ParticipantId, detail: &str) {
        tracing::warn!(%participant, detail, "suspicious activity");
    }
}
