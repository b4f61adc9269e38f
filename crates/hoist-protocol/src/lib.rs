//! Hoist protocol layer.
//!
//! Coordinates transient parties of participants through capacity-limited
//! gateways: invitation and membership, boarding eligibility, and the
//! two-phase destination-dispatch handshake with its deferred commit.
//!
//! The engines are pure state machines returning actions; the runtime is a
//! single tokio task that executes those actions against the gateway,
//! session, and audit collaborators.

pub mod dispatch;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod party;
pub mod runtime;
pub mod types;
pub mod watch;

pub use dispatch::{DestinationDispatcher, DispatchTicket};
pub use error::HoistProtocolError;
pub use gate::{BoardCheck, BoardingGate};
pub use gateway::{AuditSink, GatewayDirectory, SessionDirectory, TracingAuditSink};
pub use party::{
    AcceptFailure, BoardCode, Party, PartyAction, PartyConfig, PartyCoordinator, PartyNotice,
    PartyRegistry, PartyRoster, DEFAULT_PARTY_CAPACITY, DISPATCH_DELAY,
};
pub use runtime::{
    Delivery, MetricsSnapshot, PartyMetrics, PartyRuntime, RuntimeChannels, RuntimeCommand,
    RuntimeHandle,
};
pub use types::{GatewayId, ParticipantId, ZoneId};
pub use watch::{EventWatcher, MemberSignal, WatchHandle};
