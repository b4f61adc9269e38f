/// Party formation for the Hoist protocol.
///
/// One coordinator per hosting location owns every party formed there.
/// Pure state machines — no I/O.
pub mod coordinator;
pub mod registry;
pub mod types;

pub use coordinator::{PartyConfig, PartyCoordinator};
pub use registry::{Party, PartyRegistry};
pub use types::{
    AcceptFailure, BoardCode, PartyAction, PartyNotice, PartyRoster, DEFAULT_PARTY_CAPACITY,
    DISPATCH_DELAY,
};
