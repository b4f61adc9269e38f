/// Party data structures for the Hoist protocol.
///
/// A party is owned by its leader: an ordered confirmed-member list, a set
/// of outstanding invitees, and a kicked-history set used to tell a
/// re-invite apart from a stale accept.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{GatewayId, ParticipantId};

// ── Constants ────────────────────────────────────────────────────────────

/// Maximum confirmed members per party unless configured otherwise.
pub const DEFAULT_PARTY_CAPACITY: usize = 4;

/// Delay between the second go confirmation and the deferred dispatch.
pub const DISPATCH_DELAY: Duration = Duration::from_secs(3);

// ── BoardCode ────────────────────────────────────────────────────────────

/// Reason codes shared by the boarding gate and the invitation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardCode {
    /// Eligible — nothing in the way.
    Okay,
    /// Gateway, party, or leader could not be resolved.
    Missing,
    /// Not enough room: party over capacity, or over the gateway's open seats.
    Space,
    /// Invitee already has an unanswered invitation.
    PendingInvite,
    /// Invitee is a confirmed member of another party.
    DiffGroup,
    /// Invitee currently occupies a gateway seat.
    InElevator,
}

/// Why an accepted invitation could not be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptFailure {
    /// The party reached capacity before the accept arrived.
    PartyFull,
}

// ── PartyRoster ──────────────────────────────────────────────────────────

/// Serializable snapshot of a party's three membership containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRoster {
    pub leader: ParticipantId,
    /// Confirmed members in insertion order; the leader is element 0.
    pub members: Vec<ParticipantId>,
    /// Outstanding invitees, ascending.
    pub pending: Vec<ParticipantId>,
    /// Participants removed by the leader, ascending.
    pub kicked: Vec<ParticipantId>,
}

// ── PartyNotice ──────────────────────────────────────────────────────────

/// Outbound notifications, addressed to one participant or broadcast to a
/// party. The transport layer above decides how they reach sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartyNotice {
    /// An invitation arrived (to the invitee).
    Invited {
        leader: ParticipantId,
        inviter: ParticipantId,
    },

    /// An invitation could not be sent (to the inviter, with the reason).
    InviteRejected {
        invitee: ParticipantId,
        code: BoardCode,
    },

    /// An invitation aimed at this participant failed (to the invitee).
    InvitationFailed { inviter: ParticipantId },

    /// Another member extended an invitation (to members other than the inviter).
    MemberInvited {
        invitee: ParticipantId,
        inviter: ParticipantId,
    },

    /// Invite refused: the party is already at capacity (to the inviter).
    PartySizeRejected {
        leader: ParticipantId,
        inviter: ParticipantId,
        invitee: ParticipantId,
    },

    /// Invite refused: a kicked participant cannot re-invite (to the inviter).
    KickedCannotInvite {
        leader: ParticipantId,
        invitee: ParticipantId,
    },

    /// An outstanding invitation was withdrawn (to the invitee).
    InviteCanceled,

    /// The invitee accepted (to the inviter).
    InviteAccepted { invitee: ParticipantId },

    /// The invitee declined (to the inviter).
    InviteDeclined { invitee: ParticipantId },

    /// An accept could not be honored (to the inviter).
    AcceptanceFailed {
        invitee: ParticipantId,
        reason: AcceptFailure,
    },

    /// Stale accept: the invitee already belongs to a party (to the invitee).
    AlreadyInParty,

    /// Stale accept: no recorded relationship to that leader (to the invitee).
    SomethingMissing,

    /// The party filled up before the accept landed (to the invitee).
    PartyFull,

    /// Roster changed (broadcast to members and pending invitees).
    RosterUpdated { roster: PartyRoster },

    /// The party dissolved. `former_members` lists the triggering
    /// participant first so recipients can tell who caused it.
    Dissolved {
        instigator: ParticipantId,
        leader: ParticipantId,
        former_members: Vec<ParticipantId>,
        was_kick: bool,
    },

    /// Removed by the leader (to the kicked participant).
    Kicked { leader: ParticipantId },

    /// Boarding refused (to the leader, with diagnostics).
    BoardingRejected {
        gateway: GatewayId,
        code: BoardCode,
        failing: Vec<ParticipantId>,
        in_combat: Vec<ParticipantId>,
    },

    /// First go request acknowledged (to the leader alone).
    GoFirstAccepted { gateway: GatewayId },

    /// Second go request acknowledged (to every current member).
    GoSecondAccepted { gateway: GatewayId },

    /// A go request was refused (to the leader, with diagnostics).
    GoRejected {
        gateway: GatewayId,
        code: BoardCode,
        failing: Vec<ParticipantId>,
        in_combat: Vec<ParticipantId>,
    },

    /// The leader changed the destination (to non-leader members).
    DestinationChanged { offset: u32 },
}

impl PartyNotice {
    /// Serialize to MessagePack for the transport layer above.
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::error::HoistProtocolError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    /// Deserialize from MessagePack.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::error::HoistProtocolError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

// ── PartyAction ──────────────────────────────────────────────────────────

/// Actions returned by the party engines — the caller executes them against
/// the transport, gateway, watcher, and audit collaborators.
///
/// Pure decision engine pattern: no handler performs I/O itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PartyAction {
    /// Deliver a notice to one participant.
    Notify {
        to: ParticipantId,
        notice: PartyNotice,
    },

    /// Deliver a notice to several participants.
    Broadcast {
        to: Vec<ParticipantId>,
        notice: PartyNotice,
    },

    /// Subscribe the watcher to liveness signals for a participant.
    Watch { participant: ParticipantId },

    /// Release the watcher subscription for a participant.
    Unwatch { participant: ParticipantId },

    /// Seat a participant in a gateway, optionally with the boarding show.
    Admit {
        gateway: GatewayId,
        participant: ParticipantId,
        with_show: bool,
    },

    /// Arm the deferred dispatch timer for a leader's outstanding ticket.
    ScheduleDispatch {
        leader: ParticipantId,
        delay: Duration,
    },

    /// Disarm the deferred dispatch timer for a leader, if any.
    CancelDispatch { leader: ParticipantId },

    /// Send the captured rider list to the gateway's destination.
    Dispatch {
        gateway: GatewayId,
        riders: Vec<ParticipantId>,
    },

    /// Record a suspicious-activity entry with the audit sink.
    Audit {
        participant: ParticipantId,
        detail: String,
    },
}
