/// PartyRegistry — the single source of truth for party affiliation.
///
/// Owns the membership index (participant → leader) and the party
/// aggregates keyed by leader. Handlers receive it by reference; no handler
/// may return with the index and the party stores disagreeing.
use std::collections::{BTreeSet, HashMap};

use crate::party::types::PartyRoster;
use crate::types::ParticipantId;

// ── Party ────────────────────────────────────────────────────────────────

/// A leader's party: confirmed members, outstanding invitees, and the
/// kicked-history set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    /// Identifies the party for its whole lifetime.
    pub leader: ParticipantId,
    /// Confirmed members in insertion order; the leader is element 0.
    pub members: Vec<ParticipantId>,
    /// Invitees with an unanswered invitation.
    pub pending: BTreeSet<ParticipantId>,
    /// Participants the leader removed. Cosmetic — implies no affiliation.
    pub kicked: BTreeSet<ParticipantId>,
}

impl Party {
    /// Create a fresh party containing only its leader.
    pub fn new(leader: ParticipantId) -> Self {
        Self {
            leader,
            members: vec![leader],
            pending: BTreeSet::new(),
            kicked: BTreeSet::new(),
        }
    }

    /// Whether a participant is a confirmed member.
    pub fn is_member(&self, id: ParticipantId) -> bool {
        self.members.contains(&id)
    }

    /// Whether a participant has an unanswered invitation.
    pub fn is_pending(&self, id: ParticipantId) -> bool {
        self.pending.contains(&id)
    }

    /// Whether the leader previously kicked a participant.
    pub fn was_kicked(&self, id: ParticipantId) -> bool {
        self.kicked.contains(&id)
    }

    /// Number of confirmed members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Snapshot the three containers for notification payloads.
    pub fn roster(&self) -> PartyRoster {
        PartyRoster {
            leader: self.leader,
            members: self.members.clone(),
            pending: self.pending.iter().copied().collect(),
            kicked: self.kicked.iter().copied().collect(),
        }
    }

    /// Everyone a roster update concerns: members plus pending invitees.
    pub fn audience(&self) -> Vec<ParticipantId> {
        let mut out = self.members.clone();
        out.extend(self.pending.iter().copied());
        out
    }
}

// ── PartyRegistry ────────────────────────────────────────────────────────

/// Membership index plus party store.
#[derive(Debug, Default)]
pub struct PartyRegistry {
    /// participant → leader, covering leaders, members, and pending invitees.
    index: HashMap<ParticipantId, ParticipantId>,
    /// leader → party.
    parties: HashMap<ParticipantId, Party>,
}

impl PartyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The leader a participant is affiliated with, if any.
    pub fn lookup(&self, id: ParticipantId) -> Option<ParticipantId> {
        self.index.get(&id).copied()
    }

    /// Bind a participant to a leader in the index.
    pub fn bind(&mut self, id: ParticipantId, leader: ParticipantId) {
        self.index.insert(id, leader);
    }

    /// Drop a participant from the index. Returns the prior leader, if any.
    pub fn unbind(&mut self, id: ParticipantId) -> Option<ParticipantId> {
        self.index.remove(&id)
    }

    pub fn party(&self, leader: ParticipantId) -> Option<&Party> {
        self.parties.get(&leader)
    }

    pub fn party_mut(&mut self, leader: ParticipantId) -> Option<&mut Party> {
        self.parties.get_mut(&leader)
    }

    /// Store a party under its leader.
    pub fn insert_party(&mut self, party: Party) {
        self.parties.insert(party.leader, party);
    }

    /// Remove a party. The caller is responsible for unbinding its
    /// participants.
    pub fn remove_party(&mut self, leader: ParticipantId) -> Option<Party> {
        self.parties.remove(&leader)
    }

    /// Whether a participant is a confirmed member of any party.
    pub fn has_active_party(&self, id: ParticipantId) -> bool {
        self.lookup(id)
            .and_then(|leader| self.party(leader))
            .is_some_and(|party| party.is_member(id))
    }

    /// Whether a participant has an unanswered invitation anywhere.
    pub fn has_pending_invite(&self, id: ParticipantId) -> bool {
        self.lookup(id)
            .and_then(|leader| self.party(leader))
            .is_some_and(|party| party.is_pending(id))
    }

    /// Whether a participant leads a party.
    pub fn is_leader(&self, id: ParticipantId) -> bool {
        self.lookup(id) == Some(id) && self.parties.contains_key(&id)
    }

    /// Number of active parties.
    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    /// Number of indexed participants.
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    /// Leaders of all active parties, in no particular order.
    pub fn leaders(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.parties.keys().copied()
    }
}
