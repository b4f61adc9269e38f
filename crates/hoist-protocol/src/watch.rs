/// EventWatcher — per-member subscriptions to external liveness signals.
///
/// The session layer feeds every disconnect, zone-change, and combat signal
/// into the runtime; the watcher decides which of them concern a party
/// member. `subscribe` hands back a capability stored with the watched
/// record, so teardown is mechanical and nothing leaks past a removal.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, ZoneId};

/// External signals a watched participant can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberSignal {
    /// The session disconnected or the avatar despawned.
    Disconnected { participant: ParticipantId },
    /// The participant moved to another logical zone.
    ZoneChanged {
        participant: ParticipantId,
        zone: ZoneId,
    },
    /// The participant entered combat.
    CombatJoined { participant: ParticipantId },
    /// The participant left combat.
    CombatLeft { participant: ParticipantId },
}

impl MemberSignal {
    /// The participant this signal is about.
    pub fn participant(&self) -> ParticipantId {
        match self {
            MemberSignal::Disconnected { participant }
            | MemberSignal::ZoneChanged { participant, .. }
            | MemberSignal::CombatJoined { participant }
            | MemberSignal::CombatLeft { participant } => *participant,
        }
    }
}

/// Opaque subscription capability returned by [`EventWatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

/// Tracks which participants the protocol is listening to.
#[derive(Debug, Default)]
pub struct EventWatcher {
    next_handle: u64,
    watched: HashMap<ParticipantId, WatchHandle>,
}

impl EventWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching a participant. Re-subscribing an already-watched
    /// participant keeps the existing handle.
    pub fn subscribe(&mut self, participant: ParticipantId) -> WatchHandle {
        if let Some(handle) = self.watched.get(&participant) {
            return *handle;
        }
        let handle = WatchHandle(self.next_handle);
        self.next_handle += 1;
        self.watched.insert(participant, handle);
        tracing::debug!(%participant, ?handle, "watch subscribed");
        handle
    }

    /// Stop watching a participant. Idempotent.
    pub fn unsubscribe(&mut self, participant: ParticipantId) -> Option<WatchHandle> {
        let handle = self.watched.remove(&participant);
        if let Some(handle) = handle {
            tracing::debug!(%participant, ?handle, "watch released");
        }
        handle
    }

    /// Whether a participant is currently watched.
    pub fn is_watched(&self, participant: ParticipantId) -> bool {
        self.watched.contains_key(&participant)
    }

    /// Whether a signal concerns a watched participant.
    pub fn accepts(&self, signal: &MemberSignal) -> bool {
        self.is_watched(signal.participant())
    }

    /// Number of active subscriptions.
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}
