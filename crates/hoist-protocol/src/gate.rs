/// BoardingGate — stateless boarding-eligibility evaluation.
///
/// Two call sites with different stakes: the go pre-check probes without
/// reserving seats (`needs_space = false`), while an actual boarding must
/// confirm the gateway has room right now (`needs_space = true`).
use serde::{Deserialize, Serialize};

use crate::gateway::GatewayDirectory;
use crate::party::{BoardCode, PartyConfig, PartyRegistry};
use crate::types::{GatewayId, ParticipantId};

/// Verdict plus diagnostic detail.
///
/// The `failing` and `in_combat` lists are populated by the gateway
/// collaborator when it performs real per-rider requirement checks; this
/// core carries them through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCheck {
    pub code: BoardCode,
    pub failing: Vec<ParticipantId>,
    pub in_combat: Vec<ParticipantId>,
}

impl BoardCheck {
    fn verdict(code: BoardCode) -> Self {
        Self {
            code,
            failing: Vec::new(),
            in_combat: Vec::new(),
        }
    }

    pub fn is_okay(&self) -> bool {
        self.code == BoardCode::Okay
    }
}

/// Stateless eligibility evaluator.
#[derive(Debug)]
pub struct BoardingGate;

impl BoardingGate {
    /// Evaluate whether `leader`'s party may use `gateway`.
    ///
    /// `Missing` covers every resolution failure: a gateway this
    /// coordinator does not serve, an unresolvable gateway handle, an
    /// unaffiliated participant, or a participant who is not actually the
    /// leader. `Space` means the party outgrew its capacity, or — when
    /// `needs_space` — the gateway's currently open seats.
    pub fn evaluate(
        registry: &PartyRegistry,
        config: &PartyConfig,
        gateways: &dyn GatewayDirectory,
        leader: ParticipantId,
        gateway: GatewayId,
        needs_space: bool,
    ) -> BoardCheck {
        if !config.gateways.contains(&gateway) || !gateways.contains(gateway) {
            return BoardCheck::verdict(BoardCode::Missing);
        }
        if !registry.is_leader(leader) {
            return BoardCheck::verdict(BoardCode::Missing);
        }
        let party = match registry.party(leader) {
            Some(party) => party,
            None => return BoardCheck::verdict(BoardCode::Missing),
        };

        let size = party.member_count();
        if size > config.capacity {
            return BoardCheck::verdict(BoardCode::Space);
        }
        if needs_space {
            let open = gateways.open_seats(gateway).unwrap_or(0);
            if size > open {
                return BoardCheck::verdict(BoardCode::Space);
            }
        }
        BoardCheck::verdict(BoardCode::Okay)
    }
}
