/// PartyCoordinator — the invitation and membership state machine.
///
/// Pure decision engine: no I/O. Every handler takes the registry by
/// reference and returns `Vec<PartyAction>` for the runtime to execute via
/// the transport, gateway, watcher, and audit collaborators.
///
/// Single-threaded cooperative model: each handler runs to completion, so
/// multi-step registry mutations are atomic with respect to other requests.
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::HoistProtocolError;
use crate::gateway::GatewayDirectory;
use crate::party::registry::{Party, PartyRegistry};
use crate::party::types::{
    AcceptFailure, BoardCode, PartyAction, PartyNotice, DEFAULT_PARTY_CAPACITY, DISPATCH_DELAY,
};
use crate::types::{GatewayId, ParticipantId, ZoneId};

// ── Configuration ────────────────────────────────────────────────────────

/// Fixed configuration for one coordinator instance, set at construction.
#[derive(Debug, Clone)]
pub struct PartyConfig {
    /// Maximum confirmed members per party.
    pub capacity: usize,
    /// Gateways this coordinator serves. Boarding requests naming any other
    /// gateway resolve as missing.
    pub gateways: Vec<GatewayId>,
    /// Zones still considered "here" — relocation inside this set does not
    /// remove a member.
    pub visible_zones: BTreeSet<ZoneId>,
    /// Delay between the second go confirmation and the deferred dispatch.
    pub dispatch_delay: Duration,
    /// Whether dissolution cancels an outstanding dispatch job. The observed
    /// system dispatched the captured list regardless; `true` is the robust
    /// alternative. Both are supported and tested.
    pub cancel_dispatch_on_dissolve: bool,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PARTY_CAPACITY,
            gateways: Vec::new(),
            visible_zones: BTreeSet::new(),
            dispatch_delay: DISPATCH_DELAY,
            cancel_dispatch_on_dissolve: true,
        }
    }
}

impl PartyConfig {
    /// Reject configurations that cannot host a party at all.
    pub fn validate(&self) -> Result<(), HoistProtocolError> {
        if self.capacity < 2 {
            return Err(HoistProtocolError::InvalidConfig {
                reason: format!("capacity {} cannot hold a leader and a member", self.capacity),
            });
        }
        if self.gateways.is_empty() {
            return Err(HoistProtocolError::InvalidConfig {
                reason: "no gateways configured".into(),
            });
        }
        Ok(())
    }
}

// ── Coordinator ──────────────────────────────────────────────────────────

/// Membership state machine for all parties served by one location.
#[derive(Debug)]
pub struct PartyCoordinator {
    config: PartyConfig,
}

impl PartyCoordinator {
    pub fn new(config: PartyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartyConfig {
        &self.config
    }

    // ── Invite ───────────────────────────────────────────────────────────

    /// An inviter asks to add an invitee. Creates the party on the first
    /// invite from an unaffiliated inviter.
    pub fn request_invite(
        &self,
        registry: &mut PartyRegistry,
        gateways: &dyn GatewayDirectory,
        inviter: ParticipantId,
        invitee: ParticipantId,
    ) -> Vec<PartyAction> {
        tracing::debug!(%inviter, %invitee, "request_invite");

        if registry.has_active_party(invitee) {
            return invite_refused(inviter, invitee, BoardCode::DiffGroup);
        }
        if registry.has_pending_invite(invitee) {
            return invite_refused(inviter, invitee, BoardCode::PendingInvite);
        }
        if self.occupies_any_gateway(gateways, invitee) {
            return invite_refused(inviter, invitee, BoardCode::InElevator);
        }

        // An index entry for the invitee past the checks above means the
        // index and the party stores disagree. Audited, then overwritten.
        let invitee_indexed = registry.lookup(invitee).is_some();

        let mut actions = Vec::new();
        match registry.lookup(inviter) {
            Some(leader) => {
                let Some(party) = registry.party_mut(leader) else {
                    return actions;
                };

                if inviter == leader && party.was_kicked(invitee) {
                    party.kicked.remove(&invitee);
                }

                if party.member_count() >= self.config.capacity {
                    actions.push(PartyAction::Notify {
                        to: inviter,
                        notice: PartyNotice::PartySizeRejected {
                            leader,
                            inviter,
                            invitee,
                        },
                    });
                } else if !party.is_pending(inviter) && !party.was_kicked(inviter) {
                    party.pending.insert(invitee);
                    let members = party.members.clone();

                    if invitee_indexed {
                        actions.push(PartyAction::Audit {
                            participant: inviter,
                            detail: format!("invited {invitee}, who is already indexed to a party"),
                        });
                    }
                    registry.bind(invitee, leader);

                    actions.push(PartyAction::Notify {
                        to: invitee,
                        notice: PartyNotice::Invited { leader, inviter },
                    });
                    for member in members {
                        if member != inviter {
                            actions.push(PartyAction::Notify {
                                to: member,
                                notice: PartyNotice::MemberInvited { invitee, inviter },
                            });
                        }
                    }
                } else if party.was_kicked(inviter) {
                    actions.push(PartyAction::Notify {
                        to: inviter,
                        notice: PartyNotice::KickedCannotInvite { leader, invitee },
                    });
                }
                // A still-pending inviter gets no answer at all.
            }
            None => {
                if invitee_indexed {
                    actions.push(PartyAction::Audit {
                        participant: inviter,
                        detail: format!("invited {invitee}, who is already indexed to a party"),
                    });
                }

                let mut party = Party::new(inviter);
                party.pending.insert(invitee);
                registry.insert_party(party);
                registry.bind(inviter, inviter);
                registry.bind(invitee, inviter);

                actions.push(PartyAction::Watch { participant: inviter });
                actions.push(PartyAction::Notify {
                    to: invitee,
                    notice: PartyNotice::Invited {
                        leader: inviter,
                        inviter,
                    },
                });
            }
        }
        actions
    }

    /// The inviter withdraws an outstanding invitation.
    pub fn request_cancel_invite(
        &self,
        registry: &mut PartyRegistry,
        inviter: ParticipantId,
        invitee: ParticipantId,
    ) -> Vec<PartyAction> {
        let Some(leader) = registry.lookup(inviter) else {
            return Vec::new();
        };
        if registry.party(leader).is_none() {
            return Vec::new();
        }
        let mut actions = self.remove_from_party(registry, leader, invitee, false, true);
        actions.push(PartyAction::Notify {
            to: invitee,
            notice: PartyNotice::InviteCanceled,
        });
        actions
    }

    // ── Accept / reject ──────────────────────────────────────────────────

    /// The invitee accepts. `leader` and `inviter` are the ids the invitee
    /// was told about — both are re-validated here.
    pub fn request_accept_invite(
        &self,
        registry: &mut PartyRegistry,
        invitee: ParticipantId,
        leader: ParticipantId,
        inviter: ParticipantId,
    ) -> Vec<PartyAction> {
        tracing::debug!(%invitee, %leader, %inviter, "request_accept_invite");

        let Some(mapped) = registry.lookup(invitee) else {
            return vec![PartyAction::Audit {
                participant: invitee,
                detail: format!(
                    "accepted an invite from {inviter} to {leader}'s party without an index entry"
                ),
            }];
        };

        if registry.has_active_party(invitee) {
            return vec![PartyAction::Notify {
                to: invitee,
                notice: PartyNotice::AlreadyInParty,
            }];
        }

        let related = registry
            .party(leader)
            .is_some_and(|party| party.is_member(invitee) || party.is_pending(invitee));
        if registry.lookup(leader).is_none() || !related {
            return vec![PartyAction::Notify {
                to: invitee,
                notice: PartyNotice::SomethingMissing,
            }];
        }

        let mut actions = Vec::new();

        // Race between two invitations: the invitee is pending here but
        // indexed to another leader. Self-heal without re-notifying the
        // stale party's roster, and leave a trail for audit.
        if mapped != leader {
            actions.push(PartyAction::Audit {
                participant: invitee,
                detail: format!(
                    "accepted {inviter}'s invite into {leader}'s party while indexed to {mapped}'s party"
                ),
            });
            actions.extend(self.remove_from_party(registry, mapped, invitee, false, false));
        }

        let member_count = registry
            .party(leader)
            .map(Party::member_count)
            .unwrap_or(0);
        if member_count >= self.config.capacity {
            actions.extend(self.remove_from_party(registry, leader, invitee, false, true));
            actions.push(PartyAction::Notify {
                to: inviter,
                notice: PartyNotice::AcceptanceFailed {
                    invitee,
                    reason: AcceptFailure::PartyFull,
                },
            });
            actions.push(PartyAction::Notify {
                to: invitee,
                notice: PartyNotice::PartyFull,
            });
            return actions;
        }

        actions.push(PartyAction::Notify {
            to: inviter,
            notice: PartyNotice::InviteAccepted { invitee },
        });
        actions.extend(self.add_to_party(registry, leader, invitee));
        actions
    }

    /// The invitee declines. Same removal path as a cancel, but the inviter
    /// is the one told.
    pub fn request_reject_invite(
        &self,
        registry: &mut PartyRegistry,
        invitee: ParticipantId,
        leader: ParticipantId,
        inviter: ParticipantId,
    ) -> Vec<PartyAction> {
        let mut actions = self.remove_from_party(registry, leader, invitee, false, true);
        actions.push(PartyAction::Notify {
            to: inviter,
            notice: PartyNotice::InviteDeclined { invitee },
        });
        actions
    }

    // ── Kick / leave ─────────────────────────────────────────────────────

    /// The leader removes a member. Only valid when the target is currently
    /// mapped to the caller.
    pub fn request_kick(
        &self,
        registry: &mut PartyRegistry,
        leader: ParticipantId,
        target: ParticipantId,
    ) -> Vec<PartyAction> {
        if registry.lookup(target) != Some(leader) {
            return Vec::new();
        }
        let mut actions = self.remove_from_party(registry, leader, target, true, true);
        actions.push(PartyAction::Notify {
            to: target,
            notice: PartyNotice::Kicked { leader },
        });
        actions
    }

    /// A member departs on their own. Idempotent: repeating it after the
    /// member is gone produces nothing.
    pub fn request_leave(
        &self,
        registry: &mut PartyRegistry,
        member: ParticipantId,
        leader: ParticipantId,
    ) -> Vec<PartyAction> {
        if registry.lookup(member) != Some(leader) {
            return Vec::new();
        }
        self.remove_from_party(registry, leader, member, false, true)
    }

    // ── Involuntary removal ──────────────────────────────────────────────

    /// The session layer reported a disconnect.
    pub fn handle_disconnect(
        &self,
        registry: &mut PartyRegistry,
        participant: ParticipantId,
    ) -> Vec<PartyAction> {
        tracing::debug!(%participant, "handle_disconnect");
        let Some(leader) = registry.lookup(participant) else {
            return Vec::new();
        };
        self.remove_from_party(registry, leader, participant, false, true)
    }

    /// A watched participant changed zones. Relocation inside the visible
    /// set keeps the membership; anything else removes.
    pub fn handle_zone_change(
        &self,
        registry: &mut PartyRegistry,
        participant: ParticipantId,
        zone: ZoneId,
    ) -> Vec<PartyAction> {
        if self.config.visible_zones.contains(&zone) {
            tracing::debug!(%participant, %zone, "zone change within visible set");
            return Vec::new();
        }
        tracing::debug!(%participant, %zone, "zone change out of visible set");
        let Some(leader) = registry.lookup(participant) else {
            return Vec::new();
        };
        self.remove_from_party(registry, leader, participant, false, true)
    }

    /// Combat entry is observed but produces no membership change.
    pub fn handle_combat_joined(&self, participant: ParticipantId) -> Vec<PartyAction> {
        tracing::debug!(%participant, "combat joined");
        Vec::new()
    }

    /// Combat exit is observed but produces no membership change.
    pub fn handle_combat_left(&self, participant: ParticipantId) -> Vec<PartyAction> {
        tracing::debug!(%participant, "combat left");
        Vec::new()
    }

    // ── Shared removal ───────────────────────────────────────────────────

    /// Remove `target` from `leader`'s party: the one path shared by kick,
    /// leave, cancel, reject, and every involuntary trigger.
    ///
    /// Dissolves the party when the leader departs or the confirmed-member
    /// count drops below two. Whichever branch ran, the target never ends
    /// up indexed to this leader — entries pointing at other live parties
    /// are left alone.
    pub(crate) fn remove_from_party(
        &self,
        registry: &mut PartyRegistry,
        leader: ParticipantId,
        target: ParticipantId,
        kick: bool,
        broadcast_roster: bool,
    ) -> Vec<PartyAction> {
        tracing::debug!(%leader, %target, kick, "remove_from_party");
        let mut actions = Vec::new();

        // Leader already gone: answer the target alone and clear a stale
        // index entry, but never an entry pointing at a live party.
        if registry.lookup(leader).is_none() {
            actions.push(PartyAction::Notify {
                to: target,
                notice: PartyNotice::Dissolved {
                    instigator: target,
                    leader,
                    former_members: Vec::new(),
                    was_kick: kick,
                },
            });
            if registry.lookup(target) == Some(leader) {
                registry.unbind(target);
            }
            return actions;
        }

        // A target with no relation to this party has nothing to remove —
        // touching it here could strip a live affiliation elsewhere.
        let related = registry.party(leader).is_some_and(|party| {
            party.is_member(target) || party.is_pending(target) || party.was_kicked(target)
        });
        if !related && registry.lookup(target) != Some(leader) {
            return actions;
        }

        actions.push(PartyAction::Unwatch { participant: target });

        let Some(party) = registry.party_mut(leader) else {
            if registry.lookup(target) == Some(leader) {
                registry.unbind(target);
            }
            return actions;
        };
        party.members.retain(|m| *m != target);
        party.pending.remove(&target);
        party.kicked.remove(&target);
        if kick {
            party.kicked.insert(target);
        }
        let dissolves = target == leader || party.member_count() < 2;

        if dissolves {
            let party = registry
                .remove_party(leader)
                .expect("party present in dissolve branch");
            registry.unbind(leader);

            for invitee in &party.pending {
                if registry.lookup(*invitee) == Some(leader) {
                    registry.unbind(*invitee);
                    actions.push(PartyAction::Notify {
                        to: *invitee,
                        notice: PartyNotice::InviteCanceled,
                    });
                }
            }

            let mut former = party.members.clone();
            for member in &former {
                if registry.lookup(*member) == Some(leader) {
                    registry.unbind(*member);
                }
                if *member != target {
                    actions.push(PartyAction::Unwatch {
                        participant: *member,
                    });
                }
            }
            former.insert(0, target);

            if self.config.cancel_dispatch_on_dissolve {
                actions.push(PartyAction::CancelDispatch { leader });
            }
            actions.push(PartyAction::Broadcast {
                to: former.clone(),
                notice: PartyNotice::Dissolved {
                    instigator: target,
                    leader,
                    former_members: former,
                    was_kick: kick,
                },
            });
        } else if broadcast_roster {
            let party = registry.party(leader).expect("party retained");
            actions.push(PartyAction::Broadcast {
                to: party.audience(),
                notice: PartyNotice::RosterUpdated {
                    roster: party.roster(),
                },
            });
        }

        if registry.lookup(target) == Some(leader) {
            registry.unbind(target);
        }
        actions
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn add_to_party(
        &self,
        registry: &mut PartyRegistry,
        leader: ParticipantId,
        invitee: ParticipantId,
    ) -> Vec<PartyAction> {
        let Some(party) = registry.party_mut(leader) else {
            // Party vanished under the accept — tell the invitee and drop
            // whatever stale entry is left.
            registry.unbind(invitee);
            return vec![PartyAction::Notify {
                to: invitee,
                notice: PartyNotice::Dissolved {
                    instigator: leader,
                    leader,
                    former_members: Vec::new(),
                    was_kick: false,
                },
            }];
        };

        party.pending.remove(&invitee);
        if !party.is_member(invitee) {
            party.members.push(invitee);
        }
        let roster = party.roster();
        let audience = party.audience();
        registry.bind(invitee, leader);

        vec![
            PartyAction::Broadcast {
                to: audience,
                notice: PartyNotice::RosterUpdated { roster },
            },
            PartyAction::Watch {
                participant: invitee,
            },
        ]
    }

    fn occupies_any_gateway(
        &self,
        gateways: &dyn GatewayDirectory,
        participant: ParticipantId,
    ) -> bool {
        self.config
            .gateways
            .iter()
            .any(|gateway| gateways.occupies_seat(*gateway, participant))
    }
}

fn invite_refused(
    inviter: ParticipantId,
    invitee: ParticipantId,
    code: BoardCode,
) -> Vec<PartyAction> {
    vec![
        PartyAction::Notify {
            to: inviter,
            notice: PartyNotice::InviteRejected { invitee, code },
        },
        PartyAction::Notify {
            to: invitee,
            notice: PartyNotice::InvitationFailed { inviter },
        },
    ]
}
