/// DestinationDispatcher — the two-phase go handshake and its deferred
/// commit, plus direct boarding.
///
/// Phase 1 acknowledges the leader alone. Phase 2 notifies every current
/// member and arms a deferred dispatch carrying the member list captured at
/// that instant. When the timer fires, membership may have changed; the
/// discrepancy is audited but the captured list is dispatched — unless the
/// party dissolved first and cancellation is configured.
use std::collections::HashMap;
use std::time::Duration;

use crate::gate::BoardingGate;
use crate::gateway::{GatewayDirectory, SessionDirectory};
use crate::party::{BoardCode, PartyAction, PartyConfig, PartyNotice, PartyRegistry};
use crate::types::{GatewayId, ParticipantId};

/// A scheduled dispatch job: delay, payload snapshot, and the leader key
/// that doubles as its cancellation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTicket {
    pub ticket_id: String,
    pub leader: ParticipantId,
    pub gateway: GatewayId,
    /// Member list captured when the second go request was confirmed.
    pub riders: Vec<ParticipantId>,
    pub delay: Duration,
}

/// Orchestrates go handshakes and boarding for all parties at one location.
///
/// At most one outstanding dispatch job per leader.
#[derive(Debug, Default)]
pub struct DestinationDispatcher {
    outstanding: HashMap<ParticipantId, DispatchTicket>,
}

impl DestinationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a dispatch job is armed for this leader.
    pub fn has_outstanding(&self, leader: ParticipantId) -> bool {
        self.outstanding.contains_key(&leader)
    }

    /// The outstanding ticket for a leader, if any.
    pub fn ticket(&self, leader: ParticipantId) -> Option<&DispatchTicket> {
        self.outstanding.get(&leader)
    }

    // ── Go handshake ─────────────────────────────────────────────────────

    /// Phase 1: the leader pressed the go control. Only the leader hears
    /// the outcome.
    pub fn request_go_first(
        &self,
        registry: &PartyRegistry,
        config: &PartyConfig,
        gateways: &dyn GatewayDirectory,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Vec<PartyAction> {
        match self.check_go(registry, config, gateways, leader, gateway) {
            Ok(()) => vec![PartyAction::Notify {
                to: leader,
                notice: PartyNotice::GoFirstAccepted { gateway },
            }],
            Err(actions) => actions,
        }
    }

    /// Phase 2: the leader confirmed after the local pre-show. Every
    /// current member is told to start theirs, and the deferred dispatch is
    /// armed with the member list as of right now.
    pub fn request_go_second(
        &mut self,
        registry: &PartyRegistry,
        config: &PartyConfig,
        gateways: &dyn GatewayDirectory,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Vec<PartyAction> {
        if self.has_outstanding(leader) {
            return vec![PartyAction::Audit {
                participant: leader,
                detail: "confirmed a second dispatch while one is outstanding".into(),
            }];
        }

        match self.check_go(registry, config, gateways, leader, gateway) {
            Ok(()) => {
                let riders = registry
                    .party(leader)
                    .map(|party| party.members.clone())
                    .unwrap_or_default();

                let ticket = DispatchTicket {
                    ticket_id: format!("go-{}", uuid::Uuid::new_v4()),
                    leader,
                    gateway,
                    riders: riders.clone(),
                    delay: config.dispatch_delay,
                };
                tracing::debug!(%leader, %gateway, ticket = %ticket.ticket_id, ?riders, "dispatch armed");
                self.outstanding.insert(leader, ticket);

                vec![
                    PartyAction::Broadcast {
                        to: riders,
                        notice: PartyNotice::GoSecondAccepted { gateway },
                    },
                    PartyAction::ScheduleDispatch {
                        leader,
                        delay: config.dispatch_delay,
                    },
                ]
            }
            Err(actions) => actions,
        }
    }

    /// The deferred timer fired. Re-validates against the first captured
    /// rider as a stand-in leader check; a discrepancy is audited but never
    /// aborts the dispatch.
    pub fn complete(
        &mut self,
        registry: &PartyRegistry,
        config: &PartyConfig,
        gateways: &dyn GatewayDirectory,
        leader: ParticipantId,
    ) -> Vec<PartyAction> {
        let Some(ticket) = self.outstanding.remove(&leader) else {
            return Vec::new();
        };
        if ticket.riders.is_empty() {
            return Vec::new();
        }
        if !config.gateways.contains(&ticket.gateway) || !gateways.contains(ticket.gateway) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let check = BoardingGate::evaluate(
            registry,
            config,
            gateways,
            ticket.riders[0],
            ticket.gateway,
            false,
        );
        if !check.is_okay() {
            actions.push(PartyAction::Audit {
                participant: ticket.riders[0],
                detail: format!(
                    "dispatch {} proceeding with code {:?} after the go confirmation",
                    ticket.ticket_id, check.code
                ),
            });
            for rider in &check.failing {
                actions.push(PartyAction::Audit {
                    participant: *rider,
                    detail: "failed requirements after the go confirmation".into(),
                });
            }
            for rider in &check.in_combat {
                actions.push(PartyAction::Audit {
                    participant: *rider,
                    detail: "entered combat after the go confirmation".into(),
                });
            }
        }

        tracing::info!(gateway = %ticket.gateway, riders = ?ticket.riders, "dispatching party");
        actions.push(PartyAction::Dispatch {
            gateway: ticket.gateway,
            riders: ticket.riders,
        });
        actions
    }

    /// Disarm the job for a leader. Returns the ticket it would have run.
    pub fn cancel(&mut self, leader: ParticipantId) -> Option<DispatchTicket> {
        let ticket = self.outstanding.remove(&leader);
        if let Some(ticket) = &ticket {
            tracing::debug!(%leader, ticket = %ticket.ticket_id, "dispatch canceled");
        }
        ticket
    }

    // ── Direct boarding ──────────────────────────────────────────────────

    /// The leader walked into the gateway instead of pressing go: admit the
    /// whole party if there is room right now.
    pub fn request_board(
        &self,
        registry: &PartyRegistry,
        config: &PartyConfig,
        gateways: &dyn GatewayDirectory,
        sessions: &dyn SessionDirectory,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Vec<PartyAction> {
        let check = BoardingGate::evaluate(registry, config, gateways, leader, gateway, true);
        if !check.is_okay() {
            return vec![PartyAction::Notify {
                to: leader,
                notice: PartyNotice::BoardingRejected {
                    gateway,
                    code: check.code,
                    failing: check.failing,
                    in_combat: check.in_combat,
                },
            }];
        }
        if !sessions.is_present(leader) {
            return vec![PartyAction::Notify {
                to: leader,
                notice: PartyNotice::BoardingRejected {
                    gateway,
                    code: BoardCode::Missing,
                    failing: Vec::new(),
                    in_combat: Vec::new(),
                },
            }];
        }

        let party = registry.party(leader).expect("gate verified the leader");
        let mut actions = vec![PartyAction::Admit {
            gateway,
            participant: leader,
            with_show: false,
        }];
        for member in &party.members {
            if *member != leader && sessions.is_present(*member) {
                actions.push(PartyAction::Admit {
                    gateway,
                    participant: *member,
                    with_show: true,
                });
            }
        }
        tracing::info!(%gateway, riders = ?party.members, "party boarding");
        actions
    }

    // ── Destination change ───────────────────────────────────────────────

    /// The leader flipped the destination selector. Out-of-range offsets
    /// are a protocol violation: audited, no state change.
    pub fn inform_destination_change(
        &self,
        registry: &PartyRegistry,
        config: &PartyConfig,
        leader: ParticipantId,
        offset: u32,
    ) -> Vec<PartyAction> {
        if offset as usize >= config.gateways.len() {
            return vec![PartyAction::Audit {
                participant: leader,
                detail: format!("selected destination offset {offset}, which does not exist"),
            }];
        }
        let Some(party) = registry.party(leader) else {
            return Vec::new();
        };
        let others: Vec<ParticipantId> = party
            .members
            .iter()
            .copied()
            .filter(|member| *member != leader)
            .collect();
        if others.is_empty() {
            return Vec::new();
        }
        vec![PartyAction::Broadcast {
            to: others,
            notice: PartyNotice::DestinationChanged { offset },
        }]
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    /// Shared requirement test for both go phases. A leader already seated
    /// in the gateway is audited and silently refused — the go control is
    /// unreachable from inside.
    fn check_go(
        &self,
        registry: &PartyRegistry,
        config: &PartyConfig,
        gateways: &dyn GatewayDirectory,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Result<(), Vec<PartyAction>> {
        let check = BoardingGate::evaluate(registry, config, gateways, leader, gateway, false);
        if !check.is_okay() {
            return Err(vec![PartyAction::Notify {
                to: leader,
                notice: PartyNotice::GoRejected {
                    gateway,
                    code: check.code,
                    failing: check.failing,
                    in_combat: check.in_combat,
                },
            }]);
        }
        if gateways.occupies_seat(gateway, leader) {
            return Err(vec![PartyAction::Audit {
                participant: leader,
                detail: "pressed the go control while seated in the gateway".into(),
            }]);
        }
        Ok(())
    }
}
