/// The party runtime event loop.
///
/// A single async task that owns all mutable party state and multiplexes
/// over application commands, external member signals, and the deferred
/// dispatch timers.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::dispatch::DestinationDispatcher;
use crate::gateway::{AuditSink, GatewayDirectory, SessionDirectory};
use crate::party::{PartyAction, PartyConfig, PartyCoordinator, PartyNotice, PartyRegistry};
use crate::types::ParticipantId;
use crate::watch::{EventWatcher, MemberSignal};

use super::{Delivery, PartyMetrics, RuntimeCommand};

/// Placeholder deadline used while no dispatch timer is armed; the select
/// arm is disabled then, so it is never polled.
const IDLE_DEADLINE: Duration = Duration::from_secs(3600);

/// Main event loop — owns all party state.
#[allow(clippy::too_many_arguments)]
pub(super) async fn runtime_loop(
    config: PartyConfig,
    gateways: Arc<dyn GatewayDirectory + Send + Sync>,
    sessions: Arc<dyn SessionDirectory + Send + Sync>,
    audit: Arc<dyn AuditSink + Send + Sync>,
    mut cmd_rx: mpsc::Receiver<RuntimeCommand>,
    mut signal_rx: mpsc::Receiver<MemberSignal>,
    delivery_tx: mpsc::Sender<Delivery>,
    metrics: Arc<PartyMetrics>,
) {
    let coordinator = PartyCoordinator::new(config);
    let mut registry = PartyRegistry::new();
    let mut dispatcher = DestinationDispatcher::new();
    let mut watcher = EventWatcher::new();
    // One armed dispatch timer per leader.
    let mut timers: Vec<(Instant, ParticipantId)> = Vec::new();
    let mut signals_open = true;

    loop {
        let next_deadline = timers.iter().map(|(deadline, _)| *deadline).min();

        tokio::select! {
            // ── 1. Commands from the hosting layer ──────────────
            maybe_cmd = cmd_rx.recv() => {
                let Some(cmd) = maybe_cmd else { break };
                match cmd {
                    RuntimeCommand::Invite { inviter, invitee } => {
                        metrics.invites.inc();
                        let actions = coordinator.request_invite(
                            &mut registry, gateways.as_ref(), inviter, invitee,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::CancelInvite { inviter, invitee } => {
                        let actions = coordinator.request_cancel_invite(
                            &mut registry, inviter, invitee,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::AcceptInvite { invitee, leader, inviter } => {
                        metrics.accepts.inc();
                        let actions = coordinator.request_accept_invite(
                            &mut registry, invitee, leader, inviter,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::RejectInvite { invitee, leader, inviter } => {
                        let actions = coordinator.request_reject_invite(
                            &mut registry, invitee, leader, inviter,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::Kick { leader, target } => {
                        let actions = coordinator.request_kick(&mut registry, leader, target);
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::Leave { member, leader } => {
                        let actions = coordinator.request_leave(&mut registry, member, leader);
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::RequestBoard { leader, gateway } => {
                        let actions = dispatcher.request_board(
                            &registry, coordinator.config(), gateways.as_ref(),
                            sessions.as_ref(), leader, gateway,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::RequestGoFirst { leader, gateway } => {
                        let actions = dispatcher.request_go_first(
                            &registry, coordinator.config(), gateways.as_ref(),
                            leader, gateway,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::RequestGoSecond { leader, gateway } => {
                        let actions = dispatcher.request_go_second(
                            &registry, coordinator.config(), gateways.as_ref(),
                            leader, gateway,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::InformDestinationChange { leader, offset } => {
                        let actions = dispatcher.inform_destination_change(
                            &registry, coordinator.config(), leader, offset,
                        );
                        execute_actions(
                            actions, gateways.as_ref(), audit.as_ref(),
                            &mut watcher, &mut dispatcher, &mut timers,
                            &delivery_tx, &metrics,
                        ).await;
                    }
                    RuntimeCommand::GetRoster { leader, reply } => {
                        let _ = reply.send(registry.party(leader).map(|p| p.roster()));
                    }
                    RuntimeCommand::GetAffiliation { participant, reply } => {
                        let _ = reply.send(registry.lookup(participant));
                    }
                    RuntimeCommand::Shutdown => break,
                }
                metrics.active_parties.set(registry.party_count() as i64);
            }

            // ── 2. Member signals from the event bus ────────────
            maybe_signal = signal_rx.recv(), if signals_open => {
                let Some(signal) = maybe_signal else {
                    signals_open = false;
                    continue;
                };
                if !watcher.accepts(&signal) {
                    continue;
                }
                let actions = match signal {
                    MemberSignal::Disconnected { participant } => {
                        coordinator.handle_disconnect(&mut registry, participant)
                    }
                    MemberSignal::ZoneChanged { participant, zone } => {
                        coordinator.handle_zone_change(&mut registry, participant, zone)
                    }
                    MemberSignal::CombatJoined { participant } => {
                        coordinator.handle_combat_joined(participant)
                    }
                    MemberSignal::CombatLeft { participant } => {
                        coordinator.handle_combat_left(participant)
                    }
                };
                execute_actions(
                    actions, gateways.as_ref(), audit.as_ref(),
                    &mut watcher, &mut dispatcher, &mut timers,
                    &delivery_tx, &metrics,
                ).await;
                metrics.active_parties.set(registry.party_count() as i64);
            }

            // ── 3. Deferred dispatch timers ─────────────────────
            _ = tokio::time::sleep_until(
                next_deadline.unwrap_or_else(|| Instant::now() + IDLE_DEADLINE)
            ), if next_deadline.is_some() => {
                let now = Instant::now();
                let mut due = Vec::new();
                timers.retain(|(deadline, leader)| {
                    if *deadline <= now {
                        due.push(*leader);
                        false
                    } else {
                        true
                    }
                });
                for leader in due {
                    let actions = dispatcher.complete(
                        &registry, coordinator.config(), gateways.as_ref(), leader,
                    );
                    execute_actions(
                        actions, gateways.as_ref(), audit.as_ref(),
                        &mut watcher, &mut dispatcher, &mut timers,
                        &delivery_tx, &metrics,
                    ).await;
                }
            }

            else => break,
        }
    }

    tracing::debug!("party runtime stopped");
}

// ── Action executor ─────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn execute_actions(
    actions: Vec<PartyAction>,
    gateways: &(dyn GatewayDirectory + Send + Sync),
    audit: &(dyn AuditSink + Send + Sync),
    watcher: &mut EventWatcher,
    dispatcher: &mut DestinationDispatcher,
    timers: &mut Vec<(Instant, ParticipantId)>,
    delivery_tx: &mpsc::Sender<Delivery>,
    metrics: &PartyMetrics,
) {
    for action in actions {
        match action {
            PartyAction::Notify { to, notice } => {
                count_notice(&notice, metrics);
                let _ = delivery_tx.send(Delivery { to, notice }).await;
            }
            PartyAction::Broadcast { to, notice } => {
                count_notice(&notice, metrics);
                for target in to {
                    let _ = delivery_tx
                        .send(Delivery {
                            to: target,
                            notice: notice.clone(),
                        })
                        .await;
                }
            }
            PartyAction::Watch { participant } => {
                watcher.subscribe(participant);
            }
            PartyAction::Unwatch { participant } => {
                watcher.unsubscribe(participant);
            }
            PartyAction::Admit {
                gateway,
                participant,
                with_show,
            } => {
                if !gateways.admit(gateway, participant, with_show) {
                    tracing::debug!(%gateway, %participant, "admit dropped, handle gone");
                }
            }
            PartyAction::ScheduleDispatch { leader, delay } => {
                timers.push((Instant::now() + delay, leader));
            }
            PartyAction::CancelDispatch { leader } => {
                dispatcher.cancel(leader);
                timers.retain(|(_, timer_leader)| *timer_leader != leader);
            }
            PartyAction::Dispatch { gateway, riders } => {
                metrics.dispatches.inc();
                if !gateways.dispatch(gateway, &riders) {
                    tracing::debug!(%gateway, "dispatch dropped, handle gone");
                }
            }
            PartyAction::Audit {
                participant,
                detail,
            } => {
                audit.record(participant, &detail);
            }
        }
    }
}

fn count_notice(notice: &PartyNotice, metrics: &PartyMetrics) {
    match notice {
        PartyNotice::InviteRejected { .. }
        | PartyNotice::PartySizeRejected { .. }
        | PartyNotice::BoardingRejected { .. }
        | PartyNotice::GoRejected { .. } => metrics.rejections.inc(),
        PartyNotice::Dissolved { .. } => metrics.dissolutions.inc(),
        _ => {}
    }
}
