/// Party runtime — integrates the party engines into a live event loop.
///
/// A single spawned task owns the registry, coordinator, dispatcher, and
/// watcher, and multiplexes over application commands, external member
/// signals, and dispatch timers. Every inbound request runs its handler to
/// completion before the next is processed; the deferred dispatch timer is
/// the only suspension point.
mod r#loop;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::HoistProtocolError;
use crate::gateway::{AuditSink, GatewayDirectory, SessionDirectory};
use crate::party::{PartyConfig, PartyNotice, PartyRoster};
use crate::types::{GatewayId, ParticipantId};
use crate::watch::MemberSignal;

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Commands the hosting layer sends to the runtime event loop. Caller
/// identity is resolved by the transport layer and passed explicitly.
pub enum RuntimeCommand {
    /// A participant invites another into their party.
    Invite {
        inviter: ParticipantId,
        invitee: ParticipantId,
    },
    /// The inviter withdraws an outstanding invitation.
    CancelInvite {
        inviter: ParticipantId,
        invitee: ParticipantId,
    },
    /// The invitee accepts an invitation.
    AcceptInvite {
        invitee: ParticipantId,
        leader: ParticipantId,
        inviter: ParticipantId,
    },
    /// The invitee declines an invitation.
    RejectInvite {
        invitee: ParticipantId,
        leader: ParticipantId,
        inviter: ParticipantId,
    },
    /// The leader removes a member.
    Kick {
        leader: ParticipantId,
        target: ParticipantId,
    },
    /// A member departs on their own.
    Leave {
        member: ParticipantId,
        leader: ParticipantId,
    },
    /// The leader entered a gateway, requesting that the party board.
    RequestBoard {
        leader: ParticipantId,
        gateway: GatewayId,
    },
    /// Phase 1 of the go handshake.
    RequestGoFirst {
        leader: ParticipantId,
        gateway: GatewayId,
    },
    /// Phase 2 of the go handshake; arms the deferred dispatch.
    RequestGoSecond {
        leader: ParticipantId,
        gateway: GatewayId,
    },
    /// The leader changed the destination selector.
    InformDestinationChange {
        leader: ParticipantId,
        offset: u32,
    },
    /// Query: a leader's current roster.
    GetRoster {
        leader: ParticipantId,
        reply: oneshot::Sender<Option<PartyRoster>>,
    },
    /// Query: which leader a participant is affiliated with.
    GetAffiliation {
        participant: ParticipantId,
        reply: oneshot::Sender<Option<ParticipantId>>,
    },
    /// Graceful shutdown.
    Shutdown,
}

// ── Deliveries (runtime → app) ────────────────────────────────────────

/// An outbound notification addressed to one participant. The transport
/// layer above resolves the session and serializes the notice.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ParticipantId,
    pub notice: PartyNotice,
}

// ── Metrics ───────────────────────────────────────────────────────────

/// Counters the runtime maintains. Shared with the handle, so snapshots
/// never round-trip through the loop.
#[derive(Debug, Default)]
pub struct PartyMetrics {
    pub invites: hoist_metrics::Counter,
    pub accepts: hoist_metrics::Counter,
    pub rejections: hoist_metrics::Counter,
    pub dissolutions: hoist_metrics::Counter,
    pub dispatches: hoist_metrics::Counter,
    pub active_parties: hoist_metrics::Gauge,
}

impl PartyMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invites: self.invites.get(),
            accepts: self.accepts.get(),
            rejections: self.rejections.get(),
            dissolutions: self.dissolutions.get(),
            dispatches: self.dispatches.get(),
            active_parties: self.active_parties.get(),
        }
    }
}

/// Point-in-time view of [`PartyMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub invites: u64,
    pub accepts: u64,
    pub rejections: u64,
    pub dissolutions: u64,
    pub dispatches: u64,
    pub active_parties: i64,
}

// ── RuntimeHandle (app-facing API) ────────────────────────────────────

/// Handle to communicate with a running [`PartyRuntime`].
///
/// Cheap to clone. All methods are non-blocking channel sends.
#[derive(Clone)]
pub struct RuntimeHandle {
    cmd_tx: mpsc::Sender<RuntimeCommand>,
    metrics: Arc<PartyMetrics>,
}

impl RuntimeHandle {
    async fn send(&self, cmd: RuntimeCommand) -> Result<(), HoistProtocolError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| HoistProtocolError::RuntimeClosed)
    }

    pub async fn invite(
        &self,
        inviter: ParticipantId,
        invitee: ParticipantId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::Invite { inviter, invitee }).await
    }

    pub async fn cancel_invite(
        &self,
        inviter: ParticipantId,
        invitee: ParticipantId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::CancelInvite { inviter, invitee })
            .await
    }

    pub async fn accept_invite(
        &self,
        invitee: ParticipantId,
        leader: ParticipantId,
        inviter: ParticipantId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::AcceptInvite {
            invitee,
            leader,
            inviter,
        })
        .await
    }

    pub async fn reject_invite(
        &self,
        invitee: ParticipantId,
        leader: ParticipantId,
        inviter: ParticipantId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::RejectInvite {
            invitee,
            leader,
            inviter,
        })
        .await
    }

    pub async fn kick(
        &self,
        leader: ParticipantId,
        target: ParticipantId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::Kick { leader, target }).await
    }

    pub async fn leave(
        &self,
        member: ParticipantId,
        leader: ParticipantId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::Leave { member, leader }).await
    }

    pub async fn request_board(
        &self,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::RequestBoard { leader, gateway })
            .await
    }

    pub async fn request_go_first(
        &self,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::RequestGoFirst { leader, gateway })
            .await
    }

    pub async fn request_go_second(
        &self,
        leader: ParticipantId,
        gateway: GatewayId,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::RequestGoSecond { leader, gateway })
            .await
    }

    pub async fn inform_destination_change(
        &self,
        leader: ParticipantId,
        offset: u32,
    ) -> Result<(), HoistProtocolError> {
        self.send(RuntimeCommand::InformDestinationChange { leader, offset })
            .await
    }

    /// Current roster for a leader, or `None` if they lead nothing.
    pub async fn roster(&self, leader: ParticipantId) -> Option<PartyRoster> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(RuntimeCommand::GetRoster { leader, reply: tx })
            .await;
        rx.await.unwrap_or_default()
    }

    /// The leader a participant is affiliated with, if any.
    pub async fn affiliation(&self, participant: ParticipantId) -> Option<ParticipantId> {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(RuntimeCommand::GetAffiliation {
                participant,
                reply: tx,
            })
            .await;
        rx.await.unwrap_or_default()
    }

    /// Snapshot the runtime counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown).await;
    }
}

// ── RuntimeChannels ───────────────────────────────────────────────────

/// Channels returned to the hosting layer when the runtime starts.
pub struct RuntimeChannels {
    /// Handle to send commands to the runtime.
    pub handle: RuntimeHandle,
    /// Receive outbound notifications for participants.
    pub deliveries: mpsc::Receiver<Delivery>,
}

// ── PartyRuntime ──────────────────────────────────────────────────────

/// The party runtime — spawn it and communicate via channels.
pub struct PartyRuntime;

impl PartyRuntime {
    /// Validate the configuration and start the event loop as a tokio task.
    ///
    /// `signals` is the external event-bus feed: the session layer pushes
    /// every disconnect, zone-change, and combat signal it sees; the
    /// runtime's watcher ignores those for unaffiliated participants.
    pub fn spawn(
        config: PartyConfig,
        gateways: Arc<dyn GatewayDirectory + Send + Sync>,
        sessions: Arc<dyn SessionDirectory + Send + Sync>,
        audit: Arc<dyn AuditSink + Send + Sync>,
        signals: mpsc::Receiver<MemberSignal>,
    ) -> Result<RuntimeChannels, HoistProtocolError> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>(64);
        let (delivery_tx, delivery_rx) = mpsc::channel::<Delivery>(64);
        let metrics = Arc::new(PartyMetrics::default());

        tokio::spawn(r#loop::runtime_loop(
            config,
            gateways,
            sessions,
            audit,
            cmd_rx,
            signals,
            delivery_tx,
            Arc::clone(&metrics),
        ));

        Ok(RuntimeChannels {
            handle: RuntimeHandle { cmd_tx, metrics },
            deliveries: delivery_rx,
        })
    }
}
