/// Integration test: full party lifecycle.
///
/// Drives the PartyCoordinator and PartyRegistry together without a
/// runtime — pure in-memory request handling.
///
/// Scenario: a leader invites two participants, one accepts, one declines;
/// a member is kicked and re-invited; the leader departs and the party
/// dissolves.
use std::collections::HashSet;
use std::sync::Mutex;

use hoist_protocol::{
    BoardCode, GatewayDirectory, GatewayId, Party, PartyAction, PartyConfig, PartyCoordinator,
    PartyNotice, PartyRegistry, ParticipantId,
};

const GATEWAY: GatewayId = GatewayId(100);

fn pid(raw: u64) -> ParticipantId {
    ParticipantId(raw)
}

/// Gateway stub: nobody seated, plenty of room.
struct IdleGateways {
    seated: Mutex<HashSet<ParticipantId>>,
}

impl IdleGateways {
    fn new() -> Self {
        Self {
            seated: Mutex::new(HashSet::new()),
        }
    }
}

impl GatewayDirectory for IdleGateways {
    fn contains(&self, gateway: GatewayId) -> bool {
        gateway == GATEWAY
    }

    fn open_seats(&self, gateway: GatewayId) -> Option<usize> {
        self.contains(gateway).then_some(8)
    }

    fn occupies_seat(&self, _gateway: GatewayId, participant: ParticipantId) -> bool {
        self.seated.lock().unwrap().contains(&participant)
    }

    fn admit(&self, _gateway: GatewayId, participant: ParticipantId, _with_show: bool) -> bool {
        self.seated.lock().unwrap().insert(participant);
        true
    }

    fn dispatch(&self, _gateway: GatewayId, _riders: &[ParticipantId]) -> bool {
        true
    }
}

fn coordinator() -> PartyCoordinator {
    PartyCoordinator::new(PartyConfig {
        gateways: vec![GATEWAY],
        ..PartyConfig::default()
    })
}

/// The index and the party stores must agree after every operation.
fn check_invariants(registry: &PartyRegistry, capacity: usize) {
    for leader in registry.leaders() {
        let party = registry.party(leader).unwrap();
        assert!(party.member_count() <= capacity, "party over capacity");
        assert_eq!(party.members.first(), Some(&leader), "leader not element 0");
        for member in &party.members {
            assert_eq!(registry.lookup(*member), Some(leader), "member unindexed");
            assert!(!party.is_pending(*member), "member also pending");
        }
        for invitee in &party.roster().pending {
            assert_eq!(registry.lookup(*invitee), Some(leader), "invitee unindexed");
        }
    }
}

#[test]
fn full_party_lifecycle() {
    let coord = coordinator();
    let gateways = IdleGateways::new();
    let mut registry = PartyRegistry::new();
    let (alice, bob, carol) = (pid(1), pid(2), pid(3));

    // ── Step 1: Alice invites Bob — party springs into existence ─────
    let actions = coord.request_invite(&mut registry, &gateways, alice, bob);
    assert!(actions
        .iter()
        .any(|a| matches!(a, PartyAction::Watch { participant } if *participant == alice)));

    let party = registry.party(alice).expect("party created");
    assert_eq!(party.members, vec![alice]);
    assert!(party.is_pending(bob));
    check_invariants(&registry, 4);

    // ── Step 2: Bob accepts ──────────────────────────────────────────
    let actions = coord.request_accept_invite(&mut registry, bob, alice, alice);
    let party = registry.party(alice).unwrap();
    assert_eq!(party.members, vec![alice, bob]);
    assert!(party.roster().pending.is_empty());
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Broadcast {
            notice: PartyNotice::RosterUpdated { .. },
            ..
        }
    )));
    check_invariants(&registry, 4);

    // ── Step 3: Bob invites Carol, who declines ──────────────────────
    let actions = coord.request_invite(&mut registry, &gateways, bob, carol);
    // Alice (a member who is not the inviter) hears about it.
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Notify {
            to,
            notice: PartyNotice::MemberInvited { .. },
        } if *to == alice
    )));
    check_invariants(&registry, 4);

    let actions = coord.request_reject_invite(&mut registry, carol, alice, bob);
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Notify {
            to,
            notice: PartyNotice::InviteDeclined { invitee },
        } if *to == bob && *invitee == carol
    )));
    assert_eq!(registry.lookup(carol), None);
    check_invariants(&registry, 4);

    // ── Step 4: Carol joins after all, then gets kicked ──────────────
    coord.request_invite(&mut registry, &gateways, alice, carol);
    coord.request_accept_invite(&mut registry, carol, alice, alice);
    assert_eq!(registry.party(alice).unwrap().member_count(), 3);

    let actions = coord.request_kick(&mut registry, alice, carol);
    let party = registry.party(alice).unwrap();
    assert!(party.was_kicked(carol));
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Notify {
            to,
            notice: PartyNotice::Kicked { .. },
        } if *to == carol
    )));
    check_invariants(&registry, 4);

    // ── Step 5: re-invite clears the kicked marker ───────────────────
    coord.request_invite(&mut registry, &gateways, alice, carol);
    let party = registry.party(alice).unwrap();
    assert!(!party.was_kicked(carol));
    assert!(party.is_pending(carol));
    check_invariants(&registry, 4);

    // ── Step 6: the leader leaves — everything unwinds ───────────────
    let actions = coord.request_leave(&mut registry, alice, alice);
    assert_eq!(registry.party_count(), 0);
    assert_eq!(registry.indexed_count(), 0);

    // Carol's open invitation is canceled, and the dissolve broadcast
    // names Alice first.
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Notify {
            to,
            notice: PartyNotice::InviteCanceled,
        } if *to == carol
    )));
    let former = actions
        .iter()
        .find_map(|a| match a {
            PartyAction::Broadcast {
                notice: PartyNotice::Dissolved { former_members, .. },
                ..
            } => Some(former_members.clone()),
            _ => None,
        })
        .expect("dissolve broadcast");
    assert_eq!(former.first(), Some(&alice));
}

#[test]
fn full_party_rejects_fifth_member() {
    let coord = coordinator();
    let gateways = IdleGateways::new();
    let mut registry = PartyRegistry::new();

    for invitee in 2..=4u64 {
        coord.request_invite(&mut registry, &gateways, pid(1), pid(invitee));
        coord.request_accept_invite(&mut registry, pid(invitee), pid(1), pid(1));
    }
    assert_eq!(registry.party(pid(1)).unwrap().member_count(), 4);

    let actions = coord.request_invite(&mut registry, &gateways, pid(1), pid(5));
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Notify {
            notice: PartyNotice::PartySizeRejected { .. },
            ..
        }
    )));
    assert_eq!(registry.lookup(pid(5)), None);
    check_invariants(&registry, 4);
}

#[test]
fn dissolved_party_releases_every_watch() {
    let coord = coordinator();
    let gateways = IdleGateways::new();
    let mut registry = PartyRegistry::new();

    coord.request_invite(&mut registry, &gateways, pid(1), pid(2));
    coord.request_accept_invite(&mut registry, pid(2), pid(1), pid(1));
    coord.request_invite(&mut registry, &gateways, pid(1), pid(3));
    coord.request_accept_invite(&mut registry, pid(3), pid(1), pid(1));

    // Disconnecting the leader dissolves a three-member party.
    let actions = coord.handle_disconnect(&mut registry, pid(1));
    let unwatched: Vec<ParticipantId> = actions
        .iter()
        .filter_map(|a| match a {
            PartyAction::Unwatch { participant } => Some(*participant),
            _ => None,
        })
        .collect();
    for watched in [pid(1), pid(2), pid(3)] {
        assert!(unwatched.contains(&watched), "{watched} left subscribed");
    }
    assert_eq!(registry.party_count(), 0);
}

#[test]
fn invite_while_seated_is_refused() {
    let coord = coordinator();
    let gateways = IdleGateways::new();
    gateways.seated.lock().unwrap().insert(pid(2));
    let mut registry = PartyRegistry::new();

    let actions = coord.request_invite(&mut registry, &gateways, pid(1), pid(2));
    assert!(actions.iter().any(|a| matches!(
        a,
        PartyAction::Notify {
            notice: PartyNotice::InviteRejected {
                code: BoardCode::InElevator,
                ..
            },
            ..
        }
    )));
    assert_eq!(registry.party_count(), 0);
}

#[test]
fn stale_leave_after_dissolve_is_silent() {
    let coord = coordinator();
    let gateways = IdleGateways::new();
    let mut registry = PartyRegistry::new();

    coord.request_invite(&mut registry, &gateways, pid(1), pid(2));
    coord.request_accept_invite(&mut registry, pid(2), pid(1), pid(1));
    coord.request_leave(&mut registry, pid(1), pid(1));
    assert_eq!(registry.party_count(), 0);

    // Bob's leave arrives after the dissolve already unbound him.
    let actions = coord.request_leave(&mut registry, pid(2), pid(1));
    assert!(actions.is_empty());
}

#[test]
fn party_aggregate_helpers() {
    let mut party = Party::new(pid(1));
    party.members.push(pid(2));
    party.pending.insert(pid(3));
    party.kicked.insert(pid(4));

    let roster = party.roster();
    assert_eq!(roster.leader, pid(1));
    assert_eq!(roster.members, vec![pid(1), pid(2)]);
    assert_eq!(roster.pending, vec![pid(3)]);
    assert_eq!(roster.kicked, vec![pid(4)]);
}
