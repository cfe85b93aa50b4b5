//! Standard invariant checks.

use pairplay_app::StatusSnapshot;
use pairplay_core::{PeerId, SessionState};

use super::{Invariant, InvariantResult, LanSnapshot, Violation};

fn connected_to(node: &StatusSnapshot) -> Option<PeerId> {
    match node.state {
        SessionState::Connected(peer) => Some(peer),
        _ => None,
    }
}

/// Advertising, browsing and a live session never overlap on one node.
pub struct ExclusiveActivity;

impl Invariant for ExclusiveActivity {
    fn name(&self) -> &'static str {
        "exclusive_activity"
    }

    fn check(&self, state: &LanSnapshot) -> InvariantResult {
        for node in &state.nodes {
            let active = [node.advertising, node.browsing, node.connected];
            if active.iter().filter(|on| **on).count() > 1 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "node {}: advertising={} browsing={} connected={}",
                        node.local.id(),
                        node.advertising,
                        node.browsing,
                        node.connected
                    ),
                });
            }
        }
        Ok(())
    }
}

/// An inbound offer can only be waiting on a node that is advertising.
pub struct PendingNeedsAdvertising;

impl Invariant for PendingNeedsAdvertising {
    fn name(&self) -> &'static str {
        "pending_needs_advertising"
    }

    fn check(&self, state: &LanSnapshot) -> InvariantResult {
        for node in &state.nodes {
            if let Some(offer) = &node.pending_invitation
                && !node.advertising
            {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "node {}: offer from {} pending while not advertising",
                        node.local.id(),
                        offer.id()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// If A is connected to B and B is on the LAN, B is connected to A. Two
/// remembered roles on one link are never the same.
pub struct LinkSymmetry;

impl Invariant for LinkSymmetry {
    fn name(&self) -> &'static str {
        "link_symmetry"
    }

    fn check(&self, state: &LanSnapshot) -> InvariantResult {
        for node in &state.nodes {
            let Some(peer) = connected_to(node) else {
                continue;
            };
            let Some(other) = state.nodes.iter().find(|other| other.local.id() == peer) else {
                continue;
            };

            if connected_to(other) != Some(node.local.id()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} is connected to {peer} but {peer} is {:?}",
                        node.local.id(),
                        other.state
                    ),
                });
            }
            if node.role.is_some() && node.role == other.role {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} and {peer} both hold role {:?}",
                        node.local.id(),
                        node.role
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Connected peers with the same game open sit in different seats, agree on
/// the winner, and exactly one of them is to move while the game is live.
pub struct SeatsAreComplementary;

impl Invariant for SeatsAreComplementary {
    fn name(&self) -> &'static str {
        "seats_are_complementary"
    }

    fn check(&self, state: &LanSnapshot) -> InvariantResult {
        for node in &state.nodes {
            let (Some(peer), Some(game)) = (connected_to(node), node.game.as_ref()) else {
                continue;
            };
            let Some(other_game) = state
                .nodes
                .iter()
                .find(|other| other.local.id() == peer)
                .and_then(|other| other.game.as_ref())
                .filter(|other_game| other_game.kind() == game.kind())
            else {
                continue;
            };

            let violation = |message: String| Violation { invariant: self.name(), message };
            if game.seat() == other_game.seat() {
                return Err(violation(format!(
                    "{} and {peer} both sit in {:?}",
                    node.local.id(),
                    game.seat()
                )));
            }
            if game.winner() != other_game.winner() {
                return Err(violation(format!(
                    "{} sees winner {:?}, {peer} sees {:?}",
                    node.local.id(),
                    game.winner(),
                    other_game.winner()
                )));
            }
            if game.winner().is_none() && game.is_my_turn() == other_game.is_my_turn() {
                return Err(violation(format!(
                    "{} and {peer} disagree on whose turn it is",
                    node.local.id()
                )));
            }
        }
        Ok(())
    }
}
