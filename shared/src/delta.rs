//! State deltas between two snapshots of a [`WorldState`].
//!
//! The server diffs the snapshot it last broadcast against the current one
//! and ships the resulting change list. Clients apply the same list to their
//! copy. Entity-level changes carry the session id so the consumer can route
//! them straight to the matching view without rescanning the tree.

use crate::world::{Phase, Player, Vector2, WorldState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    PlayerAdded(Player),
    PlayerRemoved {
        session_id: String,
    },
    PlayerPosition {
        session_id: String,
        position: Vector2,
    },
    PlayerVelocity {
        session_id: String,
        velocity: Vector2,
    },
    PlayerScore {
        session_id: String,
        score: u32,
    },
    PlayerInput {
        session_id: String,
        left: bool,
        right: bool,
        jump: bool,
    },
    BallPosition(Vector2),
    BallVelocity(Vector2),
    Phase(Phase),
    Winner(Option<String>),
    Field {
        width: f64,
        height: f64,
        goal_width: f64,
        goal_height: f64,
    },
    MaxScore(u32),
    DebugHitboxes(bool),
}

impl Change {
    /// Session id of the entity this change targets, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Change::PlayerAdded(player) => Some(&player.session_id),
            Change::PlayerRemoved { session_id }
            | Change::PlayerPosition { session_id, .. }
            | Change::PlayerVelocity { session_id, .. }
            | Change::PlayerScore { session_id, .. }
            | Change::PlayerInput { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

/// A change list tagged with the revision it applies to and the one it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub base_revision: u32,
    pub revision: u32,
    pub changes: Vec<Change>,
}

/// Computes the minimal change list that turns `prev` into `next`.
pub fn diff(prev: &WorldState, next: &WorldState) -> Vec<Change> {
    let mut changes = Vec::new();

    for session_id in prev.players.keys() {
        if !next.players.contains_key(session_id) {
            changes.push(Change::PlayerRemoved {
                session_id: session_id.clone(),
            });
        }
    }

    for (session_id, player) in &next.players {
        let Some(old) = prev.players.get(session_id) else {
            changes.push(Change::PlayerAdded(player.clone()));
            continue;
        };

        if old.player_index != player.player_index {
            // Indexes are never reassigned; treat it as a replacement.
            changes.push(Change::PlayerRemoved {
                session_id: session_id.clone(),
            });
            changes.push(Change::PlayerAdded(player.clone()));
            continue;
        }
        if old.position != player.position {
            changes.push(Change::PlayerPosition {
                session_id: session_id.clone(),
                position: player.position,
            });
        }
        if old.velocity != player.velocity {
            changes.push(Change::PlayerVelocity {
                session_id: session_id.clone(),
                velocity: player.velocity,
            });
        }
        if old.score != player.score {
            changes.push(Change::PlayerScore {
                session_id: session_id.clone(),
                score: player.score,
            });
        }
        if old.input_left != player.input_left
            || old.input_right != player.input_right
            || old.input_jump != player.input_jump
        {
            changes.push(Change::PlayerInput {
                session_id: session_id.clone(),
                left: player.input_left,
                right: player.input_right,
                jump: player.input_jump,
            });
        }
    }

    if prev.ball.position != next.ball.position {
        changes.push(Change::BallPosition(next.ball.position));
    }
    if prev.ball.velocity != next.ball.velocity {
        changes.push(Change::BallVelocity(next.ball.velocity));
    }
    if prev.phase != next.phase {
        changes.push(Change::Phase(next.phase));
    }
    if prev.winner_session_id != next.winner_session_id {
        changes.push(Change::Winner(next.winner_session_id.clone()));
    }
    if prev.field_width != next.field_width
        || prev.field_height != next.field_height
        || prev.goal_width != next.goal_width
        || prev.goal_height != next.goal_height
    {
        changes.push(Change::Field {
            width: next.field_width,
            height: next.field_height,
            goal_width: next.goal_width,
            goal_height: next.goal_height,
        });
    }
    if prev.max_score != next.max_score {
        changes.push(Change::MaxScore(next.max_score));
    }
    if prev.debug_hitboxes != next.debug_hitboxes {
        changes.push(Change::DebugHitboxes(next.debug_hitboxes));
    }

    changes
}

impl WorldState {
    /// Applies a change list produced by [`diff`]. Changes addressed to a
    /// player that is not present are skipped.
    pub fn apply_changes(&mut self, changes: &[Change]) {
        for change in changes {
            self.apply_change(change);
        }
    }

    fn apply_change(&mut self, change: &Change) {
        match change {
            Change::PlayerAdded(player) => {
                self.players
                    .insert(player.session_id.clone(), player.clone());
            }
            Change::PlayerRemoved { session_id } => {
                self.players.remove(session_id);
            }
            Change::PlayerPosition {
                session_id,
                position,
            } => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.position = *position;
                }
            }
            Change::PlayerVelocity {
                session_id,
                velocity,
            } => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.velocity = *velocity;
                }
            }
            Change::PlayerScore { session_id, score } => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.score = *score;
                }
            }
            Change::PlayerInput {
                session_id,
                left,
                right,
                jump,
            } => {
                if let Some(player) = self.players.get_mut(session_id) {
                    player.input_left = *left;
                    player.input_right = *right;
                    player.input_jump = *jump;
                }
            }
            Change::BallPosition(position) => self.ball.position = *position,
            Change::BallVelocity(velocity) => self.ball.velocity = *velocity,
            Change::Phase(phase) => self.phase = *phase,
            Change::Winner(winner) => self.winner_session_id = winner.clone(),
            Change::Field {
                width,
                height,
                goal_width,
                goal_height,
            } => {
                self.field_width = *width;
                self.field_height = *height;
                self.goal_width = *goal_width;
                self.goal_height = *goal_height;
            }
            Change::MaxScore(max_score) => self.max_score = *max_score,
            Change::DebugHitboxes(enabled) => self.debug_hitboxes = *enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_world() -> WorldState {
        let mut world = WorldState::new();
        for (id, index) in [("alpha", 0u8), ("bravo", 1u8)] {
            let x = world.start_x(index);
            let y = world.player_ground_y();
            world
                .players
                .insert(id.to_string(), Player::new(id, index, x, y));
        }
        world
    }

    #[test]
    fn test_identical_snapshots_produce_no_changes() {
        let world = two_player_world();
        assert!(diff(&world, &world.clone()).is_empty());
    }

    #[test]
    fn test_moved_player_only_reports_kinematics() {
        let prev = two_player_world();
        let mut next = prev.clone();
        if let Some(player) = next.players.get_mut("alpha") {
            player.position.x += 5.0;
            player.velocity.x = 5.0;
        }

        let changes = diff(&prev, &next);

        assert_eq!(changes.len(), 2);
        assert!(matches!(
            &changes[0],
            Change::PlayerPosition { session_id, .. } if session_id == "alpha"
        ));
        assert!(matches!(
            &changes[1],
            Change::PlayerVelocity { session_id, .. } if session_id == "alpha"
        ));
    }

    #[test]
    fn test_join_and_leave_changes() {
        let prev = two_player_world();
        let mut next = prev.clone();
        next.players.remove("bravo");
        next.players
            .insert("charlie".into(), Player::new("charlie", 1, 960.0, 656.0));

        let changes = diff(&prev, &next);

        assert!(changes
            .iter()
            .any(|c| matches!(c, Change::PlayerRemoved { session_id } if session_id == "bravo")));
        assert!(changes
            .iter()
            .any(|c| matches!(c, Change::PlayerAdded(p) if p.session_id == "charlie")));
    }

    #[test]
    fn test_apply_reconstructs_next_snapshot() {
        let prev = two_player_world();
        let mut next = prev.clone();
        next.phase = Phase::GameOver;
        next.winner_session_id = Some("bravo".into());
        next.ball.position = Vector2::new(10.0, 700.0);
        next.ball.velocity = Vector2::new(-6.0, 2.0);
        next.debug_hitboxes = true;
        next.max_score = 5;
        next.players.remove("alpha");
        if let Some(player) = next.players.get_mut("bravo") {
            player.score = 3;
            player.input_jump = true;
        }

        let mut rebuilt = prev.clone();
        rebuilt.apply_changes(&diff(&prev, &next));

        assert_eq!(rebuilt, next);
    }

    #[test]
    fn test_change_session_id() {
        let change = Change::PlayerScore {
            session_id: "alpha".into(),
            score: 1,
        };
        assert_eq!(change.session_id(), Some("alpha"));
        assert_eq!(Change::Phase(Phase::Playing).session_id(), None);
    }

    #[test]
    fn test_change_for_missing_player_is_skipped() {
        let mut world = two_player_world();
        let before = world.clone();
        world.apply_changes(&[Change::PlayerScore {
            session_id: "ghost".into(),
            score: 9,
        }]);
        assert_eq!(world, before);
    }
}
