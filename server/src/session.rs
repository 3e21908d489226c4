//! Match lifecycle: admission, phase transitions and leave handling.
//!
//! A [`Session`] owns the [`WorldState`] of one match. The transport layer
//! calls `on_join`/`on_leave`/`on_input` as connection events arrive and
//! `on_tick` once per server tick; everything that mutates the world goes
//! through here or through [`crate::game::advance`].

use crate::game::{self, GameEvent};
use log::{debug, info};
use shared::{
    InputMessage, Phase, Player, WorldState, DEFAULT_FIELD_HEIGHT, DEFAULT_FIELD_WIDTH,
    DEFAULT_MAX_SCORE, MAX_PLAYERS,
};

/// Per-match tunables, folded in from the server's command line.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Hold the match in `Waiting` until both slots are filled. Off by
    /// default: the first join starts play.
    pub wait_for_opponent: bool,
    pub max_score: u32,
    pub debug_hitboxes: bool,
    pub field_width: f64,
    pub field_height: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            wait_for_opponent: false,
            max_score: DEFAULT_MAX_SCORE,
            debug_hitboxes: false,
            field_width: DEFAULT_FIELD_WIDTH,
            field_height: DEFAULT_FIELD_HEIGHT,
        }
    }
}

impl MatchConfig {
    /// Default tunables, but the match only starts once two players are in.
    pub fn head_to_head() -> Self {
        Self {
            wait_for_opponent: true,
            ..Self::default()
        }
    }

    /// Number of players needed to leave `Waiting`.
    pub fn start_threshold(&self) -> usize {
        if self.wait_for_opponent {
            MAX_PLAYERS
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Accepted { player_index: u8 },
    Rejected { reason: String },
}

impl JoinOutcome {
    fn rejected(reason: &str) -> Self {
        JoinOutcome::Rejected {
            reason: reason.to_string(),
        }
    }
}

pub struct Session {
    world: WorldState,
    config: MatchConfig,
    disposed: bool,
}

impl Session {
    pub fn new(config: MatchConfig) -> Self {
        let mut world = WorldState::with_field(config.field_width, config.field_height);
        world.max_score = config.max_score;
        world.debug_hitboxes = config.debug_hitboxes;

        Self {
            world,
            config,
            disposed: false,
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.world.phase
    }

    pub fn player_count(&self) -> usize {
        self.world.players.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether another player could be admitted right now.
    pub fn is_joinable(&self) -> bool {
        !self.disposed && self.world.phase == Phase::Waiting && self.player_count() < MAX_PLAYERS
    }

    /// Admits a new player. Joins are only accepted while waiting and below
    /// capacity; there is no queue.
    pub fn on_join(&mut self, session_id: &str) -> JoinOutcome {
        if self.disposed {
            return JoinOutcome::rejected("Match closed");
        }
        if self.world.phase != Phase::Waiting {
            return JoinOutcome::rejected("Match already started");
        }
        if self.player_count() >= MAX_PLAYERS {
            return JoinOutcome::rejected("Room is full");
        }
        if self.world.players.contains_key(session_id) {
            return JoinOutcome::rejected("Already joined");
        }

        let Some(player_index) =
            (0..MAX_PLAYERS as u8).find(|index| self.world.player_by_index(*index).is_none())
        else {
            return JoinOutcome::rejected("Room is full");
        };

        let x = self.world.start_x(player_index);
        let y = self.world.player_ground_y();
        self.world.players.insert(
            session_id.to_string(),
            Player::new(session_id, player_index, x, y),
        );
        info!(
            "Player {} joined as index {} ({}/{})",
            session_id,
            player_index,
            self.player_count(),
            MAX_PLAYERS
        );

        if self.player_count() >= self.config.start_threshold() {
            self.world.phase = Phase::Playing;
            game::reset_positions(&mut self.world);
            info!("Match started with {} player(s)", self.player_count());
        }

        JoinOutcome::Accepted { player_index }
    }

    /// Removes a player. Leaving mid-match ends it: the remaining player, if
    /// any, wins and the session stops ticking.
    pub fn on_leave(&mut self, session_id: &str, was_graceful: bool) -> Option<GameEvent> {
        self.world.players.remove(session_id)?;
        info!(
            "Player {} left ({})",
            session_id,
            if was_graceful { "graceful" } else { "dropped" }
        );

        if self.world.phase == Phase::Playing && self.player_count() < MAX_PLAYERS {
            let winner = self.world.players.keys().next().cloned();
            self.world.phase = Phase::GameOver;
            self.world.winner_session_id = winner.clone();
            info!("Match ended by departure, winner {:?}", winner);
            self.dispose();
            return Some(GameEvent::GameOver {
                winner_session_id: winner,
            });
        }

        None
    }

    /// Buffers input flags for the next tick. Returns false when the input
    /// was dropped (not playing or unknown session).
    pub fn on_input(&mut self, session_id: &str, input: InputMessage) -> bool {
        if self.world.phase != Phase::Playing {
            debug!("Dropping input from {} while {}", session_id, self.world.phase);
            return false;
        }
        let Some(player) = self.world.players.get_mut(session_id) else {
            return false;
        };

        if let Some(left) = input.left {
            player.input_left = left;
        }
        if let Some(right) = input.right {
            player.input_right = right;
        }
        if input.jump == Some(true) {
            player.input_jump = true;
        }
        true
    }

    pub fn on_tick(&mut self, delta_ms: f64) -> Vec<GameEvent> {
        if self.disposed {
            return Vec::new();
        }
        game::advance(&mut self.world, delta_ms)
    }

    pub fn dispose(&mut self) {
        if !self.disposed {
            debug!("Session disposed in phase {}", self.world.phase);
        }
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Vector2, BASELINE_FRAME_MS};

    fn started_session() -> Session {
        let mut session = Session::new(MatchConfig::head_to_head());
        session.on_join("alpha");
        session.on_join("bravo");
        session
    }

    #[test]
    fn test_new_session_uses_config() {
        let session = Session::new(MatchConfig {
            max_score: 5,
            debug_hitboxes: true,
            ..MatchConfig::default()
        });

        assert_eq!(session.phase(), Phase::Waiting);
        assert_eq!(session.world().max_score, 5);
        assert!(session.world().debug_hitboxes);
        assert_eq!(session.world().ball.position, Vector2::new(640.0, 360.0));
        assert!(session.is_joinable());
    }

    #[test]
    fn test_first_join_waits_for_opponent() {
        let mut session = Session::new(MatchConfig::head_to_head());

        let outcome = session.on_join("alpha");

        assert_eq!(outcome, JoinOutcome::Accepted { player_index: 0 });
        assert_eq!(session.phase(), Phase::Waiting);
        let player = &session.world().players["alpha"];
        assert_eq!(player.position, Vector2::new(320.0, 656.0));
    }

    #[test]
    fn test_second_join_starts_match() {
        let mut session = Session::new(MatchConfig::head_to_head());
        session.on_join("alpha");

        let outcome = session.on_join("bravo");

        assert_eq!(outcome, JoinOutcome::Accepted { player_index: 1 });
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.world().ball.position, Vector2::new(640.0, 240.0));
        assert_eq!(
            session.world().players["bravo"].position,
            Vector2::new(960.0, 656.0)
        );
        assert!(!session.is_joinable());
    }

    #[test]
    fn test_first_join_starts_match() {
        let mut session = Session::new(MatchConfig::default());

        let outcome = session.on_join("alpha");

        assert_eq!(outcome, JoinOutcome::Accepted { player_index: 0 });
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.world().ball.position, Vector2::new(640.0, 240.0));
        assert_eq!(
            session.world().players["alpha"].position,
            Vector2::new(320.0, 656.0)
        );
        assert!(!session.is_joinable());

        // Already playing, so the second player is turned away
        assert!(matches!(
            session.on_join("bravo"),
            JoinOutcome::Rejected { .. }
        ));
        assert_eq!(session.player_count(), 1);
    }

    #[test]
    fn test_join_rejected_when_full_or_started() {
        let mut session = started_session();

        match session.on_join("charlie") {
            JoinOutcome::Rejected { reason } => assert!(!reason.is_empty()),
            other => panic!("Expected rejection, got {:?}", other),
        }
        assert_eq!(session.player_count(), 2);
        assert!(!session.world().players.contains_key("charlie"));
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut session = Session::new(MatchConfig::head_to_head());
        session.on_join("alpha");

        assert!(matches!(
            session.on_join("alpha"),
            JoinOutcome::Rejected { .. }
        ));
        assert_eq!(session.player_count(), 1);
    }

    #[test]
    fn test_scenario_leave_mid_match() {
        let mut session = started_session();

        let event = session.on_leave("alpha", false);

        assert_eq!(
            event,
            Some(GameEvent::GameOver {
                winner_session_id: Some("bravo".into())
            })
        );
        assert_eq!(session.phase(), Phase::GameOver);
        assert_eq!(session.world().winner_session_id.as_deref(), Some("bravo"));
        assert!(session.is_disposed());

        let frozen = session.world().clone();
        assert!(session.on_tick(BASELINE_FRAME_MS).is_empty());
        assert_eq!(session.world(), &frozen);
    }

    #[test]
    fn test_last_player_leaving_solo_match_has_no_winner() {
        let mut session = Session::new(MatchConfig::default());
        session.on_join("alpha");

        let event = session.on_leave("alpha", true);

        assert_eq!(
            event,
            Some(GameEvent::GameOver {
                winner_session_id: None
            })
        );
        assert_eq!(session.phase(), Phase::GameOver);
    }

    #[test]
    fn test_leave_while_waiting_keeps_waiting() {
        let mut session = Session::new(MatchConfig::head_to_head());
        session.on_join("alpha");

        assert!(session.on_leave("alpha", true).is_none());
        assert_eq!(session.phase(), Phase::Waiting);
        assert_eq!(session.player_count(), 0);

        // The slot is free again
        assert_eq!(
            session.on_join("bravo"),
            JoinOutcome::Accepted { player_index: 0 }
        );
    }

    #[test]
    fn test_unknown_leave_is_noop() {
        let mut session = started_session();
        assert!(session.on_leave("ghost", true).is_none());
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_input_dropped_unless_playing() {
        let mut session = Session::new(MatchConfig::head_to_head());
        session.on_join("alpha");

        let accepted = session.on_input(
            "alpha",
            InputMessage {
                left: Some(true),
                ..InputMessage::default()
            },
        );

        assert!(!accepted);
        assert!(!session.world().players["alpha"].input_left);
    }

    #[test]
    fn test_partial_input_keeps_previous_flags() {
        let mut session = started_session();
        session.on_input(
            "alpha",
            InputMessage {
                left: Some(true),
                right: Some(false),
                jump: None,
            },
        );

        session.on_input(
            "alpha",
            InputMessage {
                left: None,
                right: Some(true),
                jump: Some(false),
            },
        );

        let player = &session.world().players["alpha"];
        assert!(player.input_left);
        assert!(player.input_right);
        assert!(!player.input_jump);
    }

    #[test]
    fn test_jump_is_edge_triggered() {
        let mut session = started_session();
        session.on_input(
            "alpha",
            InputMessage {
                jump: Some(true),
                ..InputMessage::default()
            },
        );
        assert!(session.world().players["alpha"].input_jump);

        // A later false does not cancel a pending jump
        session.on_input(
            "alpha",
            InputMessage {
                jump: Some(false),
                ..InputMessage::default()
            },
        );
        assert!(session.world().players["alpha"].input_jump);

        session.on_tick(BASELINE_FRAME_MS);
        assert!(!session.world().players["alpha"].input_jump);
    }

    #[test]
    fn test_input_for_unknown_session() {
        let mut session = started_session();
        assert!(!session.on_input("ghost", InputMessage::default()));
    }

    #[test]
    fn test_dispose_stops_ticks() {
        let mut session = started_session();
        session.on_input(
            "alpha",
            InputMessage {
                right: Some(true),
                ..InputMessage::default()
            },
        );
        session.dispose();

        let before = session.world().clone();
        assert!(session.on_tick(BASELINE_FRAME_MS).is_empty());
        assert_eq!(session.world(), &before);
        assert!(matches!(
            session.on_join("charlie"),
            JoinOutcome::Rejected { .. }
        ));
    }
}
