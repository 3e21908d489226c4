//! Synchronized world state: the data tree every client reconstructs.

use crate::{
    BALL_RADIUS, DEFAULT_FIELD_HEIGHT, DEFAULT_FIELD_WIDTH, DEFAULT_GOAL_HEIGHT,
    DEFAULT_GOAL_WIDTH, DEFAULT_MAX_SCORE, PLAYER_RADIUS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A 2D position or velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: &Vector2) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Moves this point a fraction `alpha` of the way toward `target`.
    pub fn lerp_toward(&mut self, target: &Vector2, alpha: f64) {
        self.x += (target.x - self.x) * alpha;
        self.y += (target.y - self.y) * alpha;
    }
}

/// Match state machine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Waiting,
    Playing,
    GameOver,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Waiting => "waiting",
            Phase::Playing => "playing",
            Phase::GameOver => "gameOver",
        };
        f.write_str(name)
    }
}

/// One slime. Created on join, removed on leave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Opaque connection identity, stable for the lifetime of the connection
    pub session_id: String,
    /// Join order; decides starting side and which goal this player defends
    pub player_index: u8,
    pub position: Vector2,
    pub velocity: Vector2,
    pub score: u32,
    pub input_left: bool,
    pub input_right: bool,
    /// Edge-triggered: cleared by the physics step once the jump happens
    pub input_jump: bool,
}

impl Player {
    pub fn new(session_id: impl Into<String>, player_index: u8, x: f64, y: f64) -> Self {
        Self {
            session_id: session_id.into(),
            player_index,
            position: Vector2::new(x, y),
            velocity: Vector2::zero(),
            score: 0,
            input_left: false,
            input_right: false,
            input_jump: false,
        }
    }

    pub fn clear_inputs(&mut self) {
        self.input_left = false;
        self.input_right = false;
        self.input_jump = false;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ball {
    pub position: Vector2,
    pub velocity: Vector2,
}

/// Field dimensions, detached from the rest of the world so physics can
/// borrow players mutably while reading them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    pub width: f64,
    pub height: f64,
}

/// The synchronized root for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub players: BTreeMap<String, Player>,
    pub ball: Ball,
    pub phase: Phase,
    pub winner_session_id: Option<String>,
    pub field_width: f64,
    pub field_height: f64,
    pub goal_width: f64,
    pub goal_height: f64,
    pub max_score: u32,
    pub debug_hitboxes: bool,
}

impl WorldState {
    pub fn new() -> Self {
        Self::with_field(DEFAULT_FIELD_WIDTH, DEFAULT_FIELD_HEIGHT)
    }

    /// Creates an empty match with the ball resting at the field center.
    pub fn with_field(field_width: f64, field_height: f64) -> Self {
        Self {
            players: BTreeMap::new(),
            ball: Ball {
                position: Vector2::new(field_width / 2.0, field_height / 2.0),
                velocity: Vector2::zero(),
            },
            phase: Phase::Waiting,
            winner_session_id: None,
            field_width,
            field_height,
            goal_width: DEFAULT_GOAL_WIDTH,
            goal_height: DEFAULT_GOAL_HEIGHT,
            max_score: DEFAULT_MAX_SCORE,
            debug_hitboxes: false,
        }
    }

    pub fn bounds(&self) -> FieldBounds {
        FieldBounds {
            width: self.field_width,
            height: self.field_height,
        }
    }

    /// Resting y of a player's center.
    pub fn player_ground_y(&self) -> f64 {
        self.field_height - PLAYER_RADIUS
    }

    /// Resting y of the ball's center.
    pub fn ball_ground_y(&self) -> f64 {
        self.field_height - BALL_RADIUS
    }

    /// Starting x for the given side: a quarter of the field in from each edge.
    pub fn start_x(&self, player_index: u8) -> f64 {
        if player_index == 0 {
            self.field_width * 0.25
        } else {
            self.field_width * 0.75
        }
    }

    pub fn player_by_index(&self, player_index: u8) -> Option<&Player> {
        self.players
            .values()
            .find(|p| p.player_index == player_index)
    }

    pub fn player_by_index_mut(&mut self, player_index: u8) -> Option<&mut Player> {
        self.players
            .values_mut()
            .find(|p| p.player_index == player_index)
    }

    /// Scores keyed by player index, not join order. Missing players count as 0.
    pub fn scores(&self) -> [u32; 2] {
        [
            self.player_by_index(0).map_or(0, |p| p.score),
            self.player_by_index(1).map_or(0, |p| p.score),
        ]
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}
