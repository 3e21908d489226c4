pub mod delta;
pub mod physics;
pub mod world;

pub use delta::{diff, Change, StatePatch};
pub use physics::{horizontal_velocity, integrate_player, time_factor};
pub use world::{Ball, FieldBounds, Phase, Player, Vector2, WorldState};

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

pub const GRAVITY: f64 = 1.2;
pub const PLAYER_MOVE_SPEED: f64 = 5.0;
pub const PLAYER_JUMP_FORCE: f64 = 10.0;
pub const BALL_KICK_FORCE: f64 = 8.0;
pub const BOUNCE_FACTOR: f64 = 0.9;
pub const PLAYER_RADIUS: f64 = 64.0;
pub const BALL_RADIUS: f64 = 16.0;
pub const PLAYER_GROUND_FRICTION: f64 = 0.9;
pub const BALL_GROUND_FRICTION: f64 = 0.95;
pub const BALL_AIR_FRICTION: f64 = 0.99;

pub const BASELINE_FRAME_MS: f64 = 16.67;
pub const MAX_DELTA_MS: f64 = 50.0;

pub const MAX_PLAYER_SPEED: f64 = 15.0;
pub const MAX_PLAYER_FALL_SPEED: f64 = MAX_PLAYER_SPEED * 1.5;
pub const MAX_BALL_SPEED: f64 = 25.0;

pub const MAX_PLAYERS: usize = 2;

pub const DEFAULT_FIELD_WIDTH: f64 = 1280.0;
pub const DEFAULT_FIELD_HEIGHT: f64 = 720.0;
pub const DEFAULT_GOAL_WIDTH: f64 = 100.0;
pub const DEFAULT_GOAL_HEIGHT: f64 = 200.0;
pub const DEFAULT_MAX_SCORE: u32 = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        room_id: Option<u32>,
    },
    Input(InputMessage),
    RequestFullState,
    /// Keeps an idle connection (e.g. waiting for an opponent) from timing out
    Heartbeat,
    Disconnect,

    Connected {
        session_id: String,
        room_id: u32,
        player_index: u8,
    },
    Rejected {
        reason: String,
    },
    FullState {
        revision: u32,
        state: WorldState,
    },
    Patch(StatePatch),
    ScoreUpdate {
        scores: [u32; 2],
    },
    GameOver {
        winner_session_id: Option<String>,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Client input as it travels on the wire. Absent fields keep their
/// previous server-side value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputMessage {
    pub left: Option<bool>,
    pub right: Option<bool>,
    pub jump: Option<bool>,
}

/// One frame of sampled input on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl From<InputState> for InputMessage {
    fn from(input: InputState) -> Self {
        Self {
            left: Some(input.left),
            right: Some(input.right),
            jump: Some(input.jump),
        }
    }
}
