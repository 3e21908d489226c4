//! Client-side view of a match.
//!
//! Holds a replica of the server's [`WorldState`] kept current by full
//! states and revisioned patches, plus the per-entity render views. The
//! local slime is predicted with the same kinematics the server runs;
//! everything else eases toward its last authoritative position.

use log::{debug, info, warn};
use shared::{
    integrate_player, time_factor, Change, InputState, Packet, Phase, Player, StatePatch,
    Vector2, WorldState,
};
use std::collections::BTreeMap;
use std::fmt;

/// Smoothing factor per frame for remote slimes.
pub const REMOTE_SMOOTHING: f64 = 0.25;
/// Smoothing factor for the local slime while it is not being predicted.
pub const LOCAL_SMOOTHING: f64 = 0.2;
pub const BALL_SMOOTHING: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// A patch arrived before any full state
    NoBaseline,
    RevisionMismatch { local: u32, base: u32 },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NoBaseline => write!(f, "patch received before full state"),
            SyncError::RevisionMismatch { local, base } => write!(
                f,
                "patch based on revision {} but local revision is {}",
                base, local
            ),
        }
    }
}

impl std::error::Error for SyncError {}

/// Where an entity is drawn versus where the server last put it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub position: Vector2,
    pub target: Vector2,
}

impl EntityView {
    fn at(position: Vector2) -> Self {
        Self {
            position,
            target: position,
        }
    }

    fn ease(&mut self, alpha: f64, enabled: bool) {
        if enabled {
            self.position.lerp_toward(&self.target, alpha);
        } else {
            self.position = self.target;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub session_id: String,
    pub player_index: u8,
    pub is_local: bool,
    pub view: EntityView,
}

pub struct ClientGameState {
    world: Option<WorldState>,
    revision: u32,

    session_id: Option<String>,
    room_id: Option<u32>,
    player_index: Option<u8>,
    status: Option<String>,

    players: BTreeMap<String, PlayerView>,
    ball: EntityView,
    /// Locally simulated copy of our own slime
    predicted: Option<Player>,
    /// Set after a goal; the next authoritative update re-seeds prediction
    resync_prediction: bool,

    scores: [u32; 2],
    winner_session_id: Option<String>,

    pub prediction_enabled: bool,
    pub interpolation_enabled: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            world: None,
            revision: 0,
            session_id: None,
            room_id: None,
            player_index: None,
            status: None,
            players: BTreeMap::new(),
            ball: EntityView::at(Vector2::zero()),
            predicted: None,
            resync_prediction: false,
            scores: [0, 0],
            winner_session_id: None,
            prediction_enabled: true,
            interpolation_enabled: true,
        }
    }

    /// Consumes one server packet. Returns a reply for the transport to send,
    /// which is only ever a full-state request after a revision gap.
    pub fn handle_packet(&mut self, packet: Packet) -> Option<Packet> {
        match packet {
            Packet::Connected {
                session_id,
                room_id,
                player_index,
            } => {
                info!(
                    "Joined room {} as {} (player {})",
                    room_id, session_id, player_index
                );
                self.session_id = Some(session_id);
                self.room_id = Some(room_id);
                self.player_index = Some(player_index);
                self.status = None;
            }
            Packet::Rejected { reason } => {
                warn!("Connection rejected: {}", reason);
                self.status = Some(format!("Rejected: {}", reason));
            }
            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.status = Some(format!("Disconnected: {}", reason));
                self.session_id = None;
            }
            Packet::FullState { revision, state } => self.apply_full_state(revision, state),
            Packet::Patch(patch) => {
                if let Err(e) = self.apply_patch(&patch) {
                    warn!("Discarding patch: {}", e);
                    return Some(Packet::RequestFullState);
                }
            }
            Packet::ScoreUpdate { scores } => {
                info!("Score {} - {}", scores[0], scores[1]);
                self.scores = scores;
                self.resync_prediction = true;
            }
            Packet::GameOver { winner_session_id } => {
                info!("Game over, winner {:?}", winner_session_id);
                self.winner_session_id = winner_session_id;
            }
            other => warn!("Unexpected packet from server: {:?}", other),
        }
        None
    }

    /// Replaces the replica and rebuilds every view at its authoritative spot.
    pub fn apply_full_state(&mut self, revision: u32, state: WorldState) {
        debug!("Full state at revision {}", revision);
        self.players.clear();
        self.predicted = None;
        for player in state.players.values() {
            self.add_view(player);
        }
        self.ball = EntityView::at(state.ball.position);
        self.revision = revision;
        self.world = Some(state);
        self.resync_prediction = false;
        self.refresh_metadata();
    }

    pub fn apply_patch(&mut self, patch: &StatePatch) -> Result<(), SyncError> {
        let world = self.world.as_mut().ok_or(SyncError::NoBaseline)?;
        if patch.base_revision != self.revision {
            return Err(SyncError::RevisionMismatch {
                local: self.revision,
                base: patch.base_revision,
            });
        }

        world.apply_changes(&patch.changes);
        self.revision = patch.revision;

        for change in &patch.changes {
            match change {
                Change::PlayerAdded(player) => self.add_view(player),
                Change::PlayerRemoved { session_id } => {
                    self.players.remove(session_id);
                    if self.is_local(session_id) {
                        self.predicted = None;
                    }
                }
                Change::PlayerPosition {
                    session_id,
                    position,
                } => {
                    if let Some(view) = self.players.get_mut(session_id) {
                        view.view.target = *position;
                    }
                }
                Change::BallPosition(position) => self.ball.target = *position,
                _ => {}
            }
        }

        if self.resync_prediction {
            self.reseed_prediction();
            self.resync_prediction = false;
        }
        self.refresh_metadata();
        Ok(())
    }

    /// Advances views by one frame.
    pub fn update(&mut self, delta_ms: f64, input: InputState) {
        let predicting = self.prediction_enabled && self.phase() == Phase::Playing;

        if predicting {
            self.predict_local(delta_ms, input);
        } else {
            self.reseed_prediction();
        }

        let smoothing = self.interpolation_enabled;
        for player in self.players.values_mut() {
            if player.is_local {
                if predicting {
                    if let Some(predicted) = &self.predicted {
                        player.view.position = predicted.position;
                    }
                } else {
                    player.view.ease(LOCAL_SMOOTHING, smoothing);
                }
            } else {
                player.view.ease(REMOTE_SMOOTHING, smoothing);
            }
        }
        self.ball.ease(BALL_SMOOTHING, smoothing);
    }

    fn predict_local(&mut self, delta_ms: f64, input: InputState) {
        let Some(bounds) = self.world.as_ref().map(WorldState::bounds) else {
            return;
        };
        if self.predicted.is_none() {
            self.reseed_prediction();
        }
        if let Some(predicted) = self.predicted.as_mut() {
            predicted.input_left = input.left;
            predicted.input_right = input.right;
            if input.jump {
                predicted.input_jump = true;
            }
            integrate_player(predicted, bounds, time_factor(delta_ms));
        }
    }

    /// Copies the authoritative local slime into the prediction.
    fn reseed_prediction(&mut self) {
        let local = self
            .session_id
            .as_ref()
            .and_then(|id| self.world.as_ref()?.players.get(id))
            .cloned();
        self.predicted = local;
    }

    fn add_view(&mut self, player: &Player) {
        let is_local = self.is_local(&player.session_id);
        self.players.insert(
            player.session_id.clone(),
            PlayerView {
                session_id: player.session_id.clone(),
                player_index: player.player_index,
                is_local,
                view: EntityView::at(player.position),
            },
        );
        if is_local {
            self.predicted = Some(player.clone());
        }
    }

    fn refresh_metadata(&mut self) {
        if let Some(world) = &self.world {
            self.scores = world.scores();
            if world.phase == Phase::GameOver {
                self.winner_session_id = world.winner_session_id.clone();
            }
        }
    }

    fn is_local(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    pub fn toggle_prediction(&mut self) -> bool {
        self.prediction_enabled = !self.prediction_enabled;
        self.prediction_enabled
    }

    pub fn toggle_interpolation(&mut self) -> bool {
        self.interpolation_enabled = !self.interpolation_enabled;
        self.interpolation_enabled
    }

    pub fn world(&self) -> Option<&WorldState> {
        self.world.as_ref()
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn phase(&self) -> Phase {
        self.world.as_ref().map_or(Phase::Waiting, |w| w.phase)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn room_id(&self) -> Option<u32> {
        self.room_id
    }

    pub fn player_index(&self) -> Option<u8> {
        self.player_index
    }

    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    /// Last rejection or disconnect reason, for display
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn scores(&self) -> [u32; 2] {
        self.scores
    }

    pub fn winner_session_id(&self) -> Option<&str> {
        self.winner_session_id.as_deref()
    }

    pub fn player_views(&self) -> impl Iterator<Item = &PlayerView> {
        self.players.values()
    }

    pub fn ball_view(&self) -> &EntityView {
        &self.ball
    }

    pub fn debug_hitboxes(&self) -> bool {
        self.world.as_ref().is_some_and(|w| w.debug_hitboxes)
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
