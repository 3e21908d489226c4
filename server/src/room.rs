//! Rooms: one match, its members and its outbound queue.
//!
//! A [`Room`] glues a [`Session`] to a [`StateSync`]. The transport feeds it
//! connection events and drains [`Outbound`] packets after every join, leave
//! and tick. Notifications produced by the session are always queued ahead
//! of the state patch of the same flush.
//!
//! [`RoomRegistry`] places incoming connections: into the room they asked
//! for, or into the first joinable room, or into a fresh one.

use crate::game::GameEvent;
use crate::session::{JoinOutcome, MatchConfig, Session};
use crate::sync::StateSync;
use log::{debug, info};
use shared::{InputMessage, Packet};
use std::collections::BTreeMap;

/// Who a packet is meant for, resolved against the room's members at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Session(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub packet: Packet,
}

impl From<GameEvent> for Packet {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::ScoreUpdate { scores } => Packet::ScoreUpdate { scores },
            GameEvent::GameOver { winner_session_id } => Packet::GameOver { winner_session_id },
        }
    }
}

pub struct Room {
    id: u32,
    session: Session,
    sync: StateSync,
    /// Connected session ids in join order
    members: Vec<String>,
    notifications: Vec<Outbound>,
}

impl Room {
    pub fn new(id: u32, config: MatchConfig) -> Self {
        let session = Session::new(config);
        let sync = StateSync::new(session.world());
        Self {
            id,
            session,
            sync,
            members: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn has_member(&self, session_id: &str) -> bool {
        self.members.iter().any(|m| m == session_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_joinable(&self) -> bool {
        self.session.is_joinable()
    }

    pub fn join(&mut self, session_id: &str) -> JoinOutcome {
        let outcome = self.session.on_join(session_id);
        if let JoinOutcome::Accepted { player_index } = outcome {
            self.members.push(session_id.to_string());
            self.notifications.push(Outbound {
                target: Target::Session(session_id.to_string()),
                packet: Packet::Connected {
                    session_id: session_id.to_string(),
                    room_id: self.id,
                    player_index,
                },
            });
            self.sync.request_full_state(session_id);
            info!("Room {}: {} joined", self.id, session_id);
        }
        outcome
    }

    pub fn leave(&mut self, session_id: &str, was_graceful: bool) {
        self.members.retain(|m| m != session_id);
        self.sync.forget(session_id);
        if let Some(event) = self.session.on_leave(session_id, was_graceful) {
            self.notify(event);
        }
    }

    pub fn input(&mut self, session_id: &str, input: InputMessage) -> bool {
        if !self.has_member(session_id) {
            return false;
        }
        self.session.on_input(session_id, input)
    }

    pub fn request_full_state(&mut self, session_id: &str) {
        if self.has_member(session_id) {
            debug!("Room {}: full state requested by {}", self.id, session_id);
            self.sync.request_full_state(session_id);
        }
    }

    pub fn tick(&mut self, delta_ms: f64) {
        for event in self.session.on_tick(delta_ms) {
            self.notify(event);
        }
    }

    /// Drains queued notifications followed by the state update.
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        let mut outbound = std::mem::take(&mut self.notifications);
        outbound.extend(self.sync.flush(self.session.world(), &self.members));
        outbound
    }

    /// Session ids a target expands to, restricted to current members.
    pub fn recipients(&self, target: &Target) -> Vec<String> {
        match target {
            Target::All => self.members.clone(),
            Target::Session(id) if self.has_member(id) => vec![id.clone()],
            Target::Session(_) => Vec::new(),
        }
    }

    fn notify(&mut self, event: GameEvent) {
        self.notifications.push(Outbound {
            target: Target::All,
            packet: event.into(),
        });
    }
}

pub struct RoomRegistry {
    rooms: BTreeMap<u32, Room>,
    next_room_id: u32,
    config: MatchConfig,
}

impl RoomRegistry {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            rooms: BTreeMap::new(),
            next_room_id: 1,
            config,
        }
    }

    /// Places a connection. Returns the room id on success or the rejection
    /// reason. An explicitly requested room must exist and accept the join.
    pub fn join(&mut self, session_id: &str, requested: Option<u32>) -> Result<u32, String> {
        let room_id = match requested {
            Some(room_id) => {
                if !self.rooms.contains_key(&room_id) {
                    return Err(format!("Room {} not found", room_id));
                }
                room_id
            }
            None => match self.rooms.values().find(|room| room.is_joinable()) {
                Some(room) => room.id(),
                None => self.create_room(),
            },
        };

        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| format!("Room {} not found", room_id))?;
        match room.join(session_id) {
            JoinOutcome::Accepted { .. } => Ok(room_id),
            JoinOutcome::Rejected { reason } => Err(reason),
        }
    }

    pub fn create_room(&mut self) -> u32 {
        let room_id = self.next_room_id;
        self.next_room_id += 1;
        self.rooms
            .insert(room_id, Room::new(room_id, self.config.clone()));
        info!("Created room {}", room_id);
        room_id
    }

    pub fn room(&self, room_id: u32) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn room_mut(&mut self, room_id: u32) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn room_ids(&self) -> Vec<u32> {
        self.rooms.keys().copied().collect()
    }

    /// Drops rooms nobody is connected to. Returns the removed ids.
    pub fn remove_empty(&mut self) -> Vec<u32> {
        let empty: Vec<u32> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.is_empty())
            .map(|(id, _)| *id)
            .collect();

        for room_id in &empty {
            self.rooms.remove(room_id);
            info!("Closed room {}", room_id);
        }
        empty
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
