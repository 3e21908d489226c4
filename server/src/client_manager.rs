//! Connection tracking for the server
//!
//! This module maps UDP peers to opaque session ids and remembers which
//! room each connection was placed in. It handles:
//! - Session id issuance (random, 9 alphanumeric characters)
//! - Client capacity limits across all rooms
//! - Activity tracking and timeout detection
//!
//! The game core never inspects session ids; it only uses them as keys.

use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const SESSION_ID_LEN: usize = 9;

/// A connected peer
#[derive(Debug, Clone)]
pub struct Client {
    /// Identity handed to the room and echoed back in `Connected`
    pub session_id: String,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Room the connection was placed in, once admitted
    pub room_id: Option<u32>,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(session_id: String, addr: SocketAddr) -> Self {
        Self {
            session_id,
            addr,
            room_id: None,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing arrived from this client within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Generates a random session id.
pub fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Manages all connected clients
///
/// Enforces the server-wide connection cap and answers the two lookups the
/// transport needs: session id by address and address by session id.
pub struct ClientManager {
    /// Connected clients indexed by session id
    clients: HashMap<String, Client>,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    /// Registers a new connection
    ///
    /// Returns the issued session id, or None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<String> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let mut session_id = generate_session_id();
        while self.clients.contains_key(&session_id) {
            session_id = generate_session_id();
        }

        info!("Client {} connected from {}", session_id, addr);
        self.clients
            .insert(session_id.clone(), Client::new(session_id.clone(), addr));

        Some(session_id)
    }

    /// Removes a client, returning its record if it was present
    pub fn remove_client(&mut self, session_id: &str) -> Option<Client> {
        let client = self.clients.remove(session_id)?;
        info!("Client {} disconnected", client.session_id);
        Some(client)
    }

    pub fn get(&self, session_id: &str) -> Option<&Client> {
        self.clients.get(session_id)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<&Client> {
        self.clients.values().find(|client| client.addr == addr)
    }

    /// Refreshes activity for the client at `addr` and returns a copy of it
    pub fn touch_by_addr(&mut self, addr: SocketAddr) -> Option<Client> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.touch();
        Some(client.clone())
    }

    pub fn set_room(&mut self, session_id: &str, room_id: u32) -> bool {
        match self.clients.get_mut(session_id) {
            Some(client) => {
                client.room_id = Some(room_id);
                true
            }
            None => false,
        }
    }

    pub fn addr_of(&self, session_id: &str) -> Option<SocketAddr> {
        self.clients.get(session_id).map(|client| client.addr)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed records so their rooms can treat them as a
    /// non-graceful leave.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timeout = self.timeout;
        let timed_out: Vec<String> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.session_id.clone())
            .collect();

        timed_out
            .iter()
            .filter_map(|session_id| self.remove_client(session_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
