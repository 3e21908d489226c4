//! Server network layer handling UDP communications and the room tick loop

use crate::client_manager::{Client, ClientManager};
use crate::room::{Outbound, RoomRegistry};
use crate::session::MatchConfig;
use bincode::serialize;
use log::{debug, error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client: Client },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Serialized once and sent to every address
    BroadcastPacket {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Runtime settings for the whole server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_micros(16_667),
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
            match_config: MatchConfig::default(),
        }
    }
}

/// Main server coordinating networking and room simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: RoomRegistry,
    tick_duration: Duration,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout,
            ))),
            rooms: RoomRegistry::new(config.match_config),
            tick_duration: config.tick_duration,
            tick: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Sender into the main loop; a `ServerMessage::Shutdown` stops `run`.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 8192];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::from_bytes(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &[addr]).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, addrs } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &addrs).await {
                            error!("Failed to broadcast packet: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addrs: &[SocketAddr],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        for addr in addrs {
            if let Err(e) = socket.send_to(&data, addr).await {
                warn!("Send to {} failed: {}", addr, e);
            }
        }
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Drains a room's outbound queue, resolving targets to addresses.
    async fn flush_room(&mut self, room_id: u32) {
        let Some(room) = self.rooms.room_mut(room_id) else {
            return;
        };

        let resolved: Vec<(Packet, Vec<String>)> = room
            .take_outbound()
            .into_iter()
            .map(|Outbound { target, packet }| {
                let recipients = room.recipients(&target);
                (packet, recipients)
            })
            .collect();

        if resolved.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for (packet, recipients) in resolved {
            let addrs: Vec<SocketAddr> = recipients
                .iter()
                .filter_map(|session_id| clients.addr_of(session_id))
                .collect();
            if addrs.is_empty() {
                continue;
            }
            if let Err(e) = self
                .game_tx
                .send(GameMessage::BroadcastPacket { packet, addrs })
            {
                error!("Failed to queue room packet: {}", e);
            }
        }
    }

    /// Removes a client from its room and flushes whatever that produced
    async fn leave_room(&mut self, client: &Client, was_graceful: bool) {
        let Some(room_id) = client.room_id else {
            return;
        };
        if let Some(room) = self.rooms.room_mut(room_id) {
            room.leave(&client.session_id, was_graceful);
        }
        self.flush_room(room_id).await;
        self.rooms.remove_empty();
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                room_id,
            } => self.handle_connect(addr, client_version, room_id).await,

            Packet::Input(input) => {
                let client = self.clients.write().await.touch_by_addr(addr);
                if let Some(Client {
                    session_id,
                    room_id: Some(room_id),
                    ..
                }) = client
                {
                    if let Some(room) = self.rooms.room_mut(room_id) {
                        room.input(&session_id, input);
                    }
                }
            }

            Packet::RequestFullState => {
                let client = self.clients.write().await.touch_by_addr(addr);
                if let Some(Client {
                    session_id,
                    room_id: Some(room_id),
                    ..
                }) = client
                {
                    if let Some(room) = self.rooms.room_mut(room_id) {
                        room.request_full_state(&session_id);
                    }
                }
            }

            Packet::Heartbeat => {
                self.clients.write().await.touch_by_addr(addr);
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    let session_id = clients
                        .find_client_by_addr(addr)
                        .map(|client| client.session_id.clone());
                    session_id.and_then(|id| clients.remove_client(&id))
                };
                if let Some(client) = removed {
                    self.leave_room(&client, true).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, addr: SocketAddr, client_version: u32, room_id: Option<u32>) {
        info!(
            "Client connecting from {} (version: {}, room: {:?})",
            addr, client_version, room_id
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Rejected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Replace an existing connection from the same address
        let existing = {
            let mut clients = self.clients.write().await;
            let session_id = clients
                .find_client_by_addr(addr)
                .map(|client| client.session_id.clone());
            session_id.and_then(|id| clients.remove_client(&id))
        };
        if let Some(client) = existing {
            info!("Removing existing client {} from {}", client.session_id, addr);
            self.leave_room(&client, true).await;
        }

        let session_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };
        let Some(session_id) = session_id else {
            self.send_packet(
                Packet::Rejected {
                    reason: "Server full".to_string(),
                },
                addr,
            );
            return;
        };

        match self.rooms.join(&session_id, room_id) {
            Ok(room_id) => {
                self.clients.write().await.set_room(&session_id, room_id);
                self.flush_room(room_id).await;
            }
            Err(reason) => {
                info!("Rejected {} from {}: {}", session_id, addr, reason);
                self.clients.write().await.remove_client(&session_id);
                self.send_packet(Packet::Rejected { reason }, addr);
            }
        }
    }

    /// Ticks every room once and ships the results
    async fn tick_rooms(&mut self, delta_ms: f64) {
        for room_id in self.rooms.room_ids() {
            if let Some(room) = self.rooms.room_mut(room_id) {
                room.tick(delta_ms);
            }
            self.flush_room(room_id).await;
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client }) => {
                            info!("Client {} timed out", client.session_id);
                            self.leave_room(&client, false).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let delta_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
                    last_tick = now;

                    self.tick_rooms(delta_ms).await;
                    self.tick += 1;

                    if self.tick % 300 == 0 {
                        let client_count = self.clients.read().await.len();
                        if client_count > 0 {
                            debug!("Tick {}: {} clients in {} rooms, {:.1}Hz",
                                   self.tick, client_count, self.rooms.len(), 1000.0 / delta_ms);
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn test_server_binds_ephemeral_port() {
        let server = tokio_test::block_on(Server::new("127.0.0.1:0", ServerConfig::default()))
            .expect("bind");

        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.room_count(), 0);
    }

    #[test]
    fn test_server_rejects_bad_address() {
        let result = tokio_test::block_on(Server::new("not an address", ServerConfig::default()));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.client_timeout, Duration::from_secs(5));
        assert!(!config.match_config.wait_for_opponent);
        assert_eq!(config.match_config.start_threshold(), 1);
        assert!(config.tick_duration < Duration::from_millis(17));
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            room_id: None,
        };

        assert!(tx
            .send(ServerMessage::PacketReceived {
                packet: packet.clone(),
                addr: localhost(8080),
            })
            .is_ok());

        match rx.try_recv() {
            Ok(ServerMessage::PacketReceived { packet: p, addr }) => {
                assert_eq!(p, packet);
                assert_eq!(addr, localhost(8080));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_message_stops_run() {
        tokio_test::block_on(async {
            let mut server = Server::new("127.0.0.1:0", ServerConfig::default())
                .await
                .unwrap();
            let shutdown = server.shutdown_handle();
            assert!(shutdown.send(ServerMessage::Shutdown).is_ok());

            let result = tokio::time::timeout(Duration::from_secs(2), server.run()).await;

            assert!(matches!(result, Ok(Ok(()))));
        });
    }

    #[test]
    fn test_connect_places_client_in_room() {
        tokio_test::block_on(async {
            let mut server = Server::new("127.0.0.1:0", ServerConfig::default())
                .await
                .unwrap();

            server
                .handle_packet(
                    Packet::Connect {
                        client_version: PROTOCOL_VERSION,
                        room_id: None,
                    },
                    localhost(9001),
                )
                .await;

            assert_eq!(server.room_count(), 1);
            let client = server
                .clients
                .read()
                .await
                .find_client_by_addr(localhost(9001))
                .cloned()
                .unwrap();
            assert_eq!(client.room_id, Some(1));

            // Connected and FullState queued for the sender task
            let mut queued = Vec::new();
            while let Ok(message) = server.game_rx.try_recv() {
                queued.push(message);
            }
            assert_eq!(queued.len(), 2);
            assert!(matches!(
                &queued[0],
                GameMessage::BroadcastPacket { packet: Packet::Connected { .. }, .. }
            ));
        });
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        tokio_test::block_on(async {
            let mut server = Server::new("127.0.0.1:0", ServerConfig::default())
                .await
                .unwrap();

            server
                .handle_packet(
                    Packet::Connect {
                        client_version: PROTOCOL_VERSION + 1,
                        room_id: None,
                    },
                    localhost(9002),
                )
                .await;

            assert!(server.clients.read().await.is_empty());
            match server.game_rx.try_recv() {
                Ok(GameMessage::SendPacket {
                    packet: Packet::Rejected { .. },
                    addr,
                }) => assert_eq!(addr, localhost(9002)),
                other => panic!("Expected rejection, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_disconnect_drops_empty_room() {
        tokio_test::block_on(async {
            let mut server = Server::new("127.0.0.1:0", ServerConfig::default())
                .await
                .unwrap();
            let addr = localhost(9003);

            server
                .handle_packet(
                    Packet::Connect {
                        client_version: PROTOCOL_VERSION,
                        room_id: None,
                    },
                    addr,
                )
                .await;
            server.handle_packet(Packet::Disconnect, addr).await;

            assert_eq!(server.room_count(), 0);
            assert!(server.clients.read().await.is_empty());
        });
    }

    #[test]
    fn test_two_clients_start_match_and_tick() {
        tokio_test::block_on(async {
            let config = ServerConfig {
                match_config: MatchConfig::head_to_head(),
                ..ServerConfig::default()
            };
            let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
            for port in [9004, 9005] {
                server
                    .handle_packet(
                        Packet::Connect {
                            client_version: PROTOCOL_VERSION,
                            room_id: None,
                        },
                        localhost(port),
                    )
                    .await;
            }
            while server.game_rx.try_recv().is_ok() {}

            server
                .handle_packet(
                    Packet::Input(shared::InputMessage {
                        right: Some(true),
                        ..Default::default()
                    }),
                    localhost(9004),
                )
                .await;
            server.tick_rooms(shared::BASELINE_FRAME_MS).await;

            match server.game_rx.try_recv() {
                Ok(GameMessage::BroadcastPacket {
                    packet: Packet::Patch(patch),
                    addrs,
                }) => {
                    assert_eq!(addrs.len(), 2);
                    assert!(!patch.changes.is_empty());
                }
                other => panic!("Expected patch broadcast, got {:?}", other),
            }
        });
    }
}
