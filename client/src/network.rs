use crate::game::ClientGameState;
use crate::input::{InputManager, Toggles};
use crate::rendering::{RenderConfig, Renderer};
use log::{debug, error, info, warn};
use macroquad::prelude::*;
use shared::{Packet, Phase, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep, Instant};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// UDP transport running on its own thread and runtime.
///
/// The frame loop never blocks on the socket: it pushes packets into
/// `outgoing` and drains `incoming` once per frame. Artificial latency is
/// split evenly between the two directions.
pub struct NetworkHandle {
    outgoing: UnboundedSender<Packet>,
    incoming: UnboundedReceiver<Packet>,
    thread: Option<JoinHandle<()>>,
}

impl NetworkHandle {
    pub fn spawn(
        server_addr: SocketAddr,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (outgoing, outgoing_rx) = unbounded_channel();
        let (incoming_tx, incoming) = unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = std::thread::Builder::new()
            .name("network".into())
            .spawn(move || {
                let one_way = Duration::from_millis(fake_ping_ms / 2);
                if let Err(e) =
                    runtime.block_on(run_transport(server_addr, one_way, outgoing_rx, incoming_tx))
                {
                    error!("Network transport stopped: {}", e);
                }
            })?;

        Ok(Self {
            outgoing,
            incoming,
            thread: Some(thread),
        })
    }

    /// Queues a packet for the server. Returns false once the transport is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outgoing.send(packet).is_ok()
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.incoming.try_recv().ok()
    }

    /// Sends a final disconnect and waits for the transport thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.outgoing.send(Packet::Disconnect);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Network thread panicked");
            }
        }
    }
}

async fn run_transport(
    server_addr: SocketAddr,
    one_way: Duration,
    mut outgoing: UnboundedReceiver<Packet>,
    incoming: UnboundedSender<Packet>,
) -> std::io::Result<()> {
    let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
    info!("Client socket bound to {}", socket.local_addr()?);

    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    let mut buffer = [0u8; 4096];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, from)) if from == server_addr => {
                        match Packet::from_bytes(&buffer[..len]) {
                            Ok(packet) => deliver(&incoming, packet, one_way),
                            Err(e) => warn!("Malformed packet from server: {}", e),
                        }
                    }
                    Ok((_, from)) => debug!("Ignoring datagram from {}", from),
                    Err(e) => error!("Error receiving packet: {}", e),
                }
            }

            packet = outgoing.recv() => {
                match packet {
                    Some(Packet::Disconnect) | None => {
                        // Sent undelayed; the runtime is about to shut down
                        transmit(&socket, server_addr, &Packet::Disconnect).await;
                        break;
                    }
                    Some(packet) => send_delayed(&socket, server_addr, packet, one_way).await,
                }
            }

            _ = heartbeat.tick() => {
                send_delayed(&socket, server_addr, Packet::Heartbeat, one_way).await;
            }
        }
    }

    Ok(())
}

fn deliver(incoming: &UnboundedSender<Packet>, packet: Packet, delay: Duration) {
    if delay.is_zero() {
        let _ = incoming.send(packet);
        return;
    }
    let incoming = incoming.clone();
    tokio::spawn(async move {
        sleep(delay).await;
        let _ = incoming.send(packet);
    });
}

async fn send_delayed(socket: &Arc<UdpSocket>, server_addr: SocketAddr, packet: Packet, delay: Duration) {
    if delay.is_zero() {
        transmit(socket, server_addr, &packet).await;
        return;
    }
    let socket = Arc::clone(socket);
    tokio::spawn(async move {
        sleep(delay).await;
        transmit(&socket, server_addr, &packet).await;
    });
}

async fn transmit(socket: &UdpSocket, server_addr: SocketAddr, packet: &Packet) {
    match packet.to_bytes() {
        Ok(data) => {
            if let Err(e) = socket.send_to(&data, server_addr).await {
                error!("Error sending packet: {}", e);
            }
        }
        Err(e) => error!("Error encoding packet: {}", e),
    }
}

/// Frame-driven client: drains the network, samples input, predicts and draws.
pub struct Client {
    network: NetworkHandle,
    requested_room: Option<u32>,

    game_state: ClientGameState,
    input_manager: InputManager,
    renderer: Renderer,

    fake_ping_ms: u64,
    show_hitboxes: bool,
}

impl Client {
    pub fn new(
        server_addr: &str,
        requested_room: Option<u32>,
        fake_ping_ms: u64,
        width: usize,
        height: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let network = NetworkHandle::spawn(server_addr, fake_ping_ms)?;
        let renderer = Renderer::new(width, height)?;

        Ok(Client {
            network,
            requested_room,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
            renderer,
            fake_ping_ms,
            show_hitboxes: false,
        })
    }

    fn connect(&self) {
        info!("Connecting to server...");
        self.network.send(Packet::Connect {
            client_version: PROTOCOL_VERSION,
            room_id: self.requested_room,
        });
    }

    fn drain_network(&mut self) {
        while let Some(packet) = self.network.try_recv() {
            if let Some(reply) = self.game_state.handle_packet(packet) {
                self.network.send(reply);
            }
        }
    }

    fn handle_toggles(&mut self, toggles: Toggles) {
        if toggles.prediction {
            info!("Client-side prediction: {}", self.game_state.toggle_prediction());
        }
        if toggles.interpolation {
            info!("Interpolation: {}", self.game_state.toggle_interpolation());
        }
        if toggles.hitboxes {
            self.show_hitboxes = !self.show_hitboxes;
            info!("Hitboxes: {}", self.show_hitboxes);
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        prevent_quit();
        self.connect();

        while !is_quit_requested() && !is_key_pressed(KeyCode::Escape) {
            self.drain_network();

            let (toggles, held, to_send) = self.input_manager.update();
            if toggles.any() {
                self.handle_toggles(toggles);
            }

            // Inputs outside a running match are dropped server-side anyway
            if self.game_state.is_connected() && self.game_state.phase() == Phase::Playing {
                if let Some(input) = to_send {
                    self.network.send(Packet::Input(input.into()));
                }
            }

            let delta_ms = f64::from(get_frame_time()) * 1000.0;
            self.game_state.update(delta_ms, held);

            self.renderer.resize(screen_width(), screen_height());
            self.renderer.render(
                &self.game_state,
                RenderConfig {
                    fake_ping_ms: self.fake_ping_ms,
                    show_hitboxes: self.show_hitboxes,
                },
            );

            next_frame().await;
        }

        info!("Leaving match");
        self.network.shutdown();
        Ok(())
    }
}
