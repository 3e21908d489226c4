//! Performance benchmarks for critical game systems

use server::game::advance;
use server::room::Room;
use server::session::MatchConfig;
use shared::{diff, InputMessage, InputState, Packet, Phase, Player, StatePatch, Vector2, WorldState};
use std::time::Instant;

const FRAME_MS: f64 = shared::BASELINE_FRAME_MS;

fn playing_world() -> WorldState {
    let mut world = WorldState::new();
    for (id, index) in [("left", 0u8), ("right", 1u8)] {
        let x = world.start_x(index);
        let y = world.player_ground_y();
        world.players.insert(id.into(), Player::new(id, index, x, y));
    }
    world.phase = Phase::Playing;
    world
}

/// Benchmarks one simulation tick
#[test]
fn benchmark_advance() {
    let mut world = playing_world();
    if let Some(p) = world.players.get_mut("left") {
        p.input_right = true;
    }

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 40 == 0 {
            if let Some(p) = world.players.get_mut("right") {
                p.input_jump = true;
            }
        }
        let _ = advance(&mut world, FRAME_MS);
    }

    let duration = start.elapsed();
    println!(
        "Simulation tick: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks snapshot diffing between consecutive ticks
#[test]
fn benchmark_diff() {
    let prev = playing_world();
    let mut next = prev.clone();
    advance(&mut next, FRAME_MS);

    let iterations = 100_000;
    let start = Instant::now();

    let mut total_changes = 0;
    for _ in 0..iterations {
        total_changes += diff(&prev, &next).len();
    }

    let duration = start.elapsed();
    println!(
        "Diff: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(total_changes > 0);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a room tick followed by its outbound flush
#[test]
fn benchmark_room_tick_and_flush() {
    let mut room = Room::new(1, MatchConfig::head_to_head());
    room.join("left");
    room.join("right");
    room.take_outbound();
    room.input(
        "left",
        InputMessage {
            right: Some(true),
            ..Default::default()
        },
    );

    let iterations = 10_000;
    let start = Instant::now();

    let mut packets = 0;
    for _ in 0..iterations {
        room.tick(FRAME_MS);
        packets += room.take_outbound().len();
    }

    let duration = start.elapsed();
    println!(
        "Room tick + flush: {} ticks, {} packets in {:?} ({:.2} μs/tick)",
        iterations,
        packets,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks patch encoding and decoding
#[test]
fn benchmark_patch_serialization() {
    let prev = playing_world();
    let mut next = prev.clone();
    for player in next.players.values_mut() {
        player.position = Vector2::new(500.0, 400.0);
        player.velocity = Vector2::new(5.0, -3.0);
    }
    next.ball.position = Vector2::new(700.0, 200.0);

    let packet = Packet::Patch(StatePatch {
        base_revision: 41,
        revision: 42,
        changes: diff(&prev, &next),
    });

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = packet.to_bytes().unwrap();
        let _deserialized = Packet::from_bytes(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Patch serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full state encoding and decoding
#[test]
fn benchmark_full_state_serialization() {
    let packet = Packet::FullState {
        revision: 12345,
        state: playing_world(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = packet.to_bytes().unwrap();
        let _deserialized = Packet::from_bytes(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Full state serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client-side prediction and smoothing per frame
#[test]
fn benchmark_client_frame_update() {
    use client::game::ClientGameState;

    let mut client_state = ClientGameState::new();
    client_state.handle_packet(Packet::Connected {
        session_id: "left".into(),
        room_id: 1,
        player_index: 0,
    });
    client_state.apply_full_state(1, playing_world());

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let input = InputState {
            left: i % 2 == 0,
            right: i % 3 == 0,
            jump: i % 7 == 0,
        };
        client_state.update(FRAME_MS, input);
    }

    let duration = start.elapsed();
    println!(
        "Client frame update: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should handle 10k frames in under 500ms
    assert!(duration.as_millis() < 500);
}

/// Benchmarks applying a stream of server patches on the client
#[test]
fn benchmark_client_patch_stream() {
    use client::game::ClientGameState;

    let mut server_world = playing_world();
    let mut client_state = ClientGameState::new();
    client_state.apply_full_state(0, server_world.clone());

    let patches: Vec<Packet> = (0..1_000u32)
        .map(|revision| {
            let prev = server_world.clone();
            advance(&mut server_world, FRAME_MS);
            Packet::Patch(StatePatch {
                base_revision: revision,
                revision: revision + 1,
                changes: diff(&prev, &server_world),
            })
        })
        .collect();

    let start = Instant::now();

    for packet in patches {
        assert!(client_state.handle_packet(packet).is_none());
    }

    let duration = start.elapsed();
    println!("Client patch stream: 1000 patches in {:?}", duration);

    assert_eq!(client_state.world(), Some(&server_world));
    // Should handle 1000 patches in under 200ms
    assert!(duration.as_millis() < 200);
}
