//! Authoritative per-tick simulation.
//!
//! `advance` runs one fixed-order step over a [`WorldState`]: player
//! integration, ball integration, player/ball contact, goal detection and
//! finally velocity clamping. Scoring side effects are returned as
//! [`GameEvent`]s for the room to broadcast.

use log::{debug, error, info};
use shared::{
    integrate_player, time_factor, Ball, Phase, Player, Vector2, WorldState, BALL_AIR_FRICTION,
    BALL_GROUND_FRICTION, BALL_KICK_FORCE, BALL_RADIUS, BOUNCE_FACTOR, GRAVITY, MAX_BALL_SPEED,
    MAX_PLAYER_FALL_SPEED, MAX_PLAYER_SPEED, PLAYER_RADIUS,
};

/// Out-of-band notifications produced while simulating.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ScoreUpdate { scores: [u32; 2] },
    GameOver { winner_session_id: Option<String> },
}

/// Advances the match by one tick. Does nothing unless the match is playing.
pub fn advance(world: &mut WorldState, delta_ms: f64) -> Vec<GameEvent> {
    if world.phase != Phase::Playing {
        return Vec::new();
    }

    let tf = time_factor(delta_ms);

    let bounds = world.bounds();
    for player in world.players.values_mut() {
        integrate_player(player, bounds, tf);
    }

    let ball_ground_y = world.ball_ground_y();
    let field_width = world.field_width;
    step_ball(&mut world.ball, field_width, ball_ground_y, tf);

    for player in world.players.values() {
        resolve_ball_contact(player, &mut world.ball);
    }

    if let Some(scoring_index) = detect_goal(world) {
        let mut events = Vec::new();
        if let Some(event) = score_goal(world, scoring_index) {
            events.push(event);
        }
        return events;
    }

    clamp_velocities(world);
    Vec::new()
}

/// Gravity, friction, integration and boundary bounces for the ball.
pub fn step_ball(ball: &mut Ball, field_width: f64, ground_y: f64, tf: f64) {
    ball.velocity.y += GRAVITY * tf;

    let near_ground = ball.position.y >= ground_y - 1.0;
    if near_ground {
        ball.velocity.x *= BALL_GROUND_FRICTION.powf(tf);
        if ball.velocity.y.abs() < 1.0 {
            ball.velocity.y *= BALL_GROUND_FRICTION.powf(tf);
        }
    } else {
        ball.velocity.x *= BALL_AIR_FRICTION.powf(tf);
        ball.velocity.y *= BALL_AIR_FRICTION.powf(tf);
    }

    if ball.velocity.x.abs() < 0.1 {
        ball.velocity.x = 0.0;
    }
    if ball.velocity.y.abs() < 0.1 && near_ground {
        ball.velocity.y = 0.0;
    }

    ball.position.x += ball.velocity.x * tf;
    ball.position.y += ball.velocity.y * tf;

    if ball.position.y > ground_y {
        ball.position.y = ground_y;
        if ball.velocity.y > 1.0 {
            ball.velocity.y *= -BOUNCE_FACTOR;
        } else {
            ball.velocity.y = 0.0;
        }
        ball.velocity.x *= 0.9_f64.powf(tf);
    }

    let right_wall = field_width - BALL_RADIUS;
    if ball.position.x < BALL_RADIUS {
        ball.position.x = BALL_RADIUS;
        if ball.velocity.x < 0.0 {
            ball.velocity.x *= -BOUNCE_FACTOR;
        }
    } else if ball.position.x > right_wall {
        ball.position.x = right_wall;
        if ball.velocity.x > 0.0 {
            ball.velocity.x *= -BOUNCE_FACTOR;
        }
    }

    if ball.position.y < BALL_RADIUS {
        ball.position.y = BALL_RADIUS;
        if ball.velocity.y < 0.0 {
            ball.velocity.y *= -BOUNCE_FACTOR;
        }
    }
}

/// Circle/circle contact between one slime and the ball.
///
/// The ball is pushed half the overlap out along the contact normal and its
/// velocity is replaced by a fresh kick. Returns true on contact.
pub fn resolve_ball_contact(player: &Player, ball: &mut Ball) -> bool {
    let dx = ball.position.x - player.position.x;
    let dy = ball.position.y - player.position.y;
    let distance = dx.hypot(dy);
    let min_distance = PLAYER_RADIUS + BALL_RADIUS;

    if distance >= min_distance {
        return false;
    }

    let angle = dy.atan2(dx);
    let (sin, cos) = angle.sin_cos();
    let overlap = min_distance - distance;

    ball.position.x += cos * overlap * 0.5;
    ball.position.y += sin * overlap * 0.5;

    let kick = BALL_KICK_FORCE + player.velocity.length() * 0.2;
    ball.velocity = Vector2::new(
        cos * kick + player.velocity.x * 0.4,
        sin * kick + player.velocity.y * 0.3,
    );

    true
}

/// Returns the index of the player who scored, if the ball entered a goal.
///
/// The left goal is defended by index 0, so a ball entering it scores for
/// index 1, and vice versa.
pub fn detect_goal(world: &WorldState) -> Option<u8> {
    let ball = &world.ball;
    let in_mouth = ball.position.y > world.field_height - world.goal_height
        && ball.position.y < world.field_height;

    if !in_mouth {
        return None;
    }

    if ball.position.x - BALL_RADIUS < 0.0 && ball.velocity.x < 0.0 {
        return Some(1);
    }
    if ball.position.x + BALL_RADIUS > world.field_width && ball.velocity.x > 0.0 {
        return Some(0);
    }
    None
}

/// Credits a goal. Ends the match when the scorer reaches the limit,
/// otherwise resets the kickoff.
pub fn score_goal(world: &mut WorldState, scoring_index: u8) -> Option<GameEvent> {
    debug_assert!(scoring_index <= 1, "player index out of range");

    if world.phase != Phase::Playing {
        return None;
    }

    let max_score = world.max_score;
    let Some(scorer) = world.player_by_index_mut(scoring_index) else {
        error!(
            "Goal for player index {} but no such player is in the match",
            scoring_index
        );
        return None;
    };

    scorer.score += 1;
    let score = scorer.score;
    let session_id = scorer.session_id.clone();
    info!("Player {} ({}) scored, now at {}", scoring_index, session_id, score);

    if score >= max_score {
        world.phase = Phase::GameOver;
        world.winner_session_id = Some(session_id.clone());
        info!("Match over, winner {}", session_id);
        return Some(GameEvent::GameOver {
            winner_session_id: Some(session_id),
        });
    }

    reset_positions(world);
    Some(GameEvent::ScoreUpdate {
        scores: world.scores(),
    })
}

/// Puts the ball and both players back at kickoff with no motion or input.
pub fn reset_positions(world: &mut WorldState) {
    world.ball.position = Vector2::new(world.field_width / 2.0, world.field_height / 3.0);
    world.ball.velocity = Vector2::zero();

    let ground_y = world.player_ground_y();
    let left_x = world.start_x(0);
    let right_x = world.start_x(1);
    for player in world.players.values_mut() {
        player.position.x = if player.player_index == 0 {
            left_x
        } else {
            right_x
        };
        player.position.y = ground_y;
        player.velocity = Vector2::zero();
        player.clear_inputs();
    }
    debug!("Positions reset");
}

/// Caps every velocity to its bound.
pub fn clamp_velocities(world: &mut WorldState) {
    for player in world.players.values_mut() {
        player.velocity.x = player.velocity.x.clamp(-MAX_PLAYER_SPEED, MAX_PLAYER_SPEED);
        player.velocity.y = player
            .velocity
            .y
            .clamp(-MAX_PLAYER_FALL_SPEED, MAX_PLAYER_FALL_SPEED);
    }
    let ball = &mut world.ball;
    ball.velocity.x = ball.velocity.x.clamp(-MAX_BALL_SPEED, MAX_BALL_SPEED);
    ball.velocity.y = ball.velocity.y.clamp(-MAX_BALL_SPEED, MAX_BALL_SPEED);
}
