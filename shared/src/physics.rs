//! Player kinematics shared by the authoritative engine and client prediction.
//!
//! Every constant is tuned for a 60Hz frame. Callers pass a `time_factor`
//! (`delta_ms / BASELINE_FRAME_MS`) so longer or shorter frames scale linearly.

use crate::world::{FieldBounds, Player};
use crate::{
    BASELINE_FRAME_MS, BOUNCE_FACTOR, GRAVITY, MAX_DELTA_MS, PLAYER_GROUND_FRICTION,
    PLAYER_JUMP_FORCE, PLAYER_MOVE_SPEED, PLAYER_RADIUS,
};

/// Caps a frame's duration and converts it to a multiple of the 60Hz baseline.
pub fn time_factor(delta_ms: f64) -> f64 {
    delta_ms.clamp(0.0, MAX_DELTA_MS) / BASELINE_FRAME_MS
}

/// Horizontal velocity for the held direction flags. Both or neither held is 0.
pub fn horizontal_velocity(left: bool, right: bool) -> f64 {
    let mut vx = 0.0;
    if left {
        vx -= PLAYER_MOVE_SPEED;
    }
    if right {
        vx += PLAYER_MOVE_SPEED;
    }
    vx
}

/// Advances one player by one step.
///
/// Horizontal motion has no inertia: velocity is overwritten from the held
/// flags each step. Jumps only fire within one unit of the ground and consume
/// the jump flag; an airborne jump request stays buffered until landing.
pub fn integrate_player(player: &mut Player, bounds: FieldBounds, time_factor: f64) {
    let ground_y = bounds.height - PLAYER_RADIUS;
    let right_wall = bounds.width - PLAYER_RADIUS;

    player.velocity.x = horizontal_velocity(player.input_left, player.input_right);
    player.position.x += player.velocity.x * time_factor;

    player.velocity.y += GRAVITY * time_factor;

    if player.input_jump && player.position.y >= ground_y - 1.0 {
        player.velocity.y = -PLAYER_JUMP_FORCE;
        player.input_jump = false;
    }

    player.position.y += player.velocity.y * time_factor;

    if player.position.y > ground_y {
        player.position.y = ground_y;
        player.velocity.y = 0.0;

        let holding_direction = player.input_left || player.input_right;
        if player.velocity.x != 0.0 && !holding_direction {
            player.velocity.x *= PLAYER_GROUND_FRICTION.powf(time_factor);
            if player.velocity.x.abs() < 0.1 {
                player.velocity.x = 0.0;
            }
        }
    }

    if player.position.x < PLAYER_RADIUS {
        player.position.x = PLAYER_RADIUS;
        player.velocity.x = 0.0;
    } else if player.position.x > right_wall {
        player.position.x = right_wall;
        player.velocity.x = 0.0;
    }

    if player.position.y < PLAYER_RADIUS {
        player.position.y = PLAYER_RADIUS;
        if player.velocity.y < 0.0 {
            player.velocity.y *= -BOUNCE_FACTOR * 0.3;
        }
    }
}
