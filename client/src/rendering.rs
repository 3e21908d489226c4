use crate::game::ClientGameState;
use macroquad::prelude::*;
use shared::{Phase, Vector2, WorldState, BALL_RADIUS, PLAYER_RADIUS};
use std::f32::consts::PI;

const SLIME_SEGMENTS: usize = 24;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub fake_ping_ms: u64,
    /// Local override; the match may also request hitboxes
    pub show_hitboxes: bool,
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub room_id: Option<u32>,
    pub connected: bool,
    pub prediction_enabled: bool,
    pub interpolation_enabled: bool,
    pub fake_ping_ms: u64,
    pub player_count: usize,
}

/// Maps field coordinates onto the window, preserving aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl FieldTransform {
    pub fn fit(width: f32, height: f32, field_width: f64, field_height: f64) -> Self {
        let field_width = field_width as f32;
        let field_height = field_height as f32;
        let scale = (width / field_width).min(height / field_height);
        Self {
            scale,
            offset_x: (width - field_width * scale) / 2.0,
            offset_y: (height - field_height * scale) / 2.0,
        }
    }

    pub fn point(&self, position: Vector2) -> (f32, f32) {
        (
            self.offset_x + position.x as f32 * self.scale,
            self.offset_y + position.y as f32 * self.scale,
        )
    }

    pub fn length(&self, value: f64) -> f32 {
        value as f32 * self.scale
    }
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Renderer {
            width: width as f32,
            height: height as f32,
        })
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn render(&mut self, state: &ClientGameState, config: RenderConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        if let Some(world) = state.world() {
            let transform =
                FieldTransform::fit(self.width, self.height, world.field_width, world.field_height);
            let hitboxes = config.show_hitboxes || state.debug_hitboxes();

            self.draw_field(world, &transform);

            for player in state.player_views() {
                let color = slime_color(player.player_index);
                self.draw_slime(&transform, player.view.position, color, player.is_local);
                if hitboxes {
                    self.draw_hitbox(&transform, player.view.target, PLAYER_RADIUS);
                }
            }

            let ball = state.ball_view();
            let (bx, by) = transform.point(ball.position);
            draw_circle(bx, by, transform.length(BALL_RADIUS), WHITE);
            if hitboxes {
                self.draw_hitbox(&transform, ball.target, BALL_RADIUS);
            }

            self.draw_scores(state.scores());
            self.draw_phase_banner(state);
        } else {
            let message = state.status().unwrap_or("Connecting...");
            self.draw_centered(message, self.height / 2.0, 32.0, WHITE);
        }

        let ui_config = UiConfig {
            room_id: state.room_id(),
            connected: state.is_connected(),
            prediction_enabled: state.prediction_enabled,
            interpolation_enabled: state.interpolation_enabled,
            fake_ping_ms: config.fake_ping_ms,
            player_count: state.player_views().count(),
        };
        self.draw_ui(ui_config);
    }

    fn draw_field(&mut self, world: &WorldState, transform: &FieldTransform) {
        let (left, top) = transform.point(Vector2::zero());
        let field_w = transform.length(world.field_width);
        let field_h = transform.length(world.field_height);
        draw_rectangle(left, top, field_w, field_h, Color::from_rgba(34, 85, 51, 255));

        let goal_w = transform.length(world.goal_width);
        let goal_h = transform.length(world.goal_height);
        let goal_top = top + field_h - goal_h;
        let net = Color::from_rgba(220, 220, 220, 255);
        draw_rectangle_lines(left, goal_top, goal_w, goal_h, 3.0, net);
        draw_rectangle_lines(left + field_w - goal_w, goal_top, goal_w, goal_h, 3.0, net);

        draw_line(
            left + field_w / 2.0,
            top,
            left + field_w / 2.0,
            top + field_h,
            1.0,
            Color::from_rgba(255, 255, 255, 60),
        );
    }

    fn draw_slime(
        &mut self,
        transform: &FieldTransform,
        position: Vector2,
        color: Color,
        is_local: bool,
    ) {
        let rim = slime_outline(transform, position);
        let (cx, cy) = transform.point(position);
        let base = vec2(cx, cy + transform.length(PLAYER_RADIUS));

        for edge in rim.windows(2) {
            draw_triangle(base, edge[0], edge[1], color);
        }

        if is_local {
            for edge in rim.windows(2) {
                draw_line(edge[0].x, edge[0].y, edge[1].x, edge[1].y, 2.0, WHITE);
            }
            let (first, last) = (rim[0], rim[rim.len() - 1]);
            draw_line(first.x, first.y, last.x, last.y, 2.0, WHITE);
        }
    }

    /// Authoritative collision circle
    fn draw_hitbox(&mut self, transform: &FieldTransform, position: Vector2, radius: f64) {
        let (x, y) = transform.point(position);
        draw_circle_lines(x, y, transform.length(radius), 1.0, YELLOW);
    }

    fn draw_scores(&mut self, scores: [u32; 2]) {
        let text = format!("{}  -  {}", scores[0], scores[1]);
        self.draw_centered(&text, 40.0, 40.0, WHITE);
    }

    fn draw_phase_banner(&mut self, state: &ClientGameState) {
        match state.phase() {
            Phase::Waiting => {
                self.draw_centered("Waiting for opponent...", self.height / 3.0, 28.0, WHITE);
            }
            Phase::Playing => {}
            Phase::GameOver => {
                let message = match state.winner_session_id() {
                    Some(winner) if Some(winner) == state.session_id() => "You win!".to_string(),
                    Some(winner) => format!("{} wins", winner),
                    None => "Match over".to_string(),
                };
                self.draw_centered(&message, self.height / 3.0, 48.0, YELLOW);
            }
        }
    }

    fn draw_centered(&mut self, text: &str, y: f32, size: f32, color: Color) {
        let dims = measure_text(text, None, size as u16, 1.0);
        draw_text(text, (self.width - dims.width) / 2.0, y, size, color);
    }

    fn draw_ui(&mut self, config: UiConfig) {
        let y_start = 10.0;
        let indicator_size = 12.0;
        let spacing = 25.0;

        let features = [
            ("P", config.prediction_enabled),
            ("I", config.interpolation_enabled),
        ];

        for (i, (label, enabled)) in features.iter().enumerate() {
            let x = 10.0 + (i as f32) * spacing;
            let color = if *enabled { GREEN } else { RED };

            draw_rectangle(x, y_start, indicator_size, indicator_size, color);
            draw_rectangle_lines(x, y_start, indicator_size, indicator_size, 1.0, WHITE);

            draw_text(label, x + 3.0, y_start + indicator_size + 12.0, 12.0, WHITE);
        }

        let connection_color = if config.connected { GREEN } else { RED };
        draw_rectangle(10.0, y_start + 35.0, 8.0, 8.0, connection_color);
        let connection_text = match config.room_id {
            Some(room_id) => format!("ROOM {}", room_id),
            None => "CON".to_string(),
        };
        draw_text(&connection_text, 20.0, y_start + 35.0 + 8.0, 12.0, WHITE);

        let ping_y = y_start + 50.0;
        let ping_bars = ((config.fake_ping_ms / 20).min(10)) as i32;

        for i in 0..10i32 {
            let bar_color = if i < ping_bars {
                if config.fake_ping_ms < 50 {
                    GREEN
                } else if config.fake_ping_ms < 100 {
                    YELLOW
                } else {
                    RED
                }
            } else {
                Color::from_rgba(51, 51, 51, 255)
            };

            draw_rectangle(10.0 + (i as f32) * 3.0, ping_y, 2.0, 8.0, bar_color);
        }

        let ping_text = format!("+{}ms", config.fake_ping_ms);
        draw_text(&ping_text, 45.0, ping_y + 8.0, 12.0, WHITE);

        let player_text = format!("{} players", config.player_count);
        draw_text(&player_text, 10.0, ping_y + 24.0, 12.0, WHITE);
    }
}

/// Screen-space rim of a slime, right foot to left foot.
///
/// The dome spans the collision circle: its flat base sits on the circle's
/// lowest point (the ground for a standing slime) and its apex on the
/// highest.
pub fn slime_outline(transform: &FieldTransform, position: Vector2) -> Vec<Vec2> {
    let (cx, cy) = transform.point(position);
    let radius = transform.length(PLAYER_RADIUS);
    let base_y = cy + radius;

    (0..=SLIME_SEGMENTS)
        .map(|i| {
            let angle = PI * i as f32 / SLIME_SEGMENTS as f32;
            vec2(cx + radius * angle.cos(), base_y - 2.0 * radius * angle.sin())
        })
        .collect()
}

fn slime_color(player_index: u8) -> Color {
    if player_index == 0 {
        Color::from_rgba(68, 136, 255, 255)
    } else {
        Color::from_rgba(255, 68, 68, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_transform_identity_at_native_size() {
        let transform = FieldTransform::fit(1280.0, 720.0, 1280.0, 720.0);

        assert_approx_eq!(transform.scale, 1.0f32);
        assert_eq!(transform.point(Vector2::new(100.0, 50.0)), (100.0, 50.0));
    }

    #[test]
    fn test_transform_letterboxes_wide_window() {
        let transform = FieldTransform::fit(1600.0, 720.0, 1280.0, 720.0);

        assert_approx_eq!(transform.scale, 1.0f32);
        assert_approx_eq!(transform.offset_x, 160.0f32);
        assert_approx_eq!(transform.offset_y, 0.0f32);
    }

    #[test]
    fn test_transform_scales_down() {
        let transform = FieldTransform::fit(640.0, 720.0, 1280.0, 720.0);

        assert_approx_eq!(transform.scale, 0.5f32);
        assert_approx_eq!(transform.offset_y, 180.0f32);
        assert_approx_eq!(transform.length(PLAYER_RADIUS), 32.0f32);
    }

    #[test]
    fn test_grounded_slime_stands_on_field_bottom() {
        let world = WorldState::new();
        let transform = FieldTransform::fit(640.0, 720.0, world.field_width, world.field_height);
        let position = Vector2::new(320.0, world.player_ground_y());

        let rim = slime_outline(&transform, position);
        let (_, field_bottom) = transform.point(Vector2::new(0.0, world.field_height));
        let (cx, cy) = transform.point(position);
        let radius = transform.length(PLAYER_RADIUS);

        let first = rim[0];
        let last = rim[rim.len() - 1];
        assert_approx_eq!(first.y, field_bottom, 1e-3);
        assert_approx_eq!(last.y, field_bottom, 1e-3);
        assert_approx_eq!(first.x, cx + radius, 1e-3);
        assert_approx_eq!(last.x, cx - radius, 1e-3);

        let apex = rim[SLIME_SEGMENTS / 2];
        assert_approx_eq!(apex.x, cx, 1e-3);
        assert_approx_eq!(apex.y, cy - radius, 1e-3);
        assert!(rim.iter().all(|p| p.y <= field_bottom + 1e-3));
    }
}
