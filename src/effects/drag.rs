/// Smooths the pointer target into a face direction with bounded velocity and
/// acceleration, at a nominal 30 frames per second.
#[derive(Debug, Clone, Default)]
pub struct DragFollower {
    target_x: f32,
    target_y: f32,
    x: f32,
    y: f32,
    velocity_x: f32,
    velocity_y: f32,
    user_time: f32,
    last_time: Option<f32>,
}

impl DragFollower {
    const FRAME_RATE: f32 = 30.0;
    const EPSILON: f32 = 0.01;
    const MAX_FACE_VELOCITY: f32 = 40.0 / 10.0;
    const TIME_TO_MAX_SPEED: f32 = 0.15;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target(&mut self, x: f32, y: f32) {
        self.target_x = x;
        self.target_y = y;
    }

    pub fn target(&self) -> (f32, f32) {
        (self.target_x, self.target_y)
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn update(&mut self, delta: f32) {
        self.user_time += delta.max(0.0);

        let max_v = Self::MAX_FACE_VELOCITY / Self::FRAME_RATE;
        let Some(last_time) = self.last_time else {
            self.last_time = Some(self.user_time);
            return;
        };
        let delta_weight = (self.user_time - last_time) * Self::FRAME_RATE;
        self.last_time = Some(self.user_time);

        let frames_to_max_speed = Self::TIME_TO_MAX_SPEED * Self::FRAME_RATE;
        let max_a = delta_weight * max_v / frames_to_max_speed;

        let dx = self.target_x - self.x;
        let dy = self.target_y - self.y;
        if dx.abs() <= Self::EPSILON && dy.abs() <= Self::EPSILON {
            return;
        }

        let distance = (dx * dx + dy * dy).sqrt();
        let wanted_vx = max_v * dx / distance;
        let wanted_vy = max_v * dy / distance;

        let mut ax = wanted_vx - self.velocity_x;
        let mut ay = wanted_vy - self.velocity_y;
        let a = (ax * ax + ay * ay).sqrt();
        if a > max_a && a > 0.0 {
            ax *= max_a / a;
            ay *= max_a / a;
        }
        self.velocity_x += ax;
        self.velocity_y += ay;

        // Brake so the face stops at the target instead of overshooting
        let max_v_to_stop =
            0.5 * ((max_a * max_a + 16.0 * max_a * distance - 8.0 * max_a * distance).sqrt() - max_a);
        let current_v = (self.velocity_x * self.velocity_x + self.velocity_y * self.velocity_y).sqrt();
        if current_v > max_v_to_stop && current_v > 0.0 {
            self.velocity_x *= max_v_to_stop / current_v;
            self.velocity_y *= max_v_to_stop / current_v;
        }

        self.x += self.velocity_x;
        self.y += self.velocity_y;
    }
}
