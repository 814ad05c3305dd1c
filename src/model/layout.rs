use glam::{Mat4, Vec4};

/// Places the model canvas in view space with a uniform scale and a translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMatrix {
    width: f32,
    height: f32,
    scale_x: f32,
    scale_y: f32,
    translate_x: f32,
    translate_y: f32,
}

impl ModelMatrix {
    /// Matrix for a canvas of the given size, scaled to a view height of 2
    pub fn new(width: f32, height: f32) -> Self {
        let mut matrix = Self {
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        };
        matrix.set_height(2.0);
        matrix
    }

    pub fn set_width(&mut self, width: f32) {
        if self.width > 0.0 {
            let scale = width / self.width;
            self.scale(scale, scale);
        }
    }

    pub fn set_height(&mut self, height: f32) {
        if self.height > 0.0 {
            let scale = height / self.height;
            self.scale(scale, scale);
        }
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.scale_x = x;
        self.scale_y = y;
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.translate_x = x;
        self.translate_y = y;
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.translate(x, y);
    }

    pub fn set_center_position(&mut self, x: f32, y: f32) {
        self.center_x(x);
        self.center_y(y);
    }

    pub fn center_x(&mut self, x: f32) {
        self.translate_x = x - self.width * self.scale_x / 2.0;
    }

    pub fn center_y(&mut self, y: f32) {
        self.translate_y = y - self.height * self.scale_y / 2.0;
    }

    pub fn top(&mut self, y: f32) {
        self.translate_y = y;
    }

    pub fn bottom(&mut self, y: f32) {
        self.translate_y = y - self.height * self.scale_y;
    }

    pub fn left(&mut self, x: f32) {
        self.translate_x = x;
    }

    pub fn right(&mut self, x: f32) {
        self.translate_x = x - self.width * self.scale_x;
    }

    /// Apply a layout map from the settings document.
    ///
    /// Size keys are applied before position keys so positions see the final scale.
    /// Keys are matched case-insensitively with `_` ignored, so `CenterX` and `center_x` agree.
    pub fn setup_from_layout(&mut self, layout: &[(String, f32)]) {
        let normalised: Vec<(String, f32)> = layout
            .iter()
            .map(|(key, value)| (key.replace('_', "").to_ascii_lowercase(), *value))
            .collect();

        for (key, value) in &normalised {
            match key.as_str() {
                "width" => self.set_width(*value),
                "height" => self.set_height(*value),
                _ => {}
            }
        }

        for (key, value) in &normalised {
            match key.as_str() {
                "x" => self.set_position(*value, self.translate_y),
                "y" => self.set_position(self.translate_x, *value),
                "centerx" => self.center_x(*value),
                "centery" => self.center_y(*value),
                "top" => self.top(*value),
                "bottom" => self.bottom(*value),
                "left" => self.left(*value),
                "right" => self.right(*value),
                _ => {}
            }
        }
    }

    pub fn transform_x(&self, x: f32) -> f32 {
        self.scale_x * x + self.translate_x
    }

    pub fn transform_y(&self, y: f32) -> f32 {
        self.scale_y * y + self.translate_y
    }

    pub fn invert_transform_x(&self, x: f32) -> f32 {
        (x - self.translate_x) / self.scale_x
    }

    pub fn invert_transform_y(&self, y: f32) -> f32 {
        (y - self.translate_y) / self.scale_y
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols(
            Vec4::new(self.scale_x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, self.scale_y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(self.translate_x, self.translate_y, 0.0, 1.0),
        )
    }
}

impl Default for ModelMatrix {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}
