//! CPU canvas the brush paints into. Uploaded as the scene every frame.

use radiance::Resolution;

/// Cursor movement below this many pixels does not draw a stroke.
const MIN_STROKE_LENGTH: f32 = 0.3;

pub type Point = [f32; 2];

pub struct Canvas {
    resolution: Resolution,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            pixels: vec![0; resolution.rgba8_len()],
        }
    }

    /// RGBA8 pixels, row-major from the top-left corner.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn fill_circle(&mut self, center: Point, radius: f32, color: [u8; 4]) {
        if radius <= 0.0 {
            return;
        }
        let radius_sq = radius * radius;
        self.fill_where(
            [center[0] - radius, center[1] - radius],
            [center[0] + radius, center[1] + radius],
            color,
            |x, y| {
                let dx = x - center[0];
                let dy = y - center[1];
                dx * dx + dy * dy <= radius_sq
            },
        );
    }

    /// Fills a convex quad given in either winding order.
    pub fn fill_quad(&mut self, corners: [Point; 4], color: [u8; 4]) {
        let mut min = corners[0];
        let mut max = corners[0];
        for corner in &corners[1..] {
            min = [min[0].min(corner[0]), min[1].min(corner[1])];
            max = [max[0].max(corner[0]), max[1].max(corner[1])];
        }
        self.fill_where(min, max, color, |x, y| inside_convex(&corners, [x, y]));
    }

    /// Brush stroke from `from` to `to`: a quad `2 * half_width` wide with
    /// round caps. Returns false when the cursor barely moved.
    pub fn stroke(&mut self, from: Point, to: Point, half_width: f32, color: [u8; 4]) -> bool {
        let delta = [from[0] - to[0], from[1] - to[1]];
        let length = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
        if length <= MIN_STROKE_LENGTH {
            return false;
        }
        let normal = [-delta[1] / length * half_width, delta[0] / length * half_width];
        self.fill_quad(
            [
                [to[0] + normal[0], to[1] + normal[1]],
                [from[0] + normal[0], from[1] + normal[1]],
                [from[0] - normal[0], from[1] - normal[1]],
                [to[0] - normal[0], to[1] - normal[1]],
            ],
            color,
        );
        self.fill_circle(to, half_width, color);
        self.fill_circle(from, half_width, color);
        true
    }

    /// Runs `inside` on the center of every pixel in the clipped box.
    fn fill_where(
        &mut self,
        min: Point,
        max: Point,
        color: [u8; 4],
        inside: impl Fn(f32, f32) -> bool,
    ) {
        let width = self.resolution.width() as i64;
        let height = self.resolution.height() as i64;
        let x0 = (min[0].floor() as i64).max(0);
        let y0 = (min[1].floor() as i64).max(0);
        let x1 = (max[0].ceil() as i64).min(width - 1);
        let y1 = (max[1].ceil() as i64).min(height - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if inside(x as f32 + 0.5, y as f32 + 0.5) {
                    let offset = ((y * width + x) * 4) as usize;
                    self.pixels[offset..offset + 4].copy_from_slice(&color);
                }
            }
        }
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.resolution.width() + x) * 4) as usize;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        rgba
    }
}

fn inside_convex(corners: &[Point; 4], point: Point) -> bool {
    let mut positive = false;
    let mut negative = false;
    for index in 0..corners.len() {
        let a = corners[index];
        let b = corners[(index + 1) % corners.len()];
        let cross = (b[0] - a[0]) * (point[1] - a[1]) - (b[1] - a[1]) * (point[0] - a[0]);
        positive |= cross > 0.0;
        negative |= cross < 0.0;
        if positive && negative {
            return false;
        }
    }
    true
}

/// HSV to RGB with hue in degrees and saturation/value in `[0, 1]`.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let hue = hue.rem_euclid(360.0) / 60.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - (hue % 2.0 - 1.0).abs());
    let (r, g, b) = match hue as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let to_u8 = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

/// Rainbow brush: the hue advances one degree per painted frame.
#[derive(Debug, Default)]
pub struct HueCycle {
    hue: u32,
}

impl HueCycle {
    pub fn next_color(&mut self) -> [u8; 4] {
        self.hue = (self.hue + 1) % 360;
        let [r, g, b] = hsv_to_rgb(self.hue as f32, 1.0, 1.0);
        [r, g, b, 255]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn canvas() -> Canvas {
        Canvas::new(Resolution::new(32, 32).unwrap())
    }

    #[test]
    fn circle_covers_pixel_centers_within_radius() {
        let mut canvas = canvas();
        canvas.fill_circle([16.0, 16.0], 4.0, WHITE);
        assert_eq!(canvas.pixel(16, 16), WHITE);
        assert_eq!(canvas.pixel(19, 16), WHITE);
        assert_eq!(canvas.pixel(20, 16), [0; 4]);
        assert_eq!(canvas.pixel(19, 19), [0; 4]);
    }

    #[test]
    fn shapes_are_clipped_to_canvas() {
        let mut canvas = canvas();
        canvas.fill_circle([0.0, 0.0], 3.0, WHITE);
        canvas.fill_circle([40.0, 40.0], 3.0, WHITE);
        assert_eq!(canvas.pixel(0, 0), WHITE);
        assert_eq!(canvas.pixel(31, 31), [0; 4]);
    }

    #[test]
    fn stroke_fills_the_segment_between_points() {
        let mut canvas = canvas();
        assert!(canvas.stroke([4.0, 16.0], [28.0, 16.0], 2.0, WHITE));
        for x in 4..28 {
            assert_eq!(canvas.pixel(x, 16), WHITE, "gap at x = {x}");
        }
        assert_eq!(canvas.pixel(16, 20), [0; 4]);
    }

    #[test]
    fn tiny_moves_do_not_paint() {
        let mut canvas = canvas();
        assert!(!canvas.stroke([10.0, 10.0], [10.1, 10.1], 5.0, WHITE));
        assert!(canvas.pixels().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn quad_winding_does_not_matter() {
        let square = [[8.0, 8.0], [16.0, 8.0], [16.0, 16.0], [8.0, 16.0]];
        let mut reversed = square;
        reversed.reverse();
        let mut a = canvas();
        let mut b = canvas();
        a.fill_quad(square, WHITE);
        b.fill_quad(reversed, WHITE);
        assert_eq!(a.pixels(), b.pixels());
        assert_eq!(a.pixel(12, 12), WHITE);
    }

    #[test]
    fn clear_resets_every_pixel() {
        let mut canvas = canvas();
        canvas.fill_circle([16.0, 16.0], 8.0, WHITE);
        canvas.clear();
        assert!(canvas.pixels().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), [0, 0, 255]);
        assert_eq!(hsv_to_rgb(360.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(90.0, 0.0, 0.5), [128, 128, 128]);
    }

    #[test]
    fn hue_cycle_wraps() {
        let mut cycle = HueCycle::default();
        let first = cycle.next_color();
        for _ in 0..359 {
            cycle.next_color();
        }
        assert_eq!(cycle.next_color(), first);
    }
}
