use image::Rgba;

/// Color of points that never escaped.
pub const INTERIOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Turns a stored raw value into a color.
pub trait PixelCalculator: Send + Sync {
    /// A fresh instance for another thread.
    fn new_instance(&self) -> Box<dyn PixelCalculator>;

    fn color(&mut self, raw: i32) -> Rgba<u8>;
}

/// Cycles the hue around the color wheel with the iteration count.
#[derive(Copy, Clone, Debug)]
pub struct HuePalette {
    cycle: u32,
}

impl HuePalette {
    /// A palette that returns to the same hue every `cycle` iterations.
    pub fn new(cycle: u32) -> Self {
        HuePalette {
            cycle: cycle.max(1),
        }
    }
}

impl Default for HuePalette {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PixelCalculator for HuePalette {
    fn new_instance(&self) -> Box<dyn PixelCalculator> {
        Box::new(*self)
    }

    fn color(&mut self, raw: i32) -> Rgba<u8> {
        if raw < 0 {
            return INTERIOR;
        }
        let position = raw as u32 % self.cycle;
        // H in range [0, 360)
        let hue = position as f64 * 360.0 / self.cycle as f64;
        let (r, g, b) = hsv::hsv_to_rgb(hue, 1.0, 1.0);
        Rgba([r, g, b, 255])
    }
}
