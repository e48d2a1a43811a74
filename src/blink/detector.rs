use std::collections::VecDeque;

const DEFAULT_WINDOW_SIZE: usize = 10;
const DEFAULT_STD_JUMP: f64 = 0.008;
const DEFAULT_COOLDOWN_SLIDES: u32 = 3;

/// Change-point blink detector over a short rolling window of EAR samples.
///
/// A blink is reported when the window's standard deviation jumps by more
/// than `std_jump` while its mean is falling, and at least `cooldown_slides`
/// samples have passed since the previous blink.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    window: VecDeque<f64>,
    window_size: usize,
    std_jump: f64,
    cooldown_slides: u32,
    slides_since_blink: u32,
    prev_mean: f64,
    prev_std: f64,
    blinking: bool,
}

impl BlinkDetector {
    pub fn new(window_size: usize, std_jump: f64, cooldown_slides: u32) -> Self {
        let window_size = window_size.max(2);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            std_jump,
            cooldown_slides,
            slides_since_blink: cooldown_slides,
            prev_mean: 0.0,
            prev_std: 0.0,
            blinking: false,
        }
    }

    /// Feeds one EAR sample and returns whether it completed a blink.
    pub fn update(&mut self, ear: f64) -> bool {
        if self.window.is_empty() {
            self.window.extend(std::iter::repeat(ear).take(self.window_size - 1));
            let (mean, std) = self.stats();
            self.prev_mean = mean;
            self.prev_std = std;
        }

        self.window.push_back(ear);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }

        let (mean, std) = self.stats();
        let std_jumped = std - self.prev_std > self.std_jump;
        let mean_falling = mean < self.prev_mean;
        let cooled_down = self.slides_since_blink >= self.cooldown_slides;

        self.blinking = std_jumped && mean_falling && cooled_down;
        if self.blinking {
            self.slides_since_blink = 0;
        } else {
            self.slides_since_blink = self.slides_since_blink.saturating_add(1);
        }

        self.prev_mean = mean;
        self.prev_std = std;
        self.blinking
    }

    /// Decision made by the latest `update`.
    pub fn is_blinking(&self) -> bool {
        self.blinking
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.slides_since_blink = self.cooldown_slides;
        self.prev_mean = 0.0;
        self.prev_std = 0.0;
        self.blinking = false;
    }

    fn stats(&self) -> (f64, f64) {
        let n = self.window.len() as f64;
        if n == 0.0 {
            return (0.0, 0.0);
        }
        let mean = self.window.iter().sum::<f64>() / n;
        let variance = self.window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_STD_JUMP, DEFAULT_COOLDOWN_SLIDES)
    }
}
