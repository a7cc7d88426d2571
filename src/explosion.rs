use crate::trajectory::{Point, ARRIVAL};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::time::Duration;

const GRAVITY: f64 = 1.2;
const HIT_SYMBOLS: [char; 5] = ['*', '✦', '✧', '+', '·'];
const MISS_SYMBOLS: [char; 3] = ['#', '%', '!'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    /// kanji shot down
    Hit,
    /// kanji reached the cockpit
    Miss,
}

/// One spark, in normalised viewport coordinates
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
}

impl Particle {
    fn spark(at: Point, kind: BurstKind, rng: &mut dyn RngCore) -> Self {
        let (symbols, speed): (&[char], f64) = match kind {
            BurstKind::Hit => (&HIT_SYMBOLS, 0.6),
            BurstKind::Miss => (&MISS_SYMBOLS, 0.35),
        };
        let angle: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let magnitude = rng.gen_range(0.3..1.0) * speed;

        Self {
            x: at.x,
            y: at.y,
            vel_x: angle.cos() * magnitude,
            // misses spray back up from the cockpit
            vel_y: match kind {
                BurstKind::Hit => angle.sin() * magnitude,
                BurstKind::Miss => -angle.sin().abs() * magnitude,
            },
            symbol: *symbols.choose(rng).unwrap_or(&'*'),
            color_index: rng.gen_range(0..6),
            age: 0.0,
            max_age: rng.gen_range(0.3..0.6),
        }
    }

    fn update(&mut self, dt: f64) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.vel_y += GRAVITY * dt;
        self.age += dt;
        self.age < self.max_age && (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// 1 when fresh, 0 when expiring
    pub fn life(&self) -> f64 {
        (1.0 - self.age / self.max_age).clamp(0.0, 1.0)
    }
}

/// Particle state for the resolution window, advanced by frame deltas
#[derive(Debug, Default)]
pub struct Explosion {
    pub particles: Vec<Particle>,
    /// seconds of cockpit flash left after a miss
    pub flash: f64,
    last_frame: Option<Duration>,
}

impl Explosion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn burst(&mut self, at: Point, kind: BurstKind, rng: &mut dyn RngCore) {
        let count = match kind {
            BurstKind::Hit => 24,
            BurstKind::Miss => 14,
        };
        let origin = match kind {
            BurstKind::Hit => at,
            BurstKind::Miss => ARRIVAL,
        };
        self.particles
            .extend((0..count).map(|_| Particle::spark(origin, kind, rng)));
        if kind == BurstKind::Miss {
            self.flash = 0.5;
        }
    }

    /// Advance to host time `now`. A backwards timestamp advances nothing.
    pub fn update(&mut self, now: Duration) {
        let dt = self
            .last_frame
            .map(|last| now.saturating_sub(last).as_secs_f64())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.step(dt);
    }

    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.particles.retain_mut(|p| p.update(dt));
        self.flash = (self.flash - dt).max(0.0);
    }

    /// Forget the frame anchor so time spent paused is not replayed
    pub fn freeze(&mut self) {
        self.last_frame = None;
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.flash = 0.0;
        self.last_frame = None;
    }

    pub fn is_active(&self) -> bool {
        !self.particles.is_empty() || self.flash > 0.0
    }
}
