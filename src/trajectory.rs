use rand::{Rng, RngCore};

/// Point in normalised viewport coordinates, origin top-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Point, t: f64) -> Point {
        Point {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Path category a kanji approaches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Lane {
    Left,
    Center,
    Right,
}

/// Where every lane ends: just above the cockpit
pub const ARRIVAL: Point = Point::new(0.5, 0.85);

impl Lane {
    pub fn start(self) -> Point {
        match self {
            Lane::Left => Point::new(0.1, 0.05),
            Lane::Center => Point::new(0.5, 0.05),
            Lane::Right => Point::new(0.9, 0.05),
        }
    }

    pub fn end(self) -> Point {
        ARRIVAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub lane: Lane,
    pub start: Point,
    pub end: Point,
}

impl Trajectory {
    pub fn for_lane(lane: Lane) -> Self {
        Self {
            lane,
            start: lane.start(),
            end: lane.end(),
        }
    }

    /// Position at `progress` in [0,1]; out-of-range values are clamped
    pub fn position(&self, progress: f64) -> Point {
        self.start.lerp(self.end, progress.clamp(0.0, 1.0))
    }
}

/// Stateless lane picker: 34% left, 33% right, 33% center
#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectoryGenerator {
    /// narrow layouts only ever fall down the middle
    pub mobile: bool,
}

impl TrajectoryGenerator {
    pub fn new(mobile: bool) -> Self {
        Self { mobile }
    }

    pub fn generate(&self, rng: &mut dyn RngCore) -> Trajectory {
        if self.mobile {
            return Trajectory::for_lane(Lane::Center);
        }
        let roll: f64 = rng.gen();
        let lane = if roll < 0.34 {
            Lane::Left
        } else if roll < 0.67 {
            Lane::Right
        } else {
            Lane::Center
        };
        Trajectory::for_lane(lane)
    }
}
