use std::f64::consts::TAU;

use rand::Rng;
use shared::domain::{Planet, System, Viewport};

pub const SPAWN_START_RADIUS: f64 = 140.0;
pub const SPAWN_MAX_ATTEMPTS: usize = 800;
pub const SPAWN_JITTER: f64 = 15.0;
pub const SPAWN_MARGIN: f64 = 8.0;
pub const SPAWN_RADIUS_STEP: f64 = 40.0;
pub const SPAWN_ATTEMPTS_PER_RADIUS: usize = 30;

pub const ARRANGE_RING_CAPACITY: usize = 8;
pub const ARRANGE_BASE_RADIUS: f64 = 180.0;
pub const ARRANGE_RING_GAP: f64 = 70.0;
pub const ARRANGE_RING_OFFSET: f64 = 0.3;
pub const ARRANGE_RADIUS_JITTER: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    /// The attempt budget ran out and the position may overlap.
    pub fallback: bool,
}

/// Whether a planet `candidate_px` wide centred at `(x, y)` would come
/// within the spawn margin of any existing planet.
pub fn overlaps(x: f64, y: f64, candidate_px: f64, planets: &[Planet], viewport: &Viewport) -> bool {
    planets.iter().any(|other| {
        let other_px = viewport.planet_size_px(other.size_percent);
        let min_distance = (candidate_px + other_px) / 2.0 + SPAWN_MARGIN;
        (x - other.x).hypot(y - other.y) < min_distance
    })
}

/// Rejection-samples a free spot around the sun, widening the search ring
/// as attempts fail. Always returns a position.
pub fn place<R: Rng + ?Sized>(
    system: &System,
    candidate_px: f64,
    viewport: &Viewport,
    rng: &mut R,
) -> Placement {
    let mut radius = SPAWN_START_RADIUS;
    for attempt in 0..SPAWN_MAX_ATTEMPTS {
        let angle = rng.gen_range(0.0..TAU);
        let jitter = rng.gen_range(-SPAWN_JITTER..=SPAWN_JITTER);
        let x = angle.cos() * radius + jitter;
        let y = angle.sin() * radius + jitter;
        if !overlaps(x, y, candidate_px, &system.planets, viewport) {
            return Placement {
                x,
                y,
                fallback: false,
            };
        }
        if (attempt + 1) % SPAWN_ATTEMPTS_PER_RADIUS == 0 {
            radius += SPAWN_RADIUS_STEP;
        }
    }
    Placement {
        x: radius,
        y: 0.0,
        fallback: true,
    }
}

pub fn ring_base_radius(ring: usize) -> f64 {
    ARRANGE_BASE_RADIUS + ring as f64 * ARRANGE_RING_GAP
}

/// Lays planets out in rings of eight, in list order. Orbit speed and
/// rotation survive; radius, angle and position are overwritten.
pub fn arrange<R: Rng + ?Sized>(system: &mut System, rng: &mut R) {
    let count = system.planets.len();
    if count == 0 {
        return;
    }
    let spacing = TAU / count.min(ARRANGE_RING_CAPACITY) as f64;
    for (index, planet) in system.planets.iter_mut().enumerate() {
        let ring = index / ARRANGE_RING_CAPACITY;
        let angle = index as f64 * spacing + ring as f64 * ARRANGE_RING_OFFSET;
        let radius = ring_base_radius(ring) + rng.gen_range(0.0..ARRANGE_RADIUS_JITTER);
        planet.set_polar(radius, angle);
    }
}
