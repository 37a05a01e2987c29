use shared::domain::{AppState, Orbit, PlanetId};

/// Longest step a single frame may integrate, in seconds.
pub const MAX_FRAME_SECONDS: f64 = 0.1;

pub fn clamp_elapsed(elapsed: f64) -> f64 {
    if elapsed.is_nan() {
        return 0.0;
    }
    elapsed.clamp(0.0, MAX_FRAME_SECONDS)
}

pub fn advance_orbit(orbit: &mut Orbit, speed_mult: f64, dt: f64) {
    orbit.angle += orbit.direction() * orbit.speed * speed_mult * dt;
}

/// Advances every rotating planet of the active system. Returns how many
/// planets moved.
pub fn tick(state: &mut AppState, elapsed: f64) -> usize {
    tick_holding(state, elapsed, None)
}

/// Like [`tick`], but leaves `held` alone: a planet under the pointer is
/// positioned by the drag, not by its orbit.
pub fn tick_holding(state: &mut AppState, elapsed: f64, held: Option<&PlanetId>) -> usize {
    let dt = clamp_elapsed(elapsed);
    let speed_mult = state.adv.speed_mult;
    let Some(system) = state.current_system_mut() else {
        return 0;
    };

    let mut moved = 0;
    for planet in system
        .planets
        .iter_mut()
        .filter(|planet| planet.orbit.rotating && Some(&planet.id) != held)
    {
        advance_orbit(&mut planet.orbit, speed_mult, dt);
        let (x, y) = planet.orbit.position();
        planet.x = x;
        planet.y = y;
        moved += 1;
    }
    moved
}

/// Turns monotonic frame timestamps into elapsed seconds. The first frame
/// and any frame that goes back in time elapse nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed seconds since the previous frame. Non-finite timestamps are
    /// ignored and report no elapsed time.
    pub fn frame(&mut self, now_seconds: f64) -> f64 {
        if !now_seconds.is_finite() {
            return 0.0;
        }
        let elapsed = match self.last {
            Some(last) if now_seconds > last => now_seconds - last,
            _ => 0.0,
        };
        self.last = Some(now_seconds);
        elapsed
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
