use rand::Rng;
use shared::{
    color::{random_background_color, random_planet_color},
    domain::{AdvancedSettings, AppState, Planet, Shape, System, DEFAULT_PLANET_NAME},
};
use tracing::info;

const ORBIT_SPEED_MIN: f64 = 0.1;
const ORBIT_SPEED_MAX: f64 = 0.5;
const STARTER_PLANET_SIZE_PERCENT: u32 = 15;

/// A freshly created planet: random colour and orbit speed, orbiting only
/// when orbits are enabled.
pub fn new_planet<R: Rng + ?Sized>(
    adv: &AdvancedSettings,
    name: &str,
    (x, y): (f64, f64),
    rng: &mut R,
) -> Planet {
    let speed = rng.gen_range(ORBIT_SPEED_MIN..ORBIT_SPEED_MAX);
    let name = if name.trim().is_empty() {
        DEFAULT_PLANET_NAME
    } else {
        name
    };
    let mut planet = Planet::new(name, x, y, speed, !adv.disable_orbits);
    planet.color = random_planet_color(rng);
    planet
}

/// `System N+1` with randomized dark colours.
pub fn new_system<R: Rng + ?Sized>(state: &AppState, rng: &mut R) -> System {
    let name = format!("System {}", state.systems.len() + 1);
    let mut system = System::new(name, random_background_color(rng), state.adv.font.clone());
    system.bg_solid = random_background_color(rng);
    system.bg_gradient = random_background_color(rng);
    system.bg_angle = f64::from(rng.gen_range(0..360u32));
    system
}

fn starter_planet<R: Rng + ?Sized>(
    adv: &AdvancedSettings,
    rng: &mut R,
    (name, url, position, color, shape): (&str, &str, (f64, f64), &str, Shape),
) -> Planet {
    let mut planet = new_planet(adv, name, position, rng);
    planet.url = Some(url.to_string());
    planet.size_percent = STARTER_PLANET_SIZE_PERCENT;
    planet.color = color.to_string();
    planet.shape = shape;
    planet
}

/// Replaces the systems with the starter set. Settings and mode survive.
pub fn seed_default_systems<R: Rng + ?Sized>(state: &mut AppState, rng: &mut R) {
    let mut school = System::new("School", "#ffcc00", state.adv.font.clone());
    for starter in [
        ("Email", "https://mail.google.com", (200.0, 0.0), "#4285F4", Shape::Circle),
        ("Calendar", "https://calendar.google.com", (0.0, 200.0), "#EA4335", Shape::Diamond),
        ("Drive", "https://drive.google.com", (-200.0, 0.0), "#34A853", Shape::Square),
    ] {
        school.planets.push(starter_planet(&state.adv, rng, starter));
    }
    let personal = System::new("Personal", "#ff9900", state.adv.font.clone());

    state.systems = Default::default();
    state.current = Some(school.id.clone());
    state.systems.insert(school);
    state.systems.insert(personal);
    info!("bootstrap: seeded default systems");
}
