use std::collections::HashSet;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    color::FALLBACK_HEX,
    domain::{
        clamp_opacity, wrap_angle_degrees, AdvancedSettings, AppState, Keybinds, Modifier, Orbit,
        Planet, PlanetId, Shape, Spin, System, SystemId, DEFAULT_ORBIT_RADIUS,
        DEFAULT_ORBIT_SPEED, DEFAULT_PLANET_NAME, DEFAULT_PLANET_SIZE_PERCENT,
        MAX_PLANET_SIZE_PERCENT, MIN_PLANET_SIZE_PERCENT,
    },
    error::ParseError,
};

/// Legacy documents store both systems and planets either as arrays or as
/// objects keyed by id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCollection {
    List(Vec<Value>),
    Map(Map<String, Value>),
}

impl RawCollection {
    fn read(value: Option<&Value>) -> Self {
        value
            .and_then(|value| RawCollection::deserialize(value).ok())
            .unwrap_or_else(|| RawCollection::Map(Map::new()))
    }

    /// Mapping form: list entries are keyed by their own `id`, entries
    /// without one are dropped.
    fn into_keyed(self) -> Vec<(String, Value)> {
        match self {
            RawCollection::Map(map) => map.into_iter().collect(),
            RawCollection::List(items) => items
                .into_iter()
                .filter_map(|item| {
                    let key = item.as_object().and_then(|object| id_field(object, "id"));
                    if key.is_none() {
                        warn!("migrate: dropping system entry without id");
                    }
                    key.map(|key| (key, item))
                })
                .collect(),
        }
    }

    fn into_values(self) -> Vec<Value> {
        match self {
            RawCollection::Map(map) => map.into_iter().map(|(_, value)| value).collect(),
            RawCollection::List(items) => items,
        }
    }
}

pub fn parse_document(raw: &[u8]) -> Result<Value, ParseError> {
    let value: Value = serde_json::from_slice(raw)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    Ok(value)
}

/// Normalizes any persisted or imported blob into a structurally valid
/// state. Never fails and never adds default systems; callers check
/// [`AppState::needs_bootstrap`] afterwards.
pub fn migrate(raw: &Value) -> AppState {
    let mut state = AppState::default();
    let Some(root) = raw.as_object() else {
        debug!("migrate: document root is not an object, using defaults");
        return state;
    };

    state.adv = migrate_settings(root.get("adv"));
    if let Some(edit_mode) = field::<bool>(root, "editMode") {
        state.edit_mode = edit_mode;
    }
    if let Some(link_mode) = field::<bool>(root, "linkMode") {
        state.link_mode = link_mode;
    }
    if state.edit_mode == state.link_mode {
        state.link_mode = !state.edit_mode;
    }

    for (key, value) in RawCollection::read(root.get("systems")).into_keyed() {
        match migrate_system(SystemId(key), &value, &state.adv) {
            Some(system) => state.systems.insert(system),
            None => warn!("migrate: dropping malformed system entry"),
        }
    }

    state.current = id_field(root, "current").map(SystemId);
    state.ensure_current();
    state
}

fn migrate_settings(raw: Option<&Value>) -> AdvancedSettings {
    let mut adv = AdvancedSettings::default();
    let Some(raw) = raw.and_then(Value::as_object) else {
        return adv;
    };

    if let Some(show_hex) = field(raw, "showHex") {
        adv.show_hex = show_hex;
    }
    if let Some(speed_mult) = finite_field(raw, "speedMult") {
        adv.speed_mult = speed_mult;
    }
    if let Some(font) = text_field(raw, "font") {
        adv.font = font;
    }
    if let Some(disable_orbits) = field(raw, "disableOrbits") {
        adv.disable_orbits = disable_orbits;
    }
    if let Some(party_global) = field(raw, "partyGlobal") {
        adv.party_global = party_global;
    }
    if let Some(lock_layout) = field(raw, "lockLayout") {
        adv.lock_layout = lock_layout;
    }
    if let Some(keybinds) = raw.get("keybinds").and_then(Value::as_object) {
        adv.keybinds = migrate_keybinds(keybinds);
    }
    adv
}

fn migrate_keybinds(raw: &Map<String, Value>) -> Keybinds {
    let mut keybinds = Keybinds::default();
    if let Some(modifier) = field::<Modifier>(raw, "modifier") {
        keybinds.modifier = modifier;
    }
    if let Some(undo) = text_field(raw, "undo").and_then(|key| Keybinds::normalize_key(&key)) {
        keybinds.undo = undo;
    }
    if let Some(redo) = text_field(raw, "redo").and_then(|key| Keybinds::normalize_key(&key)) {
        keybinds.redo = redo;
    }
    keybinds
}

fn migrate_system(id: SystemId, raw: &Value, adv: &AdvancedSettings) -> Option<System> {
    let raw = raw.as_object()?;
    let mut system = System::new("System", "#ffcc00", adv.font.clone());
    system.id = id;

    if let Some(name) = field::<String>(raw, "name") {
        system.name = name;
    }
    if let Some(sun_color) = text_field(raw, "sunColor") {
        system.sun_color = sun_color;
    }
    if let Some(bg_solid) = text_field(raw, "bgSolid") {
        system.bg_solid = bg_solid;
    }
    if let Some(bg_gradient) = text_field(raw, "bgGradient") {
        system.bg_gradient = bg_gradient;
    }
    if let Some(bg_angle) = finite_field(raw, "bgAngle") {
        system.bg_angle = wrap_angle_degrees(bg_angle);
    }
    if let Some(outline_color) = text_field(raw, "outlineColor") {
        system.outline_color = outline_color;
    }
    if let Some(party_mode) = field(raw, "partyMode") {
        system.party_mode = party_mode;
    }
    if let Some(font) = text_field(raw, "font") {
        system.font = font;
    }

    let mut seen = HashSet::new();
    for value in RawCollection::read(raw.get("planets")).into_values() {
        let Some(mut planet) = migrate_planet(&value, adv) else {
            warn!("migrate: dropping malformed planet in system={}", system.id);
            continue;
        };
        if !seen.insert(planet.id.clone()) {
            planet.id = PlanetId::generate();
            seen.insert(planet.id.clone());
        }
        system.planets.push(planet);
    }
    Some(system)
}

fn migrate_planet(raw: &Value, adv: &AdvancedSettings) -> Option<Planet> {
    let raw = raw.as_object()?;
    let default_rotating = !adv.disable_orbits;

    let x = finite_field::<f64>(raw, "x");
    let y = finite_field::<f64>(raw, "y");
    let has_position = x.is_some() || y.is_some();
    let (x, y) = (x.unwrap_or(0.0), y.unwrap_or(0.0));

    let mut planet = Planet {
        id: id_field(raw, "id")
            .map(PlanetId)
            .unwrap_or_else(PlanetId::generate),
        name: field(raw, "name").unwrap_or_else(|| DEFAULT_PLANET_NAME.to_string()),
        url: text_field(raw, "url"),
        x,
        y,
        size_percent: migrate_size_percent(raw),
        color: text_field(raw, "color").unwrap_or_else(|| FALLBACK_HEX.to_string()),
        shape: field::<String>(raw, "shape")
            .and_then(|shape| Shape::parse(&shape))
            .unwrap_or_default(),
        outline_thickness: finite_field::<f64>(raw, "outlineThickness")
            .map(|thickness| thickness.max(0.0))
            .unwrap_or(0.0),
        outline_color: text_field(raw, "outlineColor").unwrap_or_else(|| "#ffffff".to_string()),
        opacity: finite_field(raw, "opacity").map(clamp_opacity).unwrap_or(1.0),
        orbit: Orbit::from_position(x, y, DEFAULT_ORBIT_SPEED, default_rotating),
        spin: raw
            .get("spin")
            .and_then(Value::as_object)
            .map(migrate_spin)
            .unwrap_or_default(),
    };

    match raw.get("orbit").and_then(Value::as_object) {
        Some(orbit) => {
            planet.orbit.speed = finite_field(orbit, "speed").unwrap_or(DEFAULT_ORBIT_SPEED);
            planet.orbit.rotating = field(orbit, "rotating").unwrap_or(default_rotating);
            planet.orbit.reverse = field(orbit, "reverse").unwrap_or(false);
            planet.orbit.show_ring = field(orbit, "showRing").unwrap_or(false);

            let radius = finite_field::<f64>(orbit, "radius").map(|radius| radius.max(0.0));
            let angle = finite_field::<f64>(orbit, "angle");
            match (radius, angle) {
                (Some(radius), Some(angle)) => {
                    planet.orbit.radius = radius;
                    planet.orbit.angle = angle;
                    reconcile_position(&mut planet, has_position);
                }
                _ => place_from_cartesian(&mut planet),
            }
        }
        None => place_from_cartesian(&mut planet),
    }

    Some(planet)
}

/// A rotating planet is drawn from its orbit, a resting one from its
/// position; whichever the renderer trusts wins.
fn reconcile_position(planet: &mut Planet, has_position: bool) {
    if planet.is_synchronized() {
        return;
    }
    if !has_position || planet.orbit.rotating {
        planet.set_polar(planet.orbit.radius, planet.orbit.angle);
    } else {
        planet.set_position(planet.x, planet.y);
    }
}

fn place_from_cartesian(planet: &mut Planet) {
    if planet.x.hypot(planet.y) == 0.0 {
        planet.set_polar(DEFAULT_ORBIT_RADIUS, 0.0);
    } else {
        planet.set_position(planet.x, planet.y);
    }
}

fn migrate_size_percent(raw: &Map<String, Value>) -> u32 {
    match finite_field::<f64>(raw, "sizePercent") {
        Some(size) if size > 0.0 => (size.round() as u32)
            .clamp(MIN_PLANET_SIZE_PERCENT, MAX_PLANET_SIZE_PERCENT),
        _ => DEFAULT_PLANET_SIZE_PERCENT,
    }
}

fn migrate_spin(raw: &Map<String, Value>) -> Spin {
    let defaults = Spin::default();
    Spin {
        enabled: field(raw, "enabled").unwrap_or(defaults.enabled),
        speed: finite_field(raw, "speed").unwrap_or(defaults.speed),
    }
}

fn field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    object
        .get(key)
        .filter(|value| !value.is_null())
        .and_then(|value| T::deserialize(value).ok())
}

fn finite_field<T: DeserializeOwned + Into<f64> + Copy>(
    object: &Map<String, Value>,
    key: &str,
) -> Option<T> {
    field::<T>(object, key).filter(|value| (*value).into().is_finite())
}

/// Non-blank strings only; blank values fall back to defaults.
fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    field::<String>(object, key).filter(|text| !text.trim().is_empty())
}

fn id_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/migrate_tests.rs"]
mod tests;
