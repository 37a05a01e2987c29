use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use url::Url;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(SystemId);
id_newtype!(PlanetId);

pub const DEFAULT_FONT: &str = "Inter,system-ui,Arial";
pub const DEFAULT_PLANET_NAME: &str = "New Planet";
pub const DEFAULT_PLANET_SIZE_PERCENT: u32 = 18;
pub const MIN_PLANET_SIZE_PERCENT: u32 = 5;
pub const MAX_PLANET_SIZE_PERCENT: u32 = 50;
pub const MIN_OPACITY: f64 = 0.1;
pub const MAX_OPACITY: f64 = 1.0;
/// Orbit radius used when a planet sits exactly on the sun.
pub const DEFAULT_ORBIT_RADIUS: f64 = 200.0;
pub const DEFAULT_ORBIT_SPEED: f64 = 0.2;

const SYNC_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Circle,
    Square,
    Diamond,
    Star,
    Triangle,
    Pentagon,
    Hexagon,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::Circle,
        Shape::Square,
        Shape::Diamond,
        Shape::Star,
        Shape::Triangle,
        Shape::Pentagon,
        Shape::Hexagon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Square => "square",
            Shape::Diamond => "diamond",
            Shape::Star => "star",
            Shape::Triangle => "triangle",
            Shape::Pentagon => "pentagon",
            Shape::Hexagon => "hexagon",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|shape| shape.as_str().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    #[default]
    Ctrl,
    Meta,
    Alt,
}

/// Which modifier keys were held when a shortcut key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeldModifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybinds {
    pub modifier: Modifier,
    pub undo: String,
    pub redo: String,
}

impl Default for Keybinds {
    fn default() -> Self {
        Self {
            modifier: Modifier::Ctrl,
            undo: "z".into(),
            redo: "y".into(),
        }
    }
}

impl Keybinds {
    /// Bindings are single keys: the first character, lowercased. Blank input
    /// yields `None`.
    pub fn normalize_key(raw: &str) -> Option<String> {
        raw.trim()
            .chars()
            .next()
            .map(|key| key.to_lowercase().collect())
    }

    /// Resolves a key press against the configured undo/redo bindings. Undo is
    /// checked first when both bindings share a key.
    pub fn action_for(&self, held: HeldModifiers, key: &str) -> Option<ShortcutAction> {
        let modifier_held = match self.modifier {
            Modifier::Ctrl => held.ctrl,
            Modifier::Meta => held.meta,
            Modifier::Alt => held.alt,
        };
        if !modifier_held {
            return None;
        }
        if key.eq_ignore_ascii_case(&self.undo) {
            Some(ShortcutAction::Undo)
        } else if key.eq_ignore_ascii_case(&self.redo) {
            Some(ShortcutAction::Redo)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSettings {
    pub show_hex: bool,
    pub speed_mult: f64,
    pub font: String,
    pub disable_orbits: bool,
    pub party_global: bool,
    pub lock_layout: bool,
    pub keybinds: Keybinds,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            show_hex: false,
            speed_mult: 1.0,
            font: DEFAULT_FONT.into(),
            disable_orbits: true,
            party_global: false,
            lock_layout: false,
            keybinds: Keybinds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orbit {
    pub radius: f64,
    pub angle: f64,
    pub speed: f64,
    pub rotating: bool,
    pub reverse: bool,
    pub show_ring: bool,
}

impl Orbit {
    pub fn from_position(x: f64, y: f64, speed: f64, rotating: bool) -> Self {
        Self {
            radius: x.hypot(y),
            angle: y.atan2(x),
            speed,
            rotating,
            reverse: false,
            show_ring: false,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (
            self.radius * self.angle.cos(),
            self.radius * self.angle.sin(),
        )
    }

    pub fn direction(&self) -> f64 {
        if self.reverse {
            -1.0
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spin {
    pub enabled: bool,
    pub speed: f64,
}

impl Default for Spin {
    fn default() -> Self {
        Self {
            enabled: false,
            speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Planet {
    pub id: PlanetId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub x: f64,
    pub y: f64,
    pub size_percent: u32,
    pub color: String,
    pub shape: Shape,
    pub outline_thickness: f64,
    pub outline_color: String,
    pub opacity: f64,
    pub orbit: Orbit,
    pub spin: Spin,
}

impl Planet {
    /// A planet at `(x, y)` with its orbit derived from that position.
    pub fn new(name: impl Into<String>, x: f64, y: f64, orbit_speed: f64, rotating: bool) -> Self {
        let mut planet = Self {
            id: PlanetId::generate(),
            name: name.into(),
            url: None,
            x,
            y,
            size_percent: DEFAULT_PLANET_SIZE_PERCENT,
            color: "#808080".into(),
            shape: Shape::Circle,
            outline_thickness: 2.0,
            outline_color: "#111".into(),
            opacity: 1.0,
            orbit: Orbit::from_position(x, y, orbit_speed, rotating),
            spin: Spin::default(),
        };
        if planet.orbit.radius == 0.0 {
            planet.set_polar(DEFAULT_ORBIT_RADIUS, 0.0);
        }
        planet
    }

    /// Moves the planet in cartesian space; the orbit follows.
    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.orbit.radius = x.hypot(y);
        self.orbit.angle = y.atan2(x);
    }

    /// Moves the planet in polar space; the cartesian position follows.
    pub fn set_polar(&mut self, radius: f64, angle: f64) {
        self.orbit.radius = radius.max(0.0);
        self.orbit.angle = angle;
        let (x, y) = self.orbit.position();
        self.x = x;
        self.y = y;
    }

    pub fn is_synchronized(&self) -> bool {
        let (x, y) = self.orbit.position();
        let tolerance = SYNC_TOLERANCE * self.orbit.radius.max(1.0);
        (x - self.x).abs() <= tolerance && (y - self.y).abs() <= tolerance
    }

    pub fn set_size_percent(&mut self, size_percent: u32) {
        self.size_percent = size_percent.clamp(MIN_PLANET_SIZE_PERCENT, MAX_PLANET_SIZE_PERCENT);
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = clamp_opacity(opacity);
    }

    /// The planet's link, if it has one worth opening. Bare hosts such as
    /// `example.com` are read as https.
    pub fn link(&self) -> Option<Url> {
        let raw = self.url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&format!("https://{raw}")).ok()
            }
            Err(_) => None,
        }
    }

    /// Rotation in degrees the renderer should apply at time `t_seconds`.
    pub fn spin_degrees(&self, t_seconds: f64) -> f64 {
        if self.spin.enabled {
            t_seconds * self.spin.speed * 360.0
        } else {
            0.0
        }
    }
}

pub fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        return MAX_OPACITY;
    }
    opacity.clamp(MIN_OPACITY, MAX_OPACITY)
}

pub fn wrap_angle_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: SystemId,
    pub name: String,
    pub sun_color: String,
    pub bg_solid: String,
    pub bg_gradient: String,
    pub bg_angle: f64,
    pub outline_color: String,
    pub party_mode: bool,
    pub font: String,
    pub planets: Vec<Planet>,
}

impl System {
    pub fn new(name: impl Into<String>, sun_color: impl Into<String>, font: impl Into<String>) -> Self {
        Self {
            id: SystemId::generate(),
            name: name.into(),
            sun_color: sun_color.into(),
            bg_solid: "#06102a".into(),
            bg_gradient: "#08122f".into(),
            bg_angle: 120.0,
            outline_color: "#111111".into(),
            party_mode: false,
            font: font.into(),
            planets: Vec::new(),
        }
    }

    pub fn planet(&self, id: &PlanetId) -> Option<&Planet> {
        self.planets.iter().find(|planet| &planet.id == id)
    }

    pub fn planet_mut(&mut self, id: &PlanetId) -> Option<&mut Planet> {
        self.planets.iter_mut().find(|planet| &planet.id == id)
    }

    pub fn remove_planet(&mut self, id: &PlanetId) -> Option<Planet> {
        let index = self.planets.iter().position(|planet| &planet.id == id)?;
        Some(self.planets.remove(index))
    }

    /// Deep copy under a fresh id; every planet gets a fresh id too.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = SystemId::generate();
        copy.name = format!("{} (copy)", self.name);
        for planet in &mut copy.planets {
            planet.id = PlanetId::generate();
        }
        copy
    }

    /// CSS-style background descriptor for the renderer.
    pub fn background(&self) -> String {
        let gradient = if self.bg_gradient.is_empty() {
            &self.bg_solid
        } else {
            &self.bg_gradient
        };
        format!(
            "linear-gradient({}deg, {}, {})",
            self.bg_angle, self.bg_solid, gradient
        )
    }
}

/// Systems keyed by id, in tab order. Persisted as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemMap {
    entries: Vec<System>,
}

impl SystemMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &SystemId) -> bool {
        self.entries.iter().any(|system| &system.id == id)
    }

    pub fn get(&self, id: &SystemId) -> Option<&System> {
        self.entries.iter().find(|system| &system.id == id)
    }

    pub fn get_mut(&mut self, id: &SystemId) -> Option<&mut System> {
        self.entries.iter_mut().find(|system| &system.id == id)
    }

    /// Inserts at the end, or replaces in place when the id is already present.
    pub fn insert(&mut self, system: System) {
        match self.entries.iter_mut().find(|existing| existing.id == system.id) {
            Some(existing) => *existing = system,
            None => self.entries.push(system),
        }
    }

    pub fn remove(&mut self, id: &SystemId) -> Option<System> {
        let index = self.entries.iter().position(|system| &system.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn first_id(&self) -> Option<&SystemId> {
        self.entries.first().map(|system| &system.id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SystemId> {
        self.entries.iter().map(|system| &system.id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, System> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, System> {
        self.entries.iter_mut()
    }

    /// Reorders to follow `order`. Unknown ids are ignored; systems missing
    /// from `order` keep their relative order after the listed ones.
    pub fn reorder(&mut self, order: &[SystemId]) {
        let mut remaining = std::mem::take(&mut self.entries);
        for id in order {
            if let Some(index) = remaining.iter().position(|system| &system.id == id) {
                self.entries.push(remaining.remove(index));
            }
        }
        self.entries.append(&mut remaining);
    }
}

impl<'a> IntoIterator for &'a SystemMap {
    type Item = &'a System;
    type IntoIter = std::slice::Iter<'a, System>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for SystemMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for system in &self.entries {
            map.serialize_entry(system.id.as_str(), system)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SystemMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SystemMapVisitor;

        impl<'de> Visitor<'de> for SystemMapVisitor {
            type Value = SystemMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of system id to system")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SystemMap, A::Error> {
                let mut systems = SystemMap::new();
                while let Some((key, mut system)) = access.next_entry::<String, System>()? {
                    system.id = SystemId(key);
                    systems.insert(system);
                }
                Ok(systems)
            }
        }

        deserializer.deserialize_map(SystemMapVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Link,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub systems: SystemMap,
    pub current: Option<SystemId>,
    pub edit_mode: bool,
    pub link_mode: bool,
    pub adv: AdvancedSettings,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            systems: SystemMap::new(),
            current: None,
            edit_mode: false,
            link_mode: true,
            adv: AdvancedSettings::default(),
        }
    }
}

impl AppState {
    pub fn mode(&self) -> Mode {
        if self.edit_mode {
            Mode::Edit
        } else {
            Mode::Link
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.edit_mode = mode == Mode::Edit;
        self.link_mode = !self.edit_mode;
    }

    pub fn current_system(&self) -> Option<&System> {
        self.systems.get(self.current.as_ref()?)
    }

    pub fn current_system_mut(&mut self) -> Option<&mut System> {
        let current = self.current.clone()?;
        self.systems.get_mut(&current)
    }

    pub fn has_valid_current(&self) -> bool {
        match &self.current {
            Some(id) => self.systems.contains(id),
            None => self.systems.is_empty(),
        }
    }

    /// Points `current` at the first system when it dangles. Returns whether
    /// anything changed.
    pub fn ensure_current(&mut self) -> bool {
        if self.has_valid_current() {
            return false;
        }
        self.current = self.systems.first_id().cloned();
        true
    }

    pub fn needs_bootstrap(&self) -> bool {
        self.systems.is_empty() || self.current.is_none()
    }
}

/// The visible canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Rendered edge length of a planet of the given size percentage.
    pub fn planet_size_px(&self, size_percent: u32) -> f64 {
        let base = self.width.min(self.height);
        (base * f64::from(size_percent) / 100.0).round().max(12.0)
    }
}
