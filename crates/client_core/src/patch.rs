//! Partial edits coming from the editor forms. `None` leaves a field alone.

use shared::{
    color::to_hex,
    domain::{
        wrap_angle_degrees, AdvancedSettings, Keybinds, Modifier, Planet, Shape, System,
    },
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanetPatch {
    pub name: Option<String>,
    /// An empty string removes the link.
    pub url: Option<String>,
    pub size_percent: Option<u32>,
    pub color: Option<String>,
    pub shape: Option<Shape>,
    pub opacity: Option<f64>,
    pub outline_thickness: Option<f64>,
    pub outline_color: Option<String>,
    pub orbit_speed: Option<f64>,
    pub orbit_reverse: Option<bool>,
    pub show_ring: Option<bool>,
    pub spin_enabled: Option<bool>,
    pub spin_speed: Option<f64>,
}

impl PlanetPatch {
    pub fn apply(self, planet: &mut Planet) {
        if let Some(name) = self.name {
            planet.name = name;
        }
        if let Some(url) = self.url {
            let url = url.trim();
            planet.url = (!url.is_empty()).then(|| url.to_string());
        }
        if let Some(size_percent) = self.size_percent {
            planet.set_size_percent(size_percent);
        }
        if let Some(color) = self.color {
            planet.color = to_hex(&color);
        }
        if let Some(shape) = self.shape {
            planet.shape = shape;
        }
        if let Some(opacity) = self.opacity {
            planet.set_opacity(opacity);
        }
        if let Some(thickness) = self.outline_thickness.filter(|value| value.is_finite()) {
            planet.outline_thickness = thickness.max(0.0);
        }
        if let Some(outline_color) = self.outline_color {
            planet.outline_color = to_hex(&outline_color);
        }
        if let Some(speed) = self.orbit_speed.filter(|value| value.is_finite()) {
            planet.orbit.speed = speed.max(0.0);
        }
        if let Some(reverse) = self.orbit_reverse {
            planet.orbit.reverse = reverse;
        }
        if let Some(show_ring) = self.show_ring {
            planet.orbit.show_ring = show_ring;
        }
        if let Some(enabled) = self.spin_enabled {
            planet.spin.enabled = enabled;
        }
        if let Some(speed) = self.spin_speed.filter(|value| value.is_finite()) {
            planet.spin.speed = speed;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemPatch {
    pub name: Option<String>,
    pub sun_color: Option<String>,
    pub outline_color: Option<String>,
    pub bg_solid: Option<String>,
    pub bg_gradient: Option<String>,
    pub bg_angle: Option<f64>,
    pub party_mode: Option<bool>,
    pub font: Option<String>,
}

impl SystemPatch {
    pub fn apply(self, system: &mut System) {
        if let Some(name) = self.name {
            system.name = name;
        }
        if let Some(sun_color) = self.sun_color {
            system.sun_color = to_hex(&sun_color);
        }
        if let Some(outline_color) = self.outline_color {
            system.outline_color = to_hex(&outline_color);
        }
        if let Some(bg_solid) = self.bg_solid {
            system.bg_solid = to_hex(&bg_solid);
        }
        if let Some(bg_gradient) = self.bg_gradient {
            system.bg_gradient = to_hex(&bg_gradient);
        }
        if let Some(bg_angle) = self.bg_angle {
            system.bg_angle = wrap_angle_degrees(bg_angle);
        }
        if let Some(party_mode) = self.party_mode {
            system.party_mode = party_mode;
        }
        if let Some(font) = self.font.filter(|font| !font.trim().is_empty()) {
            system.font = font;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub show_hex: Option<bool>,
    pub speed_mult: Option<f64>,
    pub font: Option<String>,
    pub disable_orbits: Option<bool>,
    pub party_global: Option<bool>,
    pub lock_layout: Option<bool>,
    pub modifier: Option<Modifier>,
    pub undo_key: Option<String>,
    pub redo_key: Option<String>,
}

impl SettingsPatch {
    /// Returns true when this patch turns orbits off.
    pub fn apply(self, adv: &mut AdvancedSettings) -> bool {
        if let Some(show_hex) = self.show_hex {
            adv.show_hex = show_hex;
        }
        if let Some(speed_mult) = self.speed_mult.filter(|value| value.is_finite()) {
            adv.speed_mult = speed_mult.max(0.0);
        }
        if let Some(font) = self.font.filter(|font| !font.trim().is_empty()) {
            adv.font = font;
        }
        if let Some(party_global) = self.party_global {
            adv.party_global = party_global;
        }
        if let Some(lock_layout) = self.lock_layout {
            adv.lock_layout = lock_layout;
        }
        if let Some(modifier) = self.modifier {
            adv.keybinds.modifier = modifier;
        }
        let defaults = Keybinds::default();
        if let Some(undo) = self.undo_key {
            adv.keybinds.undo = Keybinds::normalize_key(&undo).unwrap_or(defaults.undo);
        }
        if let Some(redo) = self.redo_key {
            adv.keybinds.redo = Keybinds::normalize_key(&redo).unwrap_or(defaults.redo);
        }
        if let Some(disable_orbits) = self.disable_orbits {
            adv.disable_orbits = disable_orbits;
        }
        self.disable_orbits == Some(true)
    }
}
