use rand::Rng;

pub const FALLBACK_HEX: &str = "#808080";

/// Converts an HSL triple (degrees, percent, percent) into `#rrggbb`.
pub fn hsl_to_hex(hue: u32, saturation: u32, lightness: u32) -> String {
    let h = f64::from(hue % 360) / 360.0;
    let s = f64::from(saturation.min(100)) / 100.0;
    let l = f64::from(lightness.min(100)) / 100.0;

    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_rgb(p, q, h + 1.0 / 3.0),
            hue_to_rgb(p, q, h),
            hue_to_rgb(p, q, h - 1.0 / 3.0),
        )
    };

    format!(
        "#{:02x}{:02x}{:02x}",
        channel(r),
        channel(g),
        channel(b)
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

fn channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Normalizes a colour string for hex-only inputs. Accepts `#rrggbb` as-is
/// and `hsl(h s% l%)` / `hsl(h, s%, l%)`; anything else maps to grey.
pub fn to_hex(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with('#') {
        return raw.to_string();
    }
    parse_hsl(raw)
        .map(|(h, s, l)| hsl_to_hex(h, s, l))
        .unwrap_or_else(|| FALLBACK_HEX.to_string())
}

fn parse_hsl(raw: &str) -> Option<(u32, u32, u32)> {
    let body = raw.strip_prefix("hsl(")?.strip_suffix(')')?;
    let mut parts = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty());
    let hue = parts.next()?.parse().ok()?;
    let saturation = parts.next()?.strip_suffix('%')?.parse().ok()?;
    let lightness = parts.next()?.strip_suffix('%')?.parse().ok()?;
    Some((hue, saturation, lightness))
}

pub fn random_planet_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    hsl_to_hex(
        rng.gen_range(0..=359),
        rng.gen_range(55..=85),
        rng.gen_range(45..=65),
    )
}

/// Dark, blue-to-magenta tones used for fresh system backgrounds.
pub fn random_background_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    hsl_to_hex(
        rng.gen_range(200..=350),
        rng.gen_range(30..=60),
        rng.gen_range(10..=20),
    )
}
