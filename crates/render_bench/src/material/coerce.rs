//! String to field-type conversions used by the normalizer

use std::path::PathBuf;

use super::material_type::{Rgb, TextureRef};

/// Sentinel opening a texture reference value
pub const TEXTURE_SENTINEL: &str = "Texture;";

/// Parsed `Texture;path;uv_channel;scale[;fallback]` value
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSpec {
    /// Referenced image
    pub texture: TextureRef,
    /// Raw fallback value, when one was given
    pub fallback: Option<String>,
}

/// Parse a decimal number
pub fn parse_float(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    let number: f64 = trimmed
        .parse()
        .map_err(|_| format!("'{trimmed}' is not a number"))?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(format!("'{trimmed}' is not a finite number"))
    }
}

/// Parse a color, returning the alpha component when one was given
///
/// Accepts `(r,g,b)`, `(r,g,b,a)` with components in [0, 1], and `#RRGGBB`.
pub fn parse_rgba(value: &str) -> Result<(Rgb, Option<f64>), String> {
    let trimmed = value.trim();

    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex).map(|rgb| (rgb, None));
    }

    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("'{trimmed}' is not a color, expected (r,g,b) or #RRGGBB"))?;

    let components = inner
        .split(',')
        .map(parse_float)
        .collect::<Result<Vec<f64>, String>>()?;

    if let Some(out) = components.iter().find(|c| !(0.0..=1.0).contains(*c)) {
        return Err(format!("color component {out} of '{trimmed}' is outside [0, 1]"));
    }

    match components.as_slice() {
        [r, g, b] => Ok((Rgb::new(*r, *g, *b), None)),
        [r, g, b, a] => Ok((Rgb::new(*r, *g, *b), Some(*a))),
        _ => Err(format!("'{trimmed}' must have 3 or 4 components")),
    }
}

/// Parse a color, dropping any alpha component
pub fn parse_rgb(value: &str) -> Result<Rgb, String> {
    parse_rgba(value).map(|(rgb, _)| rgb)
}

fn parse_hex(hex: &str) -> Result<Rgb, String> {
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'#{hex}' is not a #RRGGBB color"));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map(|v| f64::from(v) / 255.0)
            .map_err(|e| format!("'#{hex}': {e}"))
    };
    Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Whether a value is a texture reference
pub fn is_texture(value: &str) -> bool {
    value.trim_start().starts_with(TEXTURE_SENTINEL)
}

/// Parse a texture reference value
pub fn parse_texture(value: &str) -> Result<TextureSpec, String> {
    let body = value
        .trim()
        .strip_prefix(TEXTURE_SENTINEL)
        .ok_or_else(|| format!("'{value}' does not start with '{TEXTURE_SENTINEL}'"))?;

    let mut parts = body.splitn(4, ';');
    let path = parts.next().map(str::trim).unwrap_or_default();
    if path.is_empty() {
        return Err(format!("'{value}' names no texture file"));
    }

    let uv_channel = match parts.next().map(str::trim) {
        None | Some("") => 0,
        Some(uv) => uv
            .parse::<u32>()
            .map_err(|_| format!("UV channel '{uv}' is not a non-negative integer"))?,
    };

    let scale = match parts.next().map(str::trim) {
        None | Some("") => 1.0,
        Some(scale) => parse_float(scale)?,
    };
    if scale <= 0.0 {
        return Err(format!("texture scale {scale} must be positive"));
    }

    let fallback = parts
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);

    Ok(TextureSpec {
        texture: TextureRef::new(PathBuf::from(path), uv_channel, scale),
        fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float(" 1.52 "), Ok(1.52));
        assert!(parse_float("abc").is_err());
        assert!(parse_float("inf").is_err());
    }

    #[test]
    fn test_parse_tuple_color() {
        assert_eq!(parse_rgb("(0.9, 0.9, 1.0)"), Ok(Rgb::new(0.9, 0.9, 1.0)));
        assert_eq!(parse_rgb("(1,0,0)"), Ok(Rgb::new(1.0, 0.0, 0.0)));
        assert!(parse_rgb("(1.2,0,0)").is_err());
        assert!(parse_rgb("(1,0)").is_err());
        assert!(parse_rgb("1,0,0").is_err());
    }

    #[test]
    fn test_parse_rgba_keeps_alpha() {
        let (rgb, alpha) = parse_rgba("(0.8, 0.6, 0.4, 0.25)").unwrap();
        assert_eq!(rgb, Rgb::new(0.8, 0.6, 0.4));
        assert_eq!(alpha, Some(0.25));
    }

    #[test]
    fn test_parse_hex_color() {
        let rgb = parse_rgb("#FF8000").unwrap();
        assert_relative_eq!(rgb.r, 1.0);
        assert_relative_eq!(rgb.g, 128.0 / 255.0);
        assert_relative_eq!(rgb.b, 0.0);
        assert!(parse_rgb("#FF80").is_err());
        assert!(parse_rgb("#GG0000").is_err());
    }

    #[test]
    fn test_parse_texture() {
        let spec = parse_texture("Texture;/textures/wood.png;1;2.5").unwrap();
        assert_eq!(spec.texture, TextureRef::new("/textures/wood.png", 1, 2.5));
        assert_eq!(spec.fallback, None);

        let spec = parse_texture("Texture;wood.png;0;1;(0.5,0.4,0.3)").unwrap();
        assert_eq!(spec.fallback.as_deref(), Some("(0.5,0.4,0.3)"));

        let spec = parse_texture("Texture;wood.png").unwrap();
        assert_eq!(spec.texture, TextureRef::new("wood.png", 0, 1.0));
    }

    #[test]
    fn test_parse_texture_errors() {
        assert!(parse_texture("Texture;").is_err());
        assert!(parse_texture("Texture;wood.png;x;1").is_err());
        assert!(parse_texture("Texture;wood.png;0;-1").is_err());
        assert!(parse_texture("wood.png").is_err());
        assert!(is_texture("Texture;wood.png"));
        assert!(!is_texture("(1,1,1)"));
    }
}
