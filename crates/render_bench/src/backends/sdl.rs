//! Text helpers shared by the emitters
//!
//! Numbers are always written with a decimal point and never in exponent
//! notation, which every supported renderer parses. The output of a value is
//! a pure function of its bits, so emitted scenes are byte-stable.

use std::fmt;
use std::path::Path;

use crate::foundation::math::{Point3, Vec3};
use crate::material::{Passthrough, Rgb};

/// Token standing for the scene file stem in emitted text and sidecars
pub const SCENE_STEM_TOKEN: &str = "@@SCENE_STEM@@";

/// Display wrapper for an `f64` in SDL
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Num(pub f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.0 == 0.0 { 0.0 } else { self.0 };
        if value.fract() == 0.0 && value.abs() < 1e15 {
            write!(f, "{value:.1}")
        } else {
            write!(f, "{value}")
        }
    }
}

/// `r g b`
pub fn rgb(color: Rgb) -> String {
    join(color.to_array())
}

/// `x y z`
pub fn vec3(v: &Vec3) -> String {
    join([v.x, v.y, v.z])
}

/// `x y z` of a point
pub fn point3(p: &Point3) -> String {
    join([p.x, p.y, p.z])
}

/// Space separated numbers
pub fn join<I: IntoIterator<Item = f64>>(values: I) -> String {
    values
        .into_iter()
        .map(|v| Num(v).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Double-quoted string with backslashes and quotes escaped
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Quoted path, with `/` separators
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy().replace('\\', "/"))
}

/// Escape text for an XML attribute value
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fill the color tokens of passthrough text
pub fn fill_color(text: &str, color: Rgb) -> String {
    text.replace("%RED%", &Num(color.r).to_string())
        .replace("%GREEN%", &Num(color.g).to_string())
        .replace("%BLUE%", &Num(color.b).to_string())
}

/// Passthrough text declaring the material `name`
pub fn passthrough(name: &str, material: &Passthrough) -> String {
    terminated(material.text.replace("%NAME%", name))
}

/// Ensure a fragment ends with exactly one newline
pub fn terminated(mut text: String) -> String {
    while text.ends_with('\n') {
        text.pop();
    }
    text.push('\n');
    text
}
