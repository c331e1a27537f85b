//! Material card parser
//!
//! Cards are INI-like text files:
//!
//! ```text
//! ; Window glass
//! [General]
//! Name = Window Glass
//! Shader = Glass
//!
//! [Glass]
//! IOR = 1.52
//! Color = (0.9, 0.9, 1.0)
//! ```
//!
//! Keys of the `General` and `Rendering` sections (and keys before any
//! section) are kept as written; keys of any other section `S` become
//! `S.key`. Values are raw strings, coercion happens in the normalizer.

use crate::material::RawParams;

/// Sections whose keys are not prefixed with the section name
const PLAIN_SECTIONS: &[&str] = &["General", "Rendering"];

/// Parsed card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardData {
    /// `Name` entry of the card, if any
    pub name: Option<String>,
    /// Flattened parameters
    pub params: RawParams,
}

/// Card file parser
pub struct CardParser;

impl CardParser {
    /// Parse card contents
    ///
    /// # Returns
    /// The flattened parameters, or a `Line N: ...` message for the first
    /// line that is not a comment, a section header or a `key = value` pair
    pub fn parse(contents: &str) -> Result<CardData, String> {
        let mut params = RawParams::new();
        let mut section: Option<String> = None;

        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| format!("Line {}: unterminated section header", line_num + 1))?
                    .trim();
                if name.is_empty() {
                    return Err(format!("Line {}: empty section name", line_num + 1));
                }
                section = if PLAIN_SECTIONS.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                    None
                } else {
                    Some(name.to_string())
                };
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("Line {}: expected 'key = value', found '{}'", line_num + 1, line))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("Line {}: missing key before '='", line_num + 1));
            }

            let key = match &section {
                Some(section) => format!("{section}.{key}"),
                None => key.to_string(),
            };
            params.insert(key, value.trim());
        }

        let name = params
            .get_ignore_case("Name")
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(CardData { name, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let card = CardParser::parse(
            "; Window glass\n[General]\nName = Window Glass\nShader = Glass\n\n[Glass]\nIOR = 1.52\nColor = (0.9, 0.9, 1.0)\n",
        )
        .unwrap();

        assert_eq!(card.name.as_deref(), Some("Window Glass"));
        assert_eq!(card.params.get("Shader"), Some("Glass"));
        assert_eq!(card.params.get("Glass.IOR"), Some("1.52"));
        assert_eq!(card.params.get("Glass.Color"), Some("(0.9, 0.9, 1.0)"));
    }

    #[test]
    fn test_keys_before_section_and_equals_in_value() {
        let card = CardParser::parse("Shader = Passthrough\n[Passthrough]\nPbrt = Material \"diffuse\" \"rgb reflectance\" [0.5 0.5 0.5]\nLuxCore.0001 = a = b\n").unwrap();
        assert_eq!(card.params.get("Shader"), Some("Passthrough"));
        assert_eq!(card.params.get("Passthrough.LuxCore.0001"), Some("a = b"));
        assert!(card.params.get("Passthrough.Pbrt").is_some());
        assert_eq!(card.name, None);
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            CardParser::parse("[General\nName = x").unwrap_err(),
            "Line 1: unterminated section header"
        );
        assert!(CardParser::parse("[General]\nthis is not a pair\n").unwrap_err().starts_with("Line 2:"));
        assert!(CardParser::parse("= 3\n").is_err());
        assert!(CardParser::parse("[ ]\n").is_err());
    }

    #[test]
    fn test_comments_and_bom() {
        let card = CardParser::parse("\u{feff}# comment\n  ; another\n[General]\nName=Steel\n").unwrap();
        assert_eq!(card.name.as_deref(), Some("Steel"));
        assert_eq!(card.params.len(), 1);
    }
}
