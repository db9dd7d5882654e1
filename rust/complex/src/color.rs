// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RGBA colors and their CSS-like text forms.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// From 0-255 channels and a `[0, 1]` alpha.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self::new(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0, a)
    }

    pub fn lerp(&self, u: f64, other: &Color) -> Color {
        Color::new(
            self.r + u * (other.r - self.r),
            self.g + u * (other.g - self.g),
            self.b + u * (other.b - self.b),
            self.a + u * (other.a - self.a),
        )
    }

    fn to255(x: f64) -> u8 {
        (x.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// `rgba(r,g,b,a)` with 0-255 channels.
    pub fn to_rgba_string(&self) -> String {
        format!(
            "rgba({},{},{},{})",
            Self::to255(self.r),
            Self::to255(self.g),
            Self::to255(self.b),
            vac_lite_geometry::format_number(self.a)
        )
    }

    /// Parses `rgba(r,g,b,a)`, ignoring whitespace.
    pub fn from_rgba_string(s: &str) -> Result<Color> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = compact
            .strip_prefix("rgba(")
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| Error::Parse(format!("not an rgba color: '{}'", s)))?;
        let parts: Vec<&str> = inner.split(',').collect();
        if parts.len() != 4 {
            return Err(Error::Parse(format!("rgba needs 4 components: '{}'", s)));
        }
        let channel = |p: &str| {
            p.parse::<f64>()
                .map(|v| v.clamp(0.0, 255.0) / 255.0)
                .map_err(|_| Error::Parse(format!("invalid color channel '{}'", p)))
        };
        let a = parts[3]
            .parse::<f64>()
            .map_err(|_| Error::Parse(format!("invalid alpha '{}'", parts[3])))?;
        Ok(Color::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, a))
    }

    /// Legacy text form: four floats separated by spaces.
    pub fn to_legacy_string(&self) -> String {
        use vac_lite_geometry::format_number as f;
        format!("{} {} {} {}", f(self.r), f(self.g), f(self.b), f(self.a))
    }
}

/// Reads a property out of a `key:value;key:value` style string.
pub fn style_property<'a>(style: &'a str, key: &str) -> Option<&'a str> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rgba_round_trip() {
        let c = Color::from_rgba8(255, 128, 0, 0.5);
        let s = c.to_rgba_string();
        assert_eq!(s, "rgba(255,128,0,0.5)");
        let back = Color::from_rgba_string(" rgba ( 255, 128,0 , 0.5 ) ").unwrap();
        assert_relative_eq!(back.g, c.g);
        assert_relative_eq!(back.a, 0.5);
    }

    #[test]
    fn style_lookup() {
        let style = "color:rgba(1,2,3,1);background-color: rgba(4,5,6,1) ;";
        assert_eq!(style_property(style, "color"), Some("rgba(1,2,3,1)"));
        assert_eq!(style_property(style, "background-color"), Some("rgba(4,5,6,1)"));
        assert_eq!(style_property(style, "stroke"), None);
    }

    #[test]
    fn rejects_malformed() {
        assert!(Color::from_rgba_string("rgb(1,2,3)").is_err());
        assert!(Color::from_rgba_string("rgba(1,2,x,1)").is_err());
    }
}
