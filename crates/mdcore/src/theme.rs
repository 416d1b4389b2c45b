use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref COLOR_VALUE: Regex = Regex::new(
        r"^(#[0-9A-Fa-f]{3,8}|var\(--[A-Za-z0-9_-]+\)|rgba?\([0-9.,%\s]+\)|[A-Za-z]+)$"
    )
    .expect("Invalid COLOR_VALUE regex pattern");
    static ref CLASS_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid CLASS_NAME regex pattern");
}

/// Host theme color tokens used by highlighted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeColor {
    TextBlue,
    TextLight,
    TextCyan,
    TextYellow,
    TextGreen,
}

/// Token classes and the color each group is drawn with.
pub const TOKEN_COLORS: &[(&[&str], ThemeColor)] = &[
    (
        &[
            "hljs-doctag",
            "hljs-keyword",
            "hljs-template-tag",
            "hljs-template-variable",
            "hljs-type",
            "hljs-title",
        ],
        ThemeColor::TextBlue,
    ),
    (
        &[
            "hljs-attr",
            "hljs-attribute",
            "hljs-literal",
            "hljs-meta",
            "hljs-number",
            "hljs-operator",
            "hljs-selector-attr",
            "hljs-selector-class",
            "hljs-selector-id",
            "hljs-variable",
        ],
        ThemeColor::TextLight,
    ),
    (&["hljs-regexp", "hljs-string"], ThemeColor::TextCyan),
    (&["hljs-built_in", "hljs-symbol"], ThemeColor::TextYellow),
    (
        &["hljs-code", "hljs-comment", "hljs-formula"],
        ThemeColor::TextLight,
    ),
    (
        &[
            "hljs-name",
            "hljs-quote",
            "hljs-selector-pseudo",
            "hljs-selector-tag",
        ],
        ThemeColor::TextGreen,
    ),
];

/// CSS values for each [`ThemeColor`]. Defaults defer to the host's custom properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub text_blue: String,
    pub text_light: String,
    pub text_cyan: String,
    pub text_yellow: String,
    pub text_green: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text_blue: String::from("var(--color-text-blue)"),
            text_light: String::from("var(--color-text-light)"),
            text_cyan: String::from("var(--color-text-cyan)"),
            text_yellow: String::from("var(--color-text-yellow)"),
            text_green: String::from("var(--color-text-green)"),
        }
    }
}

impl Palette {
    pub fn color(&self, color: ThemeColor) -> &str {
        match color {
            ThemeColor::TextBlue => &self.text_blue,
            ThemeColor::TextLight => &self.text_light,
            ThemeColor::TextCyan => &self.text_cyan,
            ThemeColor::TextYellow => &self.text_yellow,
            ThemeColor::TextGreen => &self.text_green,
        }
    }

    /// Replace values that are not plain CSS colors with the defaults.
    /// Returns true when something was corrected.
    pub fn validate(&mut self) -> bool {
        let defaults = Palette::default();
        let mut corrected = false;
        for (value, fallback, name) in [
            (&mut self.text_blue, defaults.text_blue, "text_blue"),
            (&mut self.text_light, defaults.text_light, "text_light"),
            (&mut self.text_cyan, defaults.text_cyan, "text_cyan"),
            (&mut self.text_yellow, defaults.text_yellow, "text_yellow"),
            (&mut self.text_green, defaults.text_green, "text_green"),
        ] {
            if !is_valid_color(value) {
                log::warn!("Invalid palette color {}: {:?}, using default", name, value);
                *value = fallback;
                corrected = true;
            }
        }
        corrected
    }
}

pub fn is_valid_color(value: &str) -> bool {
    COLOR_VALUE.is_match(value.trim())
}

pub fn is_valid_class_name(value: &str) -> bool {
    CLASS_NAME.is_match(value)
}

/// Token color rules, every selector nested under `.{scope_class}`.
pub fn scoped_stylesheet(scope_class: &str, palette: &Palette) -> String {
    let mut css = String::new();
    for (classes, color) in TOKEN_COLORS {
        let selectors: Vec<String> = classes
            .iter()
            .map(|class| format!(".{} .{}", scope_class, class))
            .collect();
        let _ = writeln!(
            css,
            "{} {{\n  color: {};\n}}",
            selectors.join(",\n"),
            palette.color(*color)
        );
    }
    css
}
