//! Per-field display directives.
//!
//! A directive is a comma separated list starting with the column name:
//!
//! ```text
//! name[,width:<n>][,fixed][,hide][,ellipsis:start|end|none][,align:left|right]
//! ```
//!
//! `width:<n>` pins the column to `n` characters. `fixed` without a width
//! pins it to [`DEFAULT_WIDTH`]. Without either the column grows to fit the
//! batch being rendered.

use super::{Align, Ellipsis, Width};

/// Width used by `fixed` columns that do not carry an explicit `width:<n>`.
pub const DEFAULT_WIDTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub width: Option<usize>,
    pub fixed: bool,
    pub hide: bool,
    pub ellipsis: Ellipsis,
    pub align: Align,
}

impl Directive {
    /// Parse a directive. The error string explains what is wrong with it.
    pub fn parse(directive: &str) -> Result<Self, String> {
        let mut parts = directive.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default();
        validate_name(name)?;

        let mut parsed = Directive {
            name: name.to_string(),
            width: None,
            fixed: false,
            hide: false,
            ellipsis: Ellipsis::default(),
            align: Align::default(),
        };

        for part in parts {
            let (key, value) = match part.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (part, None),
            };
            match (key, value) {
                ("width", Some(value)) => {
                    let width: usize = value
                        .parse()
                        .map_err(|_| format!("width '{value}' is not a number"))?;
                    if width == 0 {
                        return Err("width must be greater than zero".to_string());
                    }
                    parsed.width = Some(width);
                }
                ("fixed", None) => parsed.fixed = true,
                ("hide", None) => parsed.hide = true,
                ("ellipsis", Some(value)) => {
                    parsed.ellipsis = match value {
                        "start" => Ellipsis::Start,
                        "end" => Ellipsis::End,
                        "none" => Ellipsis::None,
                        _ => return Err(format!("unknown ellipsis side '{value}'")),
                    };
                }
                ("align", Some(value)) => {
                    parsed.align = match value {
                        "left" => Align::Left,
                        "right" => Align::Right,
                        _ => return Err(format!("unknown alignment '{value}'")),
                    };
                }
                ("width" | "ellipsis" | "align", None) => {
                    return Err(format!("'{key}' requires a value"));
                }
                ("fixed" | "hide", Some(_)) => {
                    return Err(format!("'{key}' does not take a value"));
                }
                ("", _) => return Err("empty option".to_string()),
                _ => return Err(format!("unknown option '{key}'")),
            }
        }

        Ok(parsed)
    }

    pub fn width(&self) -> Width {
        match (self.width, self.fixed) {
            (Some(width), _) => Width::Fixed(width),
            (None, true) => Width::Fixed(DEFAULT_WIDTH),
            (None, false) => Width::Auto,
        }
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("missing column name".to_string());
    }
    if name.chars().any(char::is_whitespace) {
        return Err(format!("column name '{name}' contains whitespace"));
    }
    // Names double as sort tokens, so they cannot start with a direction marker.
    if name.starts_with(['-', '+']) {
        return Err(format!("column name '{name}' starts with '-' or '+'"));
    }
    if name.contains(':') {
        return Err(format!("column name '{name}' contains ':'"));
    }
    Ok(())
}
