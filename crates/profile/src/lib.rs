//! Decode profiles for copylens.
//!
//! Legacy dialects disagree on how signs are represented in display and
//! packed numerics, and capture tools disagree on how raw record bytes are
//! written into a log. A [`DecodeProfile`] pins those conventions down for
//! one source of captured values.

use copylens_jsonc_strip::strip_jsonc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on materialized repetition elements.
pub const DEFAULT_MAX_OCCURS: u32 = 10_000;

/// Largest accepted value for [`DecodeProfile::max_occurs`].
pub const MAX_OCCURS_LIMIT: u32 = 1_000_000;

/// Errors that can occur when loading or validating a decode profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// JSON deserialization failed.
    #[error("invalid profile JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// Conventions used to interpret one family of captured record values.
///
/// # Example
/// ```
/// use copylens_profile::{CaptureEncoding, DecodeProfile, Overpunch, OverpunchPreset};
///
/// let profile = DecodeProfile {
///     id: "batch-trace".into(),
///     overpunch: Overpunch::Preset(OverpunchPreset::MicroFocus),
///     capture_encoding: CaptureEncoding::Hex,
///     ..DecodeProfile::default()
/// };
/// assert_eq!(profile.overpunch.table().lookup(b'p'), Some((0, true)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodeProfile {
    /// Unique profile identifier (e.g., `"zos-batch"`).
    pub id: String,
    /// Profile schema version for forward compatibility (e.g., `"1.0.0"`).
    pub schema_version: String,
    /// Sign overpunch table for signed display numerics.
    #[serde(default)]
    pub overpunch: Overpunch,
    /// Sign nibble rule for packed decimals.
    #[serde(default)]
    pub packed_sign: PackedSignRule,
    /// Upper bound on materialized repetition elements per repeated field.
    #[serde(default = "default_max_occurs")]
    pub max_occurs: u32,
    /// How captured values are written in the log.
    #[serde(default)]
    pub capture_encoding: CaptureEncoding,
}

fn default_max_occurs() -> u32 {
    DEFAULT_MAX_OCCURS
}

impl Default for DecodeProfile {
    fn default() -> Self {
        Self {
            id: "default".into(),
            schema_version: "1.0.0".into(),
            overpunch: Overpunch::default(),
            packed_sign: PackedSignRule::default(),
            max_occurs: DEFAULT_MAX_OCCURS,
            capture_encoding: CaptureEncoding::default(),
        }
    }
}

/// Sign overpunch convention: a named preset or an explicit table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Overpunch {
    /// A well-known dialect.
    Preset(OverpunchPreset),
    /// A custom table.
    Custom(OverpunchTable),
}

impl Default for Overpunch {
    fn default() -> Self {
        Overpunch::Preset(OverpunchPreset::Ibm)
    }
}

impl Overpunch {
    /// The concrete table for this convention.
    pub fn table(&self) -> OverpunchTable {
        match self {
            Overpunch::Preset(OverpunchPreset::Ibm) => OverpunchTable {
                positive: "{ABCDEFGHI".into(),
                negative: "}JKLMNOPQR".into(),
            },
            Overpunch::Preset(OverpunchPreset::MicroFocus) => OverpunchTable {
                positive: "0123456789".into(),
                negative: "pqrstuvwxy".into(),
            },
            Overpunch::Custom(table) => table.clone(),
        }
    }
}

/// Named overpunch dialects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverpunchPreset {
    /// Host zoned decimal as seen through an ASCII translation:
    /// `{ABCDEFGHI` positive, `}JKLMNOPQR` negative.
    Ibm,
    /// ASCII workstation dialect: plain digits positive, `pqrstuvwxy` negative.
    MicroFocus,
}

/// Characters representing digit 0..=9 combined with a sign.
///
/// Index `i` of each string is the character for digit `i`. Plain ASCII
/// digits are always accepted as positive in addition to the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverpunchTable {
    /// Ten characters for digits 0..=9 with a positive sign.
    pub positive: String,
    /// Ten characters for digits 0..=9 with a negative sign.
    pub negative: String,
}

impl OverpunchTable {
    /// Decode one storage byte into `(digit, negative)`.
    ///
    /// Storage bytes map to characters as ISO-8859-1.
    pub fn lookup(&self, byte: u8) -> Option<(u8, bool)> {
        if byte.is_ascii_digit() {
            return Some((byte - b'0', false));
        }
        let ch = char::from(byte);
        if let Some(d) = self.positive.chars().position(|c| c == ch) {
            return Some((d as u8, false));
        }
        self.negative
            .chars()
            .position(|c| c == ch)
            .map(|d| (d as u8, true))
    }

    fn validate(&self, field: &str) -> Result<(), ProfileError> {
        let positive: Vec<char> = self.positive.chars().collect();
        let negative: Vec<char> = self.negative.chars().collect();
        for (name, table) in [("positive", &positive), ("negative", &negative)] {
            if table.len() != 10 {
                return Err(ProfileError::InvalidField {
                    field: format!("{field}.{name}"),
                    reason: format!("must have exactly 10 characters, found {}", table.len()),
                });
            }
            if table.iter().any(|c| u32::from(*c) > 0xFF) {
                return Err(ProfileError::InvalidField {
                    field: format!("{field}.{name}"),
                    reason: "characters must be single-byte (U+0000..=U+00FF)".into(),
                });
            }
            for (i, c) in table.iter().enumerate() {
                if table[..i].contains(c) {
                    return Err(ProfileError::InvalidField {
                        field: format!("{field}.{name}"),
                        reason: format!("character '{c}' appears more than once"),
                    });
                }
            }
        }
        for (i, c) in positive.iter().enumerate() {
            if c.is_ascii_digit() && c.to_digit(10) != Some(i as u32) {
                return Err(ProfileError::InvalidField {
                    field: format!("{field}.positive"),
                    reason: format!("digit '{c}' must sit at index {c}"),
                });
            }
        }
        if let Some(c) = negative.iter().find(|c| c.is_ascii_digit()) {
            return Err(ProfileError::InvalidField {
                field: format!("{field}.negative"),
                reason: format!("digit '{c}' would be read as positive"),
            });
        }
        if let Some(c) = negative.iter().find(|c| positive.contains(c)) {
            return Err(ProfileError::InvalidField {
                field: field.into(),
                reason: format!("character '{c}' appears in both tables"),
            });
        }
        Ok(())
    }
}

/// How the trailing sign nibble of a packed decimal is read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackedSignRule {
    /// `C`, `A`, `E`, `F` positive; `D`, `B` negative.
    #[default]
    Standard,
    /// Any nibble `A`..=`F`: even positive, odd negative.
    Parity,
}

impl PackedSignRule {
    /// Returns `Some(negative)` for a valid sign nibble, `None` otherwise.
    pub fn is_negative(self, nibble: u8) -> Option<bool> {
        match (self, nibble) {
            (PackedSignRule::Standard, 0xA | 0xC | 0xE | 0xF) => Some(false),
            (PackedSignRule::Standard, 0xB | 0xD) => Some(true),
            (PackedSignRule::Parity, 0xA..=0xF) => Some(nibble % 2 == 1),
            _ => None,
        }
    }
}

/// Representation of captured record values in the capture log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEncoding {
    /// One character per storage byte (ISO-8859-1), including packed regions.
    #[default]
    Raw,
    /// Two hex digits per storage byte; whitespace is ignored.
    Hex,
    /// Printable bytes verbatim, other bytes as `<indicator>XX`.
    Escaped {
        /// Escape indicator character (conventionally `_`).
        indicator: char,
    },
}

/// Load and validate a [`DecodeProfile`] from a JSON or JSONC string.
///
/// The `id` and `schema_version` fields are required; everything else
/// defaults. Performs structural validation after deserialization:
/// - `id` and `schema_version` must be non-empty
/// - `max_occurs` must be in range 1..=1 000 000
/// - custom overpunch tables must hold 10 distinct single-byte characters
///   each, must not share characters, and may only contain a digit at its
///   own index in the positive table
/// - an escape indicator must be printable ASCII and not a hex digit
pub fn load_profile_from_str(s: &str) -> Result<DecodeProfile, ProfileError> {
    let profile: DecodeProfile = serde_json::from_str(&strip_jsonc(s))?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Validate a profile built in code. [`load_profile_from_str`] calls this.
pub fn validate_profile(profile: &DecodeProfile) -> Result<(), ProfileError> {
    // -- Required string field validation --
    if profile.id.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "id".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.schema_version.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "schema_version".into(),
            reason: "must not be empty".into(),
        });
    }

    // -- Occurrence cap --
    if profile.max_occurs == 0 {
        return Err(ProfileError::InvalidField {
            field: "max_occurs".into(),
            reason: "must be > 0".into(),
        });
    }
    if profile.max_occurs > MAX_OCCURS_LIMIT {
        return Err(ProfileError::InvalidField {
            field: "max_occurs".into(),
            reason: format!(
                "{} exceeds maximum supported value ({MAX_OCCURS_LIMIT})",
                profile.max_occurs
            ),
        });
    }

    // -- Overpunch table --
    if let Overpunch::Custom(ref table) = profile.overpunch {
        table.validate("overpunch")?;
    }

    // -- Capture encoding --
    if let CaptureEncoding::Escaped { indicator } = profile.capture_encoding {
        if !indicator.is_ascii_graphic() || indicator.is_ascii_hexdigit() {
            return Err(ProfileError::InvalidField {
                field: "capture_encoding.escaped.indicator".into(),
                reason: format!("'{indicator}' must be printable ASCII and not a hex digit"),
            });
        }
    }

    Ok(())
}
