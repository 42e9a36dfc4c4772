use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Character data with trailing padding removed.
    Text(String),
    /// A numeric with no implied decimal places.
    Integer(i128),
    /// A numeric with implied decimal places.
    Decimal(Decimal),
    /// The bytes could not be decoded.
    Unknown(Unknown),
}

impl Value {
    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer value.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Any numeric value as a decimal (integers at scale 0).
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(n) => Some(Decimal::new(*n, 0)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether decoding failed for this field.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// Unknown details, if decoding failed.
    pub fn as_unknown(&self) -> Option<&Unknown> {
        match self {
            Value::Unknown(u) => Some(u),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Unknown(u) => write!(f, "<unknown: {}>", u.reason),
        }
    }
}

/// Exact fixed-point number: `unscaled × 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    /// Digits with the decimal point removed.
    pub unscaled: i128,
    /// Digits right of the decimal point.
    pub scale: u32,
}

impl Decimal {
    /// `unscaled × 10^-scale`.
    pub fn new(unscaled: i128, scale: u32) -> Self {
        Self { unscaled, scale }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.unsigned_abs().to_string();
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

impl Serialize for Decimal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where an [`Unknown`] value's explanation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSource {
    /// [`crate::ResolvedLayout::diagnostics`].
    Layout,
    /// [`crate::DecodeResult::diagnostics`].
    Decode,
}

/// Reference to the diagnostic that explains an unknown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosticRef {
    /// Which diagnostic list.
    pub source: DiagnosticSource,
    /// Index into that list.
    pub index: usize,
}

/// A value that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unknown {
    /// Reason code of the explaining diagnostic.
    pub reason: Cow<'static, str>,
    /// The explaining diagnostic.
    pub diagnostic: DiagnosticRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_display() {
        assert_eq!(Decimal::new(12345, 2).to_string(), "123.45");
        assert_eq!(Decimal::new(-5, 3).to_string(), "-0.005");
        assert_eq!(Decimal::new(0, 2).to_string(), "0.00");
        assert_eq!(Decimal::new(-120, 0).to_string(), "-120");
        assert_eq!(
            Decimal::new(i128::MIN, 1).to_string(),
            "-17014118346046923173168730371588410572.8"
        );
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::Text("A".into()).as_text(), Some("A"));
        assert_eq!(Value::Integer(7).as_decimal(), Some(Decimal::new(7, 0)));
        assert_eq!(Value::Integer(7).as_text(), None);
        let unknown = Value::Unknown(Unknown {
            reason: Cow::Borrowed("invalid-packed"),
            diagnostic: DiagnosticRef {
                source: DiagnosticSource::Decode,
                index: 0,
            },
        });
        assert!(unknown.is_unknown());
        assert_eq!(unknown.to_string(), "<unknown: invalid-packed>");
    }

    #[test]
    fn values_serialize_tagged() {
        let json = serde_json::to_string(&Value::Decimal(Decimal::new(-150, 2))).unwrap();
        assert_eq!(json, r#"{"type":"decimal","value":"-1.50"}"#);
        let json = serde_json::to_string(&Value::Integer(12345)).unwrap();
        assert_eq!(json, r#"{"type":"integer","value":12345}"#);
    }
}
