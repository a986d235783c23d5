//! Animation parameter definitions.
//!
//! Parameter *types* come from `parameters.yaml` and are shared across
//! animations; running animations hold only current values. Encoder
//! adjustment steps by `step` per detent and either wraps (hue-like
//! parameters) or saturates at the range ends.

use crate::ParamId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    #[serde(rename = "PERCENT")]
    Percent,
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "ANGLE")]
    Angle,
    #[serde(rename = "FLOAT")]
    Float,
}

/// A parameter value. Integral kinds carry `Int`; `FLOAT` carries
/// `Float`. The untagged serde shape keeps `state.json` values as bare
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ParamValue::Int(v) => v as f64,
            ParamValue::Float(v) => v,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v:.2}"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamError {
    #[error("parameter {param}: value {value} outside [{min}, {max}]")]
    OutOfRange {
        param: ParamId,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("parameter {param}: expected an integral value, got {value}")]
    NotIntegral { param: ParamId, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDef {
    pub id: ParamId,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub wraps: bool,
    pub default: ParamValue,
}

impl ParamDef {
    fn quantize(&self, raw: f64) -> ParamValue {
        match self.kind {
            ParamKind::Float => ParamValue::Float(raw),
            _ => ParamValue::Int(raw.round() as i64),
        }
    }

    /// Step `detents` increments from `current`, wrapping over the range
    /// when `wraps`, saturating otherwise.
    pub fn adjust(&self, current: ParamValue, detents: i32) -> ParamValue {
        let raw = current.as_f64() + f64::from(detents) * self.step;
        let span = self.max - self.min;
        let next = if self.wraps && span > 0.0 {
            // wrap over the half-open range [min, max)
            self.min + (raw - self.min).rem_euclid(span)
        } else {
            raw.clamp(self.min, self.max)
        };
        self.quantize(next)
    }

    /// Validate an externally supplied value (API, state file).
    pub fn validate(&self, value: ParamValue) -> Result<ParamValue, ParamError> {
        let raw = value.as_f64();
        if raw < self.min || raw > self.max {
            return Err(ParamError::OutOfRange {
                param: self.id.clone(),
                value: raw,
                min: self.min,
                max: self.max,
            });
        }
        if !matches!(self.kind, ParamKind::Float) && raw.fract() != 0.0 {
            return Err(ParamError::NotIntegral {
                param: self.id.clone(),
                value: raw,
            });
        }
        Ok(self.quantize(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed() -> ParamDef {
        ParamDef {
            id: ParamId::from("SPEED"),
            kind: ParamKind::Percent,
            min: 1.0,
            max: 100.0,
            step: 5.0,
            wraps: false,
            default: ParamValue::Int(50),
        }
    }

    fn hue() -> ParamDef {
        ParamDef {
            id: ParamId::from("HUE"),
            kind: ParamKind::Angle,
            min: 0.0,
            max: 360.0,
            step: 10.0,
            wraps: true,
            default: ParamValue::Int(0),
        }
    }

    #[test]
    fn saturating_adjust_stops_at_bounds() {
        let def = speed();
        assert_eq!(def.adjust(ParamValue::Int(98), 1), ParamValue::Int(100));
        assert_eq!(def.adjust(ParamValue::Int(100), 1), ParamValue::Int(100));
        assert_eq!(def.adjust(ParamValue::Int(3), -1), ParamValue::Int(1));
    }

    #[test]
    fn wrapping_adjust_folds_over() {
        let def = hue();
        assert_eq!(def.adjust(ParamValue::Int(350), 1), ParamValue::Int(0));
        assert_eq!(def.adjust(ParamValue::Int(0), -1), ParamValue::Int(350));
        assert_eq!(def.adjust(ParamValue::Int(355), 2), ParamValue::Int(15));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let def = speed();
        assert!(def.validate(ParamValue::Int(0)).is_err());
        assert!(def.validate(ParamValue::Int(101)).is_err());
        assert_eq!(
            def.validate(ParamValue::Int(100)),
            Ok(ParamValue::Int(100))
        );
    }

    #[test]
    fn validate_rejects_fractional_for_integral_kinds() {
        let def = speed();
        assert!(def.validate(ParamValue::Float(50.5)).is_err());
        assert_eq!(
            def.validate(ParamValue::Float(50.0)),
            Ok(ParamValue::Int(50))
        );
    }

    #[test]
    fn param_value_serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&ParamValue::Int(7)).unwrap(), "7");
        let back: ParamValue = serde_json::from_str("7").unwrap();
        assert_eq!(back, ParamValue::Int(7));
    }
}
