//! Perceptual volume curve
//!
//! Hardware volume controls are close to linear in amplitude, which makes the
//! lower half of a 0-100 slider almost silent. Clients therefore see a
//! percentage derived from the native value through a power law:
//!
//! - `scale`: `round(((native - min) / (max - min))^n * 100)`
//! - `unscale`: `round((percent / 100)^(1/n) * (max - min) + min)`
//!
//! Rounding happens once at each boundary, so a round trip is approximate.

use crate::domain::mixer::{NativeVolume, ScaledVolume, VolumeRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid curve parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("Curve exponent must be finite and positive, got {0}")]
    InvalidExponent(f64),
}

/// Curve method, selected by configuration only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum CurveMethod {
    /// Power law, `exponent` defaults to 3
    Cube {
        #[serde(default = "default_exponent")]
        exponent: f64,
    },
    /// Straight proportional mapping
    Linear,
}

fn default_exponent() -> f64 {
    VolumeCurve::DEFAULT_EXPONENT
}

impl Default for CurveMethod {
    fn default() -> Self {
        CurveMethod::Cube {
            exponent: VolumeCurve::DEFAULT_EXPONENT,
        }
    }
}

/// Native <-> percentage mapping
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeCurve {
    method: CurveMethod,
}

impl VolumeCurve {
    pub const DEFAULT_EXPONENT: f64 = 3.0;

    /// Power-law curve with the given exponent
    pub fn cube(exponent: f64) -> Result<Self, CurveError> {
        let curve = Self {
            method: CurveMethod::Cube { exponent },
        };
        curve.validate()?;
        Ok(curve)
    }

    pub fn linear() -> Self {
        Self {
            method: CurveMethod::Linear,
        }
    }

    pub fn method(&self) -> CurveMethod {
        self.method
    }

    /// Reject exponents that would make the mapping meaningless
    pub fn validate(&self) -> Result<(), CurveError> {
        match self.method {
            CurveMethod::Cube { exponent } if !(exponent.is_finite() && exponent > 0.0) => {
                Err(CurveError::InvalidExponent(exponent))
            }
            _ => Ok(()),
        }
    }

    /// Native volume to client percentage
    ///
    /// `native` must lie inside `range`; no clamping is applied.
    pub fn scale(&self, native: NativeVolume, range: VolumeRange) -> ScaledVolume {
        debug_assert!(range.contains(native), "native volume {native} outside {range}");

        let normalized = (native - range.min()) as f64 / range.span() as f64;
        let curved = match self.method {
            CurveMethod::Cube { exponent } => normalized.powf(exponent),
            CurveMethod::Linear => normalized,
        };
        let percent = (curved * 100.0).round() as u8;
        ScaledVolume::new(percent).unwrap_or(ScaledVolume::MAX)
    }

    /// Client percentage to native volume
    pub fn unscale(&self, volume: ScaledVolume, range: VolumeRange) -> NativeVolume {
        let normalized = f64::from(volume.percent()) / 100.0;
        let curved = match self.method {
            CurveMethod::Cube { exponent } => normalized.powf(exponent.recip()),
            CurveMethod::Linear => normalized,
        };
        (curved * range.span() as f64 + range.min() as f64).round() as NativeVolume
    }
}
