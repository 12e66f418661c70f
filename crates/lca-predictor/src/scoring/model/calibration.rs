use serde::Deserialize;

use crate::scoring::artifacts::ArtifactError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CalibrationError {
    #[error("calibrated probability is not finite (raw {raw})")]
    NonFinite { raw: f64 },
}

/// Post-hoc probability calibration fitted next to the classifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CalibratorFile")]
pub enum Calibrator {
    /// Platt scaling: `1 / (1 + exp(a * p + b))`.
    Sigmoid { a: f64, b: f64 },
    /// Isotonic step points, `x` non-decreasing.
    Isotonic { x: Vec<f64>, y: Vec<f64> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
enum CalibratorFile {
    Sigmoid { a: f64, b: f64 },
    Isotonic { x: Vec<f64>, y: Vec<f64> },
}

impl TryFrom<CalibratorFile> for Calibrator {
    type Error = ArtifactError;

    fn try_from(file: CalibratorFile) -> Result<Self, Self::Error> {
        match file {
            CalibratorFile::Sigmoid { a, b } => Ok(Calibrator::Sigmoid { a, b }),
            CalibratorFile::Isotonic { x, y } => Calibrator::isotonic(x, y),
        }
    }
}

impl Calibrator {
    pub fn isotonic(x: Vec<f64>, y: Vec<f64>) -> Result<Self, ArtifactError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ArtifactError::Calibrator(format!(
                "isotonic table needs matching non-empty x/y, got {} and {}",
                x.len(),
                y.len()
            )));
        }
        if x.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(ArtifactError::Calibrator(
                "isotonic x values must be non-decreasing".to_string(),
            ));
        }
        Ok(Calibrator::Isotonic { x, y })
    }

    pub fn method(&self) -> &'static str {
        match self {
            Calibrator::Sigmoid { .. } => "sigmoid",
            Calibrator::Isotonic { .. } => "isotonic",
        }
    }

    pub fn apply(&self, raw: f64) -> Result<f64, CalibrationError> {
        let calibrated = match self {
            Calibrator::Sigmoid { a, b } => 1.0 / (1.0 + (a * raw + b).exp()),
            Calibrator::Isotonic { x, y } => interpolate(x, y, raw),
        };

        if calibrated.is_finite() {
            Ok(calibrated.clamp(0.0, 1.0))
        } else {
            Err(CalibrationError::NonFinite { raw })
        }
    }
}

/// Piecewise-linear lookup clamped to the first and last knots.
fn interpolate(x: &[f64], y: &[f64], value: f64) -> f64 {
    let last = x.len() - 1;
    if value <= x[0] {
        return y[0];
    }
    if value >= x[last] {
        return y[last];
    }

    let upper = x.partition_point(|knot| *knot <= value).min(last);
    let lower = upper - 1;
    let span = x[upper] - x[lower];
    if span <= 0.0 {
        return y[upper];
    }
    y[lower] + (value - x[lower]) / span * (y[upper] - y[lower])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn platt_scaling_matches_formula() {
        let calibrator: Calibrator =
            serde_json::from_value(json!({"method": "sigmoid", "a": -4.0, "b": 2.0}))
                .expect("sigmoid calibrator");
        let expected = 1.0 / (1.0 + (-4.0f64 * 0.7 + 2.0).exp());
        assert!((calibrator.apply(0.7).expect("finite") - expected).abs() < 1e-12);
        assert_eq!(calibrator.method(), "sigmoid");
    }

    #[test]
    fn isotonic_interpolates_and_clamps() {
        let calibrator: Calibrator = serde_json::from_value(json!({
            "method": "isotonic",
            "x": [0.1, 0.5, 0.9],
            "y": [0.05, 0.4, 0.95]
        }))
        .expect("isotonic calibrator");

        assert_eq!(calibrator.apply(0.0), Ok(0.05));
        assert_eq!(calibrator.apply(1.0), Ok(0.95));
        assert!((calibrator.apply(0.3).expect("finite") - 0.225).abs() < 1e-12);
        assert_eq!(calibrator.apply(0.5), Ok(0.4));
    }

    #[test]
    fn isotonic_rejects_ragged_tables() {
        let result: Result<Calibrator, _> = serde_json::from_value(json!({
            "method": "isotonic",
            "x": [0.1, 0.5],
            "y": [0.2]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn non_finite_output_is_an_error() {
        let calibrator = Calibrator::Sigmoid {
            a: f64::NAN,
            b: 0.0,
        };
        assert_eq!(
            calibrator.apply(0.4),
            Err(CalibrationError::NonFinite { raw: 0.4 })
        );
    }
}
