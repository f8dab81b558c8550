use crate::error::ConfigError;
use crate::flow::FlowRecord;

/// A distance between two flows.
///
/// Implementors must be symmetric and non-negative, and return zero for a flow
/// compared with itself. Single-linkage merging relies on nothing else.
pub trait DistanceMetric {
    fn distance(&self, a: &FlowRecord, b: &FlowRecord) -> f64;
}

/// Per-feature weights of the weighted Euclidean flow distance.
///
/// All weights are finite and non-negative; [`Weights::new`] is the only way to build
/// custom weights, so a `Weights` value is always valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    bytes: f64,
    duration: f64,
    inter_time: f64,
    inter_length: f64,
}

impl Default for Weights {
    /// All features weighted equally.
    fn default() -> Self {
        Weights {
            bytes: 1.0,
            duration: 1.0,
            inter_time: 1.0,
            inter_length: 1.0,
        }
    }
}

impl Weights {
    /// Validates and creates a set of weights.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::NonFiniteWeight`] if a weight is NaN or infinite.
    /// * [`ConfigError::NegativeWeight`] if a weight is below zero.
    pub fn new(
        bytes: f64,
        duration: f64,
        inter_time: f64,
        inter_length: f64,
    ) -> Result<Weights, ConfigError> {
        for (name, value) in [
            ("bytes", bytes),
            ("duration", duration),
            ("inter_time", inter_time),
            ("inter_length", inter_length),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteWeight { name, value });
            }
            if value < 0.0 {
                return Err(ConfigError::NegativeWeight { name, value });
            }
        }
        Ok(Weights {
            bytes,
            duration,
            inter_time,
            inter_length,
        })
    }
}

impl DistanceMetric for Weights {
    /// Weighted Euclidean distance over the four flow features.
    fn distance(&self, a: &FlowRecord, b: &FlowRecord) -> f64 {
        let bytes = a.total_bytes() as f64 - b.total_bytes() as f64;
        let duration = a.duration() as f64 - b.duration() as f64;
        let inter_time = a.avg_inter_time() - b.avg_inter_time();
        let inter_length = a.avg_inter_length() - b.avg_inter_length();

        (self.bytes * bytes * bytes
            + self.duration * duration * duration
            + self.inter_time * inter_time * inter_time
            + self.inter_length * inter_length * inter_length)
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(id: u64, bytes: u64, duration: u64, inter_time: f64, inter_length: f64) -> FlowRecord {
        FlowRecord::new(id, bytes, duration, inter_time, inter_length)
    }

    #[test]
    fn distance_should_be_zero_for_same_flow() {
        let a = flow(1, 100, 10, 5.0, 20.0);
        assert_eq!(Weights::default().distance(&a, &a), 0.0);
    }

    #[test]
    fn distance_should_be_symmetric() {
        let weights = Weights::new(0.5, 2.0, 1.0, 3.0).unwrap();
        let a = flow(1, 100, 10, 5.0, 20.0);
        let b = flow(2, 5000, 500, 50.0, 1.0);
        assert_eq!(weights.distance(&a, &b), weights.distance(&b, &a));
    }

    #[test]
    fn distance_should_apply_weights_per_feature() {
        let a = flow(1, 0, 0, 0.0, 0.0);
        let b = flow(2, 3, 4, 0.0, 0.0);
        assert_eq!(Weights::default().distance(&a, &b), 5.0);

        let bytes_only = Weights::new(1.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(bytes_only.distance(&a, &b), 3.0);

        let zero = Weights::new(0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(zero.distance(&a, &b), 0.0);
    }

    #[test]
    fn distance_should_not_underflow_on_unsigned_features() {
        let a = flow(1, 10, 0, 0.0, 0.0);
        let b = flow(2, 20, 0, 0.0, 0.0);
        assert_eq!(Weights::default().distance(&a, &b), 10.0);
    }

    #[test]
    fn new_should_reject_invalid_weights() {
        assert_eq!(
            Weights::new(1.0, -0.5, 1.0, 1.0),
            Err(ConfigError::NegativeWeight {
                name: "duration",
                value: -0.5
            })
        );
        assert!(matches!(
            Weights::new(1.0, 1.0, f64::NAN, 1.0),
            Err(ConfigError::NonFiniteWeight {
                name: "inter_time",
                ..
            })
        ));
        assert!(matches!(
            Weights::new(1.0, 1.0, 1.0, f64::INFINITY),
            Err(ConfigError::NonFiniteWeight {
                name: "inter_length",
                ..
            })
        ));
    }
}
