//! Shape checks for enrollment batches and verification probes.

use crate::error::ValidationError;
use crate::types::Descriptor;

/// Floor on the number of samples per enrollment submission.
pub const MIN_ENROLL_SAMPLES: usize = 3;

/// Canonical descriptor length of the default sensor layer (face-api.js).
pub const DEFAULT_DESCRIPTOR_LEN: usize = 128;

/// Deployment-wide descriptor shape and batch size requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentPolicy {
    pub descriptor_len: usize,
    pub min_samples: usize,
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            descriptor_len: DEFAULT_DESCRIPTOR_LEN,
            min_samples: MIN_ENROLL_SAMPLES,
        }
    }
}

impl EnrollmentPolicy {
    /// Build a policy; `min_samples` is raised to [`MIN_ENROLL_SAMPLES`] if lower.
    pub fn new(descriptor_len: usize, min_samples: usize) -> Self {
        Self {
            descriptor_len,
            min_samples: min_samples.max(MIN_ENROLL_SAMPLES),
        }
    }

    /// Validate a whole enrollment batch. Any bad sample rejects the batch.
    pub fn validate_batch(&self, raw: Vec<Vec<f64>>) -> Result<Vec<Descriptor>, ValidationError> {
        if raw.len() < self.min_samples {
            return Err(ValidationError::TooFewSamples {
                got: raw.len(),
                min: self.min_samples,
            });
        }
        raw.into_iter()
            .enumerate()
            .map(|(index, values)| self.check(index, values))
            .collect()
    }

    /// Validate a single verification probe.
    pub fn validate_probe(&self, raw: Vec<f64>) -> Result<Descriptor, ValidationError> {
        self.check(0, raw)
    }

    fn check(&self, index: usize, values: Vec<f64>) -> Result<Descriptor, ValidationError> {
        if values.len() != self.descriptor_len {
            return Err(ValidationError::DescriptorLength {
                index,
                expected: self.descriptor_len,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteDescriptor { index });
        }
        Ok(Descriptor::new(values))
    }
}
