use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Face descriptor produced by the sensor layer (128-dimensional for the
/// default deployment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f64>,
}

impl Descriptor {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance between two descriptors.
    ///
    /// Descriptors of different length are never comparable and yield
    /// `f64::INFINITY`.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f64 {
        if self.values.len() != other.values.len() {
            return f64::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// A persisted enrollment sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub descriptor: Descriptor,
    /// Capture order within the enrollment batch, starting at 0.
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
}

/// Result of matching a probe descriptor against a user's templates.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Euclidean distance of the best (closest) template.
    pub distance: f64,
    /// Normalized percentage in [0, 100]; see [`match_score`].
    pub score: f64,
    /// ID of the closest template (if the gallery was non-empty).
    pub template_id: Option<Uuid>,
}

/// Convert a descriptor distance into a percentage against threshold `T`:
/// `max(0, 1 - distance / T) * 100`.
pub fn match_score(distance: f64, threshold: f64) -> f64 {
    if !distance.is_finite() {
        return 0.0;
    }
    if threshold <= 0.0 {
        return if distance == 0.0 { 100.0 } else { 0.0 };
    }
    ((1.0 - distance / threshold) * 100.0).clamp(0.0, 100.0)
}

/// Strategy for comparing a probe descriptor against a gallery of enrolled faces.
pub trait Matcher {
    fn compare(&self, probe: &Descriptor, gallery: &[FaceTemplate], threshold: f64) -> MatchResult;
}

/// Minimum-Euclidean-distance matcher. Every template is visited to find
/// the closest one.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Descriptor, gallery: &[FaceTemplate], threshold: f64) -> MatchResult {
        let mut best_dist = f64::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, template) in gallery.iter().enumerate() {
            let dist = probe.euclidean_distance(&template.descriptor);
            if best_idx.is_none() || dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        MatchResult {
            matched: best_idx.is_some() && best_dist <= threshold,
            distance: best_dist,
            score: match_score(best_dist, threshold),
            template_id: best_idx.map(|idx| gallery[idx].id),
        }
    }
}
