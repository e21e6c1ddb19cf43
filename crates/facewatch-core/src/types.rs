use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in frame coordinates at the
/// resolution the frame was analyzed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Scale the box from one resolution to another (e.g. inference
    /// size to display size).
    pub fn scaled(&self, sx: f32, sy: f32) -> BoundingBox {
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            confidence: self.confidence,
        }
    }
}

/// The 68-point facial landmark set, in the same coordinate space as
/// the bounding box. Point order follows the iBUG-68 convention
/// (jaw 0-16, brows 17-26, nose 27-35, eyes 36-47, mouth 48-67).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmarks(pub Vec<(f32, f32)>);

impl Landmarks {
    pub const LEFT_EYE: std::ops::Range<usize> = 36..42;
    pub const RIGHT_EYE: std::ops::Range<usize> = 42..48;

    pub fn points(&self) -> &[(f32, f32)] {
        &self.0
    }

    /// Centroid of a point range (used for eye centers during alignment).
    pub fn centroid(&self, range: std::ops::Range<usize>) -> (f32, f32) {
        let pts = &self.0[range];
        let n = pts.len() as f32;
        let (sx, sy) = pts
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }
}

/// Expression labels emitted by the expression classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }
}

/// Per-label confidence scores in [0, 1]. Scores come from independent
/// sigmoid/softmax heads and need not sum to 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expressions {
    scores: [f32; 7],
}

impl Expressions {
    pub fn new(scores: [f32; 7]) -> Self {
        Self { scores }
    }

    pub fn score(&self, label: Expression) -> f32 {
        let idx = Expression::ALL
            .iter()
            .position(|e| *e == label)
            .unwrap_or(0);
        self.scores[idx]
    }

    /// Highest-scoring label and its confidence.
    pub fn top(&self) -> (Expression, f32) {
        let mut best = (Expression::Neutral, f32::NEG_INFINITY);
        for (i, &s) in self.scores.iter().enumerate() {
            if s > best.1 {
                best = (Expression::ALL[i], s);
            }
        }
        best
    }
}

/// A convenience builder used heavily in tests: set individual labels,
/// everything else stays 0.
impl FromIterator<(Expression, f32)> for Expressions {
    fn from_iter<T: IntoIterator<Item = (Expression, f32)>>(iter: T) -> Self {
        let mut out = Expressions::default();
        for (label, score) in iter {
            let idx = Expression::ALL.iter().position(|e| *e == label).unwrap();
            out.scores[idx] = score;
        }
        out
    }
}

/// One face from one inference call: geometry, 68-point landmarks and
/// expression scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub landmarks: Landmarks,
    pub expressions: Expressions,
}

/// All detections from the most recent inference call. Each new set
/// wholesale-replaces the previous one; there is no identity tracking
/// across calls. Array position is only meaningful as the alert
/// stagger index.
pub type DetectionSet = Vec<Detection>;

/// Fixed-length identity embedding, compared by Euclidean distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Single-face result for verification: geometry, landmarks and the
/// identity descriptor.
#[derive(Debug, Clone)]
pub struct FaceWithDescriptor {
    pub bbox: BoundingBox,
    pub landmarks: Landmarks,
    pub descriptor: Descriptor,
}

/// Outcome of one verification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// No comparison has completed yet.
    Unknown,
    Match,
    NoMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Descriptor { values: vec![1.0, 2.0, 3.0] };
        assert!(a.euclidean_distance(&a) < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_unit_apart() {
        let a = Descriptor { values: vec![0.0, 0.0] };
        let b = Descriptor { values: vec![3.0, 4.0] };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_expressions_top() {
        let e: Expressions = [(Expression::Sad, 0.7), (Expression::Happy, 0.2)]
            .into_iter()
            .collect();
        let (label, score) = e.top();
        assert_eq!(label, Expression::Sad);
        assert!((score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_expressions_score_unset_is_zero() {
        let e: Expressions = [(Expression::Happy, 0.9)].into_iter().collect();
        assert_eq!(e.score(Expression::Sad), 0.0);
        assert!((e.score(Expression::Happy) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_scaled() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 30.0, height: 40.0, confidence: 0.9 };
        let s = b.scaled(2.0, 0.5);
        assert_eq!(s.x, 20.0);
        assert_eq!(s.y, 10.0);
        assert_eq!(s.width, 60.0);
        assert_eq!(s.height, 20.0);
        assert_eq!(s.confidence, 0.9);
    }

    #[test]
    fn test_landmarks_centroid() {
        let lm = Landmarks(vec![(0.0, 0.0), (2.0, 0.0), (1.0, 3.0)]);
        let (cx, cy) = lm.centroid(0..3);
        assert!((cx - 1.0).abs() < 1e-6);
        assert!((cy - 1.0).abs() < 1e-6);
    }
}
