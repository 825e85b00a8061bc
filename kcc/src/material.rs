//! Surface materials and the glide response curve.

use serde::{Deserialize, Serialize};

/// How two coefficients are merged when a body touches a surface.
///
/// When the two sides disagree, the rule that comes later in this list wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombineRule {
    /// `(a + b) / 2`
    #[default]
    Average = 1,
    /// `sqrt(a * b)`
    GeometricMean = 2,
    /// `min(a, b)`
    Min = 3,
    /// `a * b`
    Multiply = 4,
    /// `max(a, b)`
    Max = 5,
}

impl CombineRule {
    pub fn mix(&self, a: f32, b: f32) -> f32 {
        match self {
            CombineRule::Average => (a + b) * 0.5,
            CombineRule::GeometricMean => (a * b).sqrt(),
            CombineRule::Min => a.min(b),
            CombineRule::Multiply => a * b,
            CombineRule::Max => a.max(b),
        }
    }
}

/// Friction and bounciness of a body or collider surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceMaterial {
    /// 0 lets walls be glided along freely, 1 stops all gliding.
    pub friction: f32,
    /// Fraction of the incoming speed reflected back on a horizontal hit.
    pub bounciness: f32,
    pub friction_combine: CombineRule,
    pub bounce_combine: CombineRule,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self::FRICTIONLESS
    }
}

impl SurfaceMaterial {
    pub const FRICTIONLESS: Self = Self {
        friction: 0.0,
        bounciness: 0.0,
        friction_combine: CombineRule::Average,
        bounce_combine: CombineRule::Average,
    };

    pub fn new(friction: f32, bounciness: f32) -> Self {
        Self {
            friction,
            bounciness,
            ..Self::FRICTIONLESS
        }
    }

    pub fn with_combine(mut self, friction: CombineRule, bounce: CombineRule) -> Self {
        self.friction_combine = friction;
        self.bounce_combine = bounce;
        self
    }

    /// Combined friction in `[0, 1]`.
    pub fn combined_friction(&self, other: &SurfaceMaterial) -> f32 {
        let rule = self.friction_combine.max(other.friction_combine);
        rule.mix(self.friction, other.friction).clamp(0.0, 1.0)
    }

    /// Combined bounciness, never negative.
    pub fn combined_bounciness(&self, other: &SurfaceMaterial) -> f32 {
        let rule = self.bounce_combine.max(other.bounce_combine);
        rule.mix(self.bounciness, other.bounciness).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub x: f32,
    pub y: f32,
}

/// Piecewise-linear response curve, clamped at both ends.
///
/// Used to map the angle between the heading and a wall (degrees, 0 = head-on) to the share
/// of the blocked motion that glides along the wall.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseCurve {
    keys: Vec<CurveKey>,
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::linear(0.0, 0.0, 90.0, 1.0)
    }
}

impl ResponseCurve {
    /// Builds a curve from keys in any order.
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.retain(|k| k.x.is_finite() && k.y.is_finite());
        keys.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { keys }
    }

    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new(vec![CurveKey { x: x0, y: y0 }, CurveKey { x: x1, y: y1 }])
    }

    /// Curve returning `y` everywhere.
    pub fn constant(y: f32) -> Self {
        Self::new(vec![CurveKey { x: 0.0, y }])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluates the curve; an empty curve evaluates to 0.
    pub fn evaluate(&self, x: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if x <= b.x {
                let span = b.x - a.x;
                if span <= f32::EPSILON {
                    return b.y;
                }
                let t = (x - a.x) / span;
                return a.y + (b.y - a.y) * t;
            }
        }
        last.y
    }
}
