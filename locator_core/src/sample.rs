//! Sample parsing and normalization.
//!
//! Incoming messages arrive either as a structured object (`{"x":..,"y":..,"z":..}`)
//! or as free-form text (`"1.0, 2.0 3.0"`). Both are parsed at this boundary
//! into a single numeric triple, then expressed relative to the session
//! origin and scaled into scene units:
//!
//! ```text
//! scene = (raw - origin) * visual_scale
//! ```

use chrono::{DateTime, Utc};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SampleError;

const AXES: [char; 3] = ['x', 'y', 'z'];

/// A raw coordinate as delivered by the sensor, in sensor units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Arrival time of the message carrying this sample
    pub timestamp: DateTime<Utc>,
}

impl RawSample {
    /// Creates a raw sample.
    pub fn new(x: f64, y: f64, z: f64, timestamp: DateTime<Utc>) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Position as a point.
    pub fn position(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// An origin-relative, scaled coordinate used for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSample {
    pub sx: f64,
    pub sy: f64,
    pub sz: f64,
}

impl SceneSample {
    /// The scene-space origin.
    pub const ORIGIN: SceneSample = SceneSample {
        sx: 0.0,
        sy: 0.0,
        sz: 0.0,
    };

    /// Creates a scene sample.
    pub fn new(sx: f64, sy: f64, sz: f64) -> Self {
        Self { sx, sy, sz }
    }

    /// Position as a point.
    pub fn point(&self) -> Point3<f64> {
        Point3::new(self.sx, self.sy, self.sz)
    }
}

impl From<Point3<f64>> for SceneSample {
    fn from(p: Point3<f64>) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

/// One component of a structured payload before numeric validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// A JSON number
    Number(f64),
    /// A string or other scalar that still has to be parsed
    Text(String),
    /// An array or object where a scalar was expected
    Nested(String),
    /// Key absent or `null`
    Absent,
}

impl Component {
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Component::Absent,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => Component::Number(v),
                None => Component::Text(n.to_string()),
            },
            Some(Value::String(s)) => Component::Text(s.clone()),
            Some(nested @ (Value::Array(_) | Value::Object(_))) => Component::Nested(nested.to_string()),
            Some(other) => Component::Text(other.to_string()),
        }
    }

    fn resolve(&self, axis: char) -> Result<f64, SampleError> {
        let value = match self {
            Component::Number(v) => *v,
            Component::Text(token) => parse_token(axis, token.trim())?,
            Component::Nested(raw) => {
                return Err(SampleError::malformed(format!("component {axis} is not a scalar: {raw}")))
            }
            Component::Absent => return Err(SampleError::Missing { axis }),
        };
        check_finite(axis, value)
    }
}

/// The two shapes a coordinate message can take on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplePayload {
    /// An object with `x`, `y`, `z` fields
    Structured([Component; 3]),
    /// Three numbers separated by commas and/or whitespace
    Text(String),
}

impl SamplePayload {
    /// Builds a structured payload from three numbers.
    pub fn structured(x: f64, y: f64, z: f64) -> Self {
        SamplePayload::Structured([
            Component::Number(x),
            Component::Number(y),
            Component::Number(z),
        ])
    }

    /// Classifies raw message bytes.
    ///
    /// A JSON object carrying an `x` key is structured; anything else,
    /// including JSON that is not such an object, is treated as text.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        Self::from_text(&text)
    }

    /// Classifies a message already decoded as text.
    pub fn from_text(text: &str) -> Self {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
            if map.contains_key("x") {
                return SamplePayload::Structured([
                    Component::from_json(map.get("x")),
                    Component::from_json(map.get("y")),
                    Component::from_json(map.get("z")),
                ]);
            }
        }
        SamplePayload::Text(text.to_string())
    }

    /// Reduces the payload to a finite numeric triple.
    pub fn components(&self) -> Result<[f64; 3], SampleError> {
        match self {
            SamplePayload::Structured(parts) => Ok([
                parts[0].resolve(AXES[0])?,
                parts[1].resolve(AXES[1])?,
                parts[2].resolve(AXES[2])?,
            ]),
            SamplePayload::Text(text) => parse_text(text),
        }
    }

    /// Parses into a raw sample stamped with `timestamp`.
    pub fn to_raw(&self, timestamp: DateTime<Utc>) -> Result<RawSample, SampleError> {
        let [x, y, z] = self.components()?;
        Ok(RawSample::new(x, y, z, timestamp))
    }
}

impl std::fmt::Display for SamplePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplePayload::Text(text) => write!(f, "{text:?}"),
            SamplePayload::Structured(parts) => write!(f, "{parts:?}"),
        }
    }
}

fn parse_text(text: &str) -> Result<[f64; 3], SampleError> {
    let tokens: Vec<&str> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(SampleError::Empty);
    }
    if tokens.len() != 3 {
        return Err(SampleError::WrongArity { found: tokens.len() });
    }

    let mut out = [0.0; 3];
    for (i, token) in tokens.iter().enumerate() {
        out[i] = check_finite(AXES[i], parse_token(AXES[i], token)?)?;
    }
    Ok(out)
}

fn parse_token(axis: char, token: &str) -> Result<f64, SampleError> {
    if token.is_empty() {
        return Err(SampleError::Missing { axis });
    }
    token.parse::<f64>().map_err(|_| SampleError::Unparseable {
        axis,
        token: token.to_string(),
    })
}

fn check_finite(axis: char, value: f64) -> Result<f64, SampleError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SampleError::NonFinite { axis, value })
    }
}

/// Converts raw samples to scene samples against a lazily fixed origin.
///
/// The first sample normalized after construction (or after `reset`)
/// becomes the origin and maps to the scene origin.
#[derive(Debug, Clone)]
pub struct Normalizer {
    origin: Option<RawSample>,
    visual_scale: f64,
}

impl Normalizer {
    /// Creates a normalizer with no origin yet.
    pub fn new(visual_scale: f64) -> Self {
        Self {
            origin: None,
            visual_scale,
        }
    }

    /// The origin in effect, if one has been set.
    pub fn origin(&self) -> Option<&RawSample> {
        self.origin.as_ref()
    }

    pub fn visual_scale(&self) -> f64 {
        self.visual_scale
    }

    /// Maps a raw sample into scene space, fixing the origin on first use.
    pub fn normalize(&mut self, raw: &RawSample) -> SceneSample {
        let origin = *self.origin.get_or_insert(*raw);
        let relative: Vector3<f64> = raw.position() - origin.position();
        SceneSample::from(Point3::from(relative * self.visual_scale))
    }

    /// Forgets the origin; the next sample sets a fresh one.
    pub fn reset(&mut self) {
        self.origin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap()
    }

    #[test]
    fn test_text_payload_with_commas_and_spaces() {
        let payload = SamplePayload::from_text("1, 2, 3");
        assert_eq!(payload, SamplePayload::Text("1, 2, 3".to_string()));
        assert_eq!(payload.components().unwrap(), [1.0, 2.0, 3.0]);

        let payload = SamplePayload::from_text("  -1.5\t2e2 ,,0.25\n");
        assert_eq!(payload.components().unwrap(), [-1.5, 200.0, 0.25]);
    }

    #[test]
    fn test_text_payload_rejects_non_finite() {
        let err = SamplePayload::from_text("NaN,2,3").components().unwrap_err();
        assert!(matches!(err, SampleError::NonFinite { axis: 'x', .. }));

        let err = SamplePayload::from_text("1,inf,3").components().unwrap_err();
        assert!(matches!(err, SampleError::NonFinite { axis: 'y', .. }));
    }

    #[test]
    fn test_text_payload_rejects_bad_shapes() {
        assert_eq!(SamplePayload::from_text("").components(), Err(SampleError::Empty));
        assert_eq!(
            SamplePayload::from_text("1,2").components(),
            Err(SampleError::WrongArity { found: 2 })
        );
        assert_eq!(
            SamplePayload::from_text("1 2 3 4").components(),
            Err(SampleError::WrongArity { found: 4 })
        );
        assert!(matches!(
            SamplePayload::from_text("1,two,3").components(),
            Err(SampleError::Unparseable { axis: 'y', .. })
        ));
    }

    #[test]
    fn test_structured_payload() {
        let payload = SamplePayload::from_text(r#"{"x": 10, "y": "5.5", "z": -2}"#);
        assert!(matches!(payload, SamplePayload::Structured(_)));
        assert_eq!(payload.components().unwrap(), [10.0, 5.5, -2.0]);
    }

    #[test]
    fn test_structured_payload_missing_component() {
        let payload = SamplePayload::from_text(r#"{"x": 1, "y": 2}"#);
        assert_eq!(payload.components(), Err(SampleError::Missing { axis: 'z' }));

        let payload = SamplePayload::from_text(r#"{"x": 1, "y": null, "z": 3}"#);
        assert_eq!(payload.components(), Err(SampleError::Missing { axis: 'y' }));
    }

    #[test]
    fn test_nested_component_is_malformed() {
        let payload = SamplePayload::from_text(r#"{"x": [1, 2], "y": 0, "z": 0}"#);
        assert!(matches!(payload.components(), Err(SampleError::Malformed(_))));
    }

    #[test]
    fn test_json_without_x_is_text() {
        // Not a coordinate object, and not three numbers either
        let payload = SamplePayload::from_text(r#"{"lat": 1}"#);
        assert!(matches!(payload, SamplePayload::Text(_)));
        assert!(payload.components().is_err());

        // A bare JSON array falls through to the text splitter
        let payload = SamplePayload::from_text("[1,2,3]");
        assert!(payload.components().is_err());
    }

    #[test]
    fn test_zero_is_a_valid_reading() {
        let payload = SamplePayload::from_text("0,0,0");
        assert_eq!(payload.components().unwrap(), [0.0, 0.0, 0.0]);
        assert_eq!(SamplePayload::structured(0.0, 0.0, 0.0).components().unwrap(), [0.0; 3]);
    }

    #[test]
    fn test_normalizer_sets_origin_once() {
        let mut normalizer = Normalizer::new(1.0);
        assert!(normalizer.origin().is_none());

        let first = normalizer.normalize(&RawSample::new(10.0, 5.0, 2.0, t0()));
        assert_eq!(first, SceneSample::ORIGIN);
        assert_eq!(normalizer.origin().unwrap().position(), Point3::new(10.0, 5.0, 2.0));

        let second = normalizer.normalize(&RawSample::new(12.0, 5.0, 2.0, t0()));
        assert_eq!(second, SceneSample::new(2.0, 0.0, 0.0));
        assert_eq!(normalizer.origin().unwrap().position(), Point3::new(10.0, 5.0, 2.0));
    }

    #[test]
    fn test_normalizer_applies_scale() {
        let mut normalizer = Normalizer::new(0.5);
        normalizer.normalize(&RawSample::new(1.0, 1.0, 1.0, t0()));
        let scene = normalizer.normalize(&RawSample::new(3.0, -1.0, 1.5, t0()));

        assert_relative_eq!(scene.sx, 1.0);
        assert_relative_eq!(scene.sy, -1.0);
        assert_relative_eq!(scene.sz, 0.25);
    }

    #[test]
    fn test_normalizer_reset() {
        let mut normalizer = Normalizer::new(1.0);
        normalizer.normalize(&RawSample::new(1.0, 2.0, 3.0, t0()));
        normalizer.reset();
        assert!(normalizer.origin().is_none());

        let scene = normalizer.normalize(&RawSample::new(7.0, 7.0, 7.0, t0()));
        assert_eq!(scene, SceneSample::ORIGIN);
        assert_eq!(normalizer.origin().unwrap().x, 7.0);
    }
}
