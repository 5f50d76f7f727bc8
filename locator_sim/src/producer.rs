//! Synthetic coordinate source.
//!
//! Generates an expanding, rising helix sampled every 60 ms:
//!
//! ```text
//! r(t) = min(0.45 * box, 5) * (1 + 0.05 t)
//! x    = r cos(2.2 t)
//! y    = 0.8 t - box / 2 + 1.5
//! z    = r sin(2.2 t)
//! ```
//!
//! Points are shifted by a seeded origin offset so that ingestion has a
//! non-trivial origin to subtract, and optionally jittered by Gaussian
//! sensor noise.

use nalgebra::{Point3, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

/// Interval between generated samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(60);

/// Wire shape a generated sample is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStyle {
    /// `{"x":..,"y":..,"z":..}`
    Json,
    /// `x, y, z`
    Text,
    /// `x y z`
    Whitespace,
}

impl PayloadStyle {
    const ALL: [PayloadStyle; 3] = [PayloadStyle::Json, PayloadStyle::Text, PayloadStyle::Whitespace];

    /// Renders a point. Floats use `Display`, which parses back exactly.
    pub fn render(&self, p: &Point3<f64>) -> String {
        match self {
            PayloadStyle::Json => format!(r#"{{"x":{},"y":{},"z":{}}}"#, p.x, p.y, p.z),
            PayloadStyle::Text => format!("{}, {}, {}", p.x, p.y, p.z),
            PayloadStyle::Whitespace => format!("{} {} {}", p.x, p.y, p.z),
        }
    }
}

/// Deterministic helix generator.
pub struct HelixProducer {
    box_size: f64,
    origin_offset: Vector3<f64>,
    noise: Option<Normal<f64>>,
    rng: ChaCha8Rng,
    /// Elapsed simulated seconds
    t: f64,
    emitted: u64,
}

impl HelixProducer {
    /// Creates a producer; the origin offset is derived from `seed`.
    pub fn new(seed: u64, box_size: f64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let origin_offset = Vector3::new(
            rng.gen_range(-100.0..100.0),
            rng.gen_range(-100.0..100.0),
            rng.gen_range(-100.0..100.0),
        );
        Self {
            box_size,
            origin_offset,
            noise: None,
            rng,
            t: 0.0,
            emitted: 0,
        }
    }

    /// Adds zero-mean Gaussian noise with the given standard deviation.
    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.noise = Normal::new(0.0, std_dev).ok();
        self
    }

    /// Overrides the origin offset.
    pub fn with_origin(mut self, offset: Vector3<f64>) -> Self {
        self.origin_offset = offset;
        self
    }

    pub fn origin_offset(&self) -> Vector3<f64> {
        self.origin_offset
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.t
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Noise-free helix position at time `t`, relative to the offset.
    pub fn helix_at(&self, t: f64) -> Point3<f64> {
        let radius = (self.box_size * 0.45).min(5.0) * (1.0 + 0.05 * t);
        Point3::new(
            radius * (t * 2.2).cos(),
            t * 0.8 - self.box_size / 2.0 + 1.5,
            radius * (t * 2.2).sin(),
        )
    }

    /// Produces the next raw sample and advances one interval.
    pub fn next_point(&mut self) -> Point3<f64> {
        let mut p = self.helix_at(self.t) + self.origin_offset;
        if let Some(noise) = &self.noise {
            p.x += noise.sample(&mut self.rng);
            p.y += noise.sample(&mut self.rng);
            p.z += noise.sample(&mut self.rng);
        }
        self.t += SAMPLE_INTERVAL.as_secs_f64();
        self.emitted += 1;
        p
    }

    /// Picks a wire style for the next payload.
    pub fn pick_style(&mut self) -> PayloadStyle {
        PayloadStyle::ALL[self.rng.gen_range(0..PayloadStyle::ALL.len())]
    }
}
