//! Attraction point samplers
//!
//! Every sampler is an infinite, seeded `Iterator<Item = Vec3>` that owns its
//! state. Restarting a sequence means constructing a new sampler with the same
//! seed. A sampler may end early (`None`) only when its rejection loop gives up.

use std::f32::consts::{PI, TAU};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::types::Vec3;
use crate::core::{Error, Result};
use crate::procgen::params::CrownParams;

/// Rejected candidates tolerated before a rejection sampler ends its sequence
pub const MAX_REJECTIONS: u32 = 10_000;

/// Draws before the low-yield fallback of [`HaltonSampler`] may kick in
pub const LOW_YIELD_WINDOW: u64 = 200;

/// Acceptance ratio below which the low-yield fallback accepts any candidate
pub const LOW_YIELD_RATIO: f64 = 0.01;

/// Ellipsoid sampler with surface and top bias
///
/// Points are drawn in spherical coordinates; `surface_bias > 1` moves them
/// toward the shell and `top_bias > 1` toward the upper half.
pub struct EllipsoidSampler {
    rxy: f32,
    rz: f32,
    center: Vec3,
    surface_bias: f32,
    top_bias: f32,
    rng: ChaCha8Rng,
}

impl EllipsoidSampler {
    pub fn new(rxy: f32, rz: f32, center: Vec3, surface_bias: f32, top_bias: f32, seed: u64) -> Result<Self> {
        if !(rxy > 0.0 && rz > 0.0) {
            return Err(Error::invalid(format!("ellipsoid radii must be positive, got {rxy} x {rz}")));
        }
        if !(surface_bias > 0.0 && top_bias > 0.0) {
            return Err(Error::invalid("ellipsoid biases must be positive"));
        }
        Ok(Self {
            rxy,
            rz,
            center,
            surface_bias,
            top_bias,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Crown ellipsoid resting `offset` above the root
    pub fn from_crown(crown: &CrownParams, seed: u64) -> Result<Self> {
        Self::new(
            crown.size * crown.shape,
            crown.size,
            Vec3::new(0.0, 0.0, crown.size + crown.offset),
            crown.surface_bias,
            crown.top_bias,
            seed,
        )
    }
}

impl Iterator for EllipsoidSampler {
    type Item = Vec3;

    fn next(&mut self) -> Option<Vec3> {
        let phi = TAU * self.rng.gen_range(0.0f32..1.0);
        let theta = PI * (self.rng.gen_range(0.0f32..1.0) - 0.5);
        let r = self.rng.gen_range(0.0f32..1.0).powf((1.0 / self.surface_bias) / 2.0);
        let x = r * self.rxy * theta.cos() * phi.cos();
        let y = r * self.rxy * theta.cos() * phi.sin();
        let st = ((theta.sin() + 1.0) / 2.0).powf(1.0 / self.top_bias) * 2.0 - 1.0;
        let z = r * self.rz * st;
        Some(self.center + Vec3::new(x, y, z))
    }
}

/// Rejection sampler inside an ellipsoid, optionally tapered along z
///
/// With `taper == 0` and equal radii the points are uniform in a ball.
pub struct TaperedEllipsoidSampler {
    r: f32,
    rz: f32,
    center: Vec3,
    taper: f32,
    rng: ChaCha8Rng,
}

impl TaperedEllipsoidSampler {
    pub fn new(r: f32, rz: f32, center: Vec3, taper: f32, seed: u64) -> Result<Self> {
        if !(r > 0.0 && rz > 0.0 && r.is_finite() && rz.is_finite()) {
            return Err(Error::invalid(format!("ellipsoid radii must be positive, got {r} x {rz}")));
        }
        if !taper.is_finite() {
            return Err(Error::invalid("taper must be finite"));
        }
        Ok(Self {
            r,
            rz,
            center,
            taper,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Uniform points inside a ball
    pub fn ball(center: Vec3, radius: f32, seed: u64) -> Result<Self> {
        Self::new(radius, radius, center, 0.0, seed)
    }
}

impl Iterator for TaperedEllipsoidSampler {
    type Item = Vec3;

    fn next(&mut self) -> Option<Vec3> {
        let r2 = self.r * self.r;
        let z2 = self.rz * self.rz;
        let extent = self.r.max(self.rz);
        for _ in 0..MAX_REJECTIONS {
            let x = (self.rng.gen_range(0.0f32..1.0) * 2.0 - 1.0) * extent;
            let y = (self.rng.gen_range(0.0f32..1.0) * 2.0 - 1.0) * extent;
            let z = (self.rng.gen_range(0.0f32..1.0) * 2.0 - 1.0) * extent;
            let f = (z + extent) / (2.0 * extent);
            let f = if self.taper >= 0.0 {
                1.0 + f * self.taper
            } else {
                (1.0 - f) * -self.taper
            };
            if f * x * x / r2 + f * y * y / r2 + z * z / z2 <= 1.0 {
                return Some(self.center + Vec3::new(x, y, z));
            }
        }
        None
    }
}

/// Radical inverse of `index` in `base`
fn halton(mut index: u64, base: u64) -> f64 {
    let mut result = 0.0;
    let mut f = 1.0 / base as f64;
    while index > 0 {
        result += f * (index % base) as f64;
        index /= base;
        f /= base as f64;
    }
    result
}

/// Quasi-random point in the unit cube from Halton sequences in bases 2, 3 and 5
pub fn halton3d(index: u64) -> Vec3 {
    Vec3::new(
        halton(index, 2) as f32,
        halton(index, 3) as f32,
        halton(index, 5) as f32,
    )
}

/// Membership test used to screen candidates
pub type Predicate<'a> = Box<dyn Fn(Vec3) -> bool + 'a>;

/// Quasi-random points in a box, screened by crown and shadow volumes
///
/// Candidates must lie inside the crown volume; inside the shadow volume they
/// survive only with probability `1 - shadow_density`. When fewer than 1% of
/// the first 200+ draws pass the screen, candidates are accepted regardless so
/// a shadow that covers the crown cannot stall growth.
pub struct HaltonSampler<'a> {
    origin: Vec3,
    size: Vec3,
    index: u64,
    crown: Option<Predicate<'a>>,
    shadow: Option<Predicate<'a>>,
    shadow_density: f32,
    drawn: u64,
    accepted: u64,
    rng: ChaCha8Rng,
}

impl<'a> HaltonSampler<'a> {
    /// Sample the box `[origin, origin + size]` without any screening
    pub fn new(origin: Vec3, size: Vec3, seed: u64) -> Self {
        Self {
            origin,
            size,
            index: 100u64.wrapping_add(seed),
            crown: None,
            shadow: None,
            shadow_density: 0.5,
            drawn: 0,
            accepted: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Keep only candidates inside the crown volume
    pub fn with_crown(mut self, inside: impl Fn(Vec3) -> bool + 'a) -> Self {
        self.crown = Some(Box::new(inside));
        self
    }

    /// Thin out candidates inside the shadow volume
    pub fn with_shadow(mut self, inside: impl Fn(Vec3) -> bool + 'a, density: f32) -> Self {
        self.shadow = Some(Box::new(inside));
        self.shadow_density = density.clamp(0.0, 1.0);
        self
    }

    /// Candidates generated so far
    pub fn drawn(&self) -> u64 {
        self.drawn
    }

    /// Candidates returned so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    fn low_yield(&self) -> bool {
        self.drawn > LOW_YIELD_WINDOW && (self.accepted as f64 / self.drawn as f64) < LOW_YIELD_RATIO
    }
}

impl Iterator for HaltonSampler<'_> {
    type Item = Vec3;

    fn next(&mut self) -> Option<Vec3> {
        loop {
            self.drawn += 1;
            let v = self.origin + halton3d(self.index) * self.size;
            self.index = self.index.wrapping_add(1);

            let inside_crown = self.crown.as_ref().map_or(true, |inside| inside(v));
            let outside_shadow = match &self.shadow {
                None => true,
                Some(inside) => !inside(v) || self.rng.gen_range(0.0f32..1.0) > self.shadow_density,
            };

            if (inside_crown && outside_shadow) || self.low_yield() {
                self.accepted += 1;
                return Some(v);
            }
        }
    }
}
