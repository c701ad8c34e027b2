// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Per-pixel sampling primitives and their adjoints.
//!
//! Coordinates are `(x, y)` in source pixel units with pixel centres at
//! integer positions: `x` indexes columns, `y` indexes rows. Every sampler is
//! expressed as a list of in-bounds `(flat index, weight)` taps so that the
//! gather and the scatter-add walk exactly the same cells with exactly the
//! same weights. Taps falling outside the plane are dropped without
//! renormalising the remaining weights, which is zero padding rather than
//! edge clamping.

use crate::element::Element;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling policy used to read a plane at a fractional coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Nearest cell, ties rounded toward the lower index.
    Nearest,
    /// Area-weighted blend of the four bracketing cells.
    Bilinear,
}

impl Interpolation {
    fn label(self) -> &'static str {
        match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            other => Err(format!("unknown interpolation '{other}'")),
        }
    }
}

/// One source cell touched by a sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tap<T> {
    /// Row-major index into the sampled plane.
    pub index: usize,
    pub weight: T,
}

/// Up to four in-bounds taps, in top-left, top-right, bottom-left,
/// bottom-right order.
#[derive(Clone, Copy, Debug)]
pub struct Taps<T> {
    taps: [Tap<T>; 4],
    len: usize,
}

impl<T: Element> Taps<T> {
    fn empty() -> Self {
        Self {
            taps: [Tap {
                index: 0,
                weight: T::zero(),
            }; 4],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, index: usize, weight: T) {
        self.taps[self.len] = Tap { index, weight };
        self.len += 1;
    }

    pub fn as_slice(&self) -> &[Tap<T>] {
        &self.taps[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of the weights of the in-bounds taps.
    pub fn weight_sum(&self) -> T {
        self.as_slice()
            .iter()
            .fold(T::zero(), |acc, tap| acc + tap.weight)
    }
}

/// Bilinear area weights for fractional offsets `dx`, `dy` in `[0, 1)`,
/// ordered top-left, top-right, bottom-left, bottom-right.
#[inline]
pub fn bilinear_weights<T: Element>(dx: T, dy: T) -> [T; 4] {
    let one = T::one();
    [
        (one - dx) * (one - dy),
        dx * (one - dy),
        (one - dx) * dy,
        dx * dy,
    ]
}

/// Rounds to the nearest integer, resolving exact halves toward the floor.
#[inline]
pub fn round_half_down<T: Element>(coord: T) -> T {
    (coord - T::lit(0.5)).ceil()
}

#[inline]
fn cell<T: Element>(coord: T, extent: usize) -> Option<usize> {
    coord.to_usize().filter(|&index| index < extent)
}

/// Resolves the in-bounds taps of a sample at `(x, y)` on a
/// `height × width` plane. Non-finite coordinates yield no taps.
pub fn taps<T: Element>(
    x: T,
    y: T,
    height: usize,
    width: usize,
    policy: Interpolation,
) -> Taps<T> {
    let mut taps = Taps::empty();
    if !x.is_finite() || !y.is_finite() {
        return taps;
    }
    match policy {
        Interpolation::Nearest => {
            if let (Some(col), Some(row)) = (
                cell(round_half_down(x), width),
                cell(round_half_down(y), height),
            ) {
                taps.push(row * width + col, T::one());
            }
        }
        Interpolation::Bilinear => {
            let x0 = x.floor();
            let y0 = y.floor();
            let weights = bilinear_weights(x - x0, y - y0);
            let one = T::one();
            let corners = [(x0, y0), (x0 + one, y0), (x0, y0 + one), (x0 + one, y0 + one)];
            for ((cx, cy), weight) in corners.into_iter().zip(weights) {
                if let (Some(col), Some(row)) = (cell(cx, width), cell(cy, height)) {
                    taps.push(row * width + col, weight);
                }
            }
        }
    }
    taps
}

/// Reads `plane` (row-major, `height × width`) at `(x, y)`.
#[inline]
pub fn sample<T: Element>(
    plane: &[T],
    height: usize,
    width: usize,
    x: T,
    y: T,
    policy: Interpolation,
) -> T {
    debug_assert_eq!(plane.len(), height * width);
    taps(x, y, height, width, policy)
        .as_slice()
        .iter()
        .fold(T::zero(), |acc, tap| acc + tap.weight * plane[tap.index])
}

/// Adjoint of [`sample`]: hands `weight * value` for every tap to `sink`.
#[inline]
pub fn scatter<T: Element>(
    height: usize,
    width: usize,
    x: T,
    y: T,
    policy: Interpolation,
    value: T,
    mut sink: impl FnMut(usize, T),
) {
    for tap in taps(x, y, height, width, policy).as_slice() {
        sink(tap.index, tap.weight * value);
    }
}
