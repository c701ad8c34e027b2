// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Plurality-vote resampling for label-like data (segmentation masks, class
//! ids) where averaging would invent values that never occurred.

use crate::element::Label;
use crate::error::{ResampleError, ResampleResult};
use crate::exec::{self, Backend};
use crate::tensor::DenseTensor;
use crate::validate;
use tracing::trace;

/// Resamples `input[B, C, H, W]` into `[B, C, H', W']`.
///
/// `sample_map[H', W', num_candidates]` holds linear indices into the
/// flattened `H * W` plane. Each output takes the value cast by the most
/// candidates; a tie goes to the value that occurs first in the candidate
/// list. Indices outside the plane do not vote, and a location without any
/// valid candidate receives `T::default()`.
pub fn resample<T: Label>(
    input: &DenseTensor<T>,
    sample_map: &DenseTensor<i64>,
    out_hw: (usize, usize),
    num_candidates: usize,
) -> ResampleResult<DenseTensor<T>> {
    let device = validate::colocated(&[
        ("input", input.device()),
        ("sample_map", sample_map.device()),
    ])?;
    let source = validate::contiguous("input", input)?;
    let indices = validate::contiguous("sample_map", sample_map)?;
    let [batch, channels, height, width] = validate::rank::<4>("input", input.shape())?;
    validate::positive("num_candidates", num_candidates)?;
    let (out_height, out_width) = out_hw;
    validate::expect_shape(
        "sample_map",
        sample_map.shape(),
        &[out_height, out_width, num_candidates],
    )?;

    validate::element_count::<T>("out_hw", &[batch, channels, out_height, out_width])?;

    let plane_len = height * width;
    let locations = out_height * out_width;
    let backend = Backend::for_device(device);
    trace!(%backend, batch, channels, locations, num_candidates, "voting resample");

    let mut output = DenseTensor::zeros_on(&[batch, channels, out_height, out_width], device);
    let out = output
        .as_slice_mut()
        .ok_or(ResampleError::NonContiguous { label: "output" })?;
    exec::gather(backend, out, |index| {
        let plane = index / locations;
        let location = index % locations;
        let src = &source[plane * plane_len..(plane + 1) * plane_len];
        let base = location * num_candidates;
        plurality(src, &indices[base..base + num_candidates])
    })?;
    Ok(output)
}

fn lookup<T: Label>(plane: &[T], index: i64) -> Option<T> {
    usize::try_from(index)
        .ok()
        .and_then(|index| plane.get(index).copied())
}

/// Most frequent value among the valid candidates, earliest first occurrence
/// winning ties.
fn plurality<T: Label>(plane: &[T], candidates: &[i64]) -> T {
    let mut best: Option<(T, usize)> = None;
    for (position, &index) in candidates.iter().enumerate() {
        let Some(value) = lookup(plane, index) else {
            continue;
        };
        // Only the first occurrence of a value needs counting.
        if candidates[..position]
            .iter()
            .any(|&earlier| lookup(plane, earlier) == Some(value))
        {
            continue;
        }
        let votes = candidates[position..]
            .iter()
            .filter(|&&other| lookup(plane, other) == Some(value))
            .count();
        if best.map_or(true, |(_, most)| votes > most) {
            best = Some((value, votes));
        }
    }
    best.map(|(value, _)| value).unwrap_or_default()
}
