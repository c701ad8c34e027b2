// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Weighted average pooling over precomputed, possibly irregular, sampling
//! kernels.
//!
//! For every output location `(i, j)` the sample map `[H', W', K, 2]` lists
//! the `K` fractional `(x, y)` source positions of its kernel and the weight
//! map `[H', W', K]` the contribution of each. The pooled value is
//! `Σ_k weight[k] * interp(input, sample_map[k])`; weights are used as given.
//! Irregular spherical grids use a flattened `[B, C, 1, N]` layout with
//! `y = 0` coordinates.

use crate::element::Element;
use crate::error::{ResampleError, ResampleResult};
use crate::exec::{self, Backend};
use crate::interp::{self, Interpolation};
use crate::tensor::{DenseTensor, Device};
use crate::validate;
use tracing::trace;

/// Validated view of a sample map and its weight map.
struct KernelMaps<'a, T> {
    coords: &'a [T],
    weights: &'a [T],
    out_height: usize,
    out_width: usize,
    kernel_size: usize,
}

impl<'a, T: Element> KernelMaps<'a, T> {
    fn new(
        sample_map: &'a DenseTensor<T>,
        weight_map: &'a DenseTensor<T>,
        kernel_size: usize,
    ) -> ResampleResult<Self> {
        let coords = validate::contiguous("sample_map", sample_map)?;
        let weights = validate::contiguous("weight_map", weight_map)?;
        validate::positive("kernel_size", kernel_size)?;
        let [out_height, out_width, _, _] = validate::rank::<4>("sample_map", sample_map.shape())?;
        validate::expect_shape(
            "sample_map",
            sample_map.shape(),
            &[out_height, out_width, kernel_size, 2],
        )?;
        validate::expect_shape(
            "weight_map",
            weight_map.shape(),
            &[out_height, out_width, kernel_size],
        )?;
        Ok(Self {
            coords,
            weights,
            out_height,
            out_width,
            kernel_size,
        })
    }

    fn locations(&self) -> usize {
        self.out_height * self.out_width
    }

    /// Visits the non-zero-weight taps of output `location` as `(x, y, weight)`.
    #[inline]
    fn for_each_sample(&self, location: usize, mut f: impl FnMut(T, T, T)) {
        let base = location * self.kernel_size;
        for k in base..base + self.kernel_size {
            let weight = self.weights[k];
            if weight == T::zero() {
                continue;
            }
            f(self.coords[2 * k], self.coords[2 * k + 1], weight);
        }
    }
}

/// Pools `input[B, C, H, W]` into `[B, C, H', W']`.
pub fn forward<T: Element>(
    input: &DenseTensor<T>,
    sample_map: &DenseTensor<T>,
    weight_map: &DenseTensor<T>,
    kernel_size: usize,
    policy: Interpolation,
) -> ResampleResult<DenseTensor<T>> {
    let device = colocated(input, "input", sample_map, weight_map)?;
    let source = validate::contiguous("input", input)?;
    let maps = KernelMaps::new(sample_map, weight_map, kernel_size)?;
    let [batch, channels, height, width] = validate::rank::<4>("input", input.shape())?;

    validate::element_count::<T>("output", &[batch, channels, maps.out_height, maps.out_width])?;

    let locations = maps.locations();
    let src_plane = height * width;
    let backend = Backend::for_device(device);
    trace!(%backend, batch, channels, locations, kernel_size, "weighted pool forward");

    let mut output =
        DenseTensor::zeros_on(&[batch, channels, maps.out_height, maps.out_width], device);
    let out = output
        .as_slice_mut()
        .ok_or(ResampleError::NonContiguous { label: "output" })?;
    exec::gather(backend, out, |index| {
        let plane = index / locations;
        let src = &source[plane * src_plane..(plane + 1) * src_plane];
        let mut acc = T::zero();
        maps.for_each_sample(index % locations, |x, y, weight| {
            acc = acc + weight * interp::sample(src, height, width, x, y, policy);
        });
        acc
    })?;
    Ok(output)
}

/// Adjoint of [`forward`]: distributes `grad_out[B, C, H', W']` over the
/// kernel taps into a zero-initialised `[B, C, H, W]` gradient, where
/// `input_hw = (H, W)` is the size of the pooled input.
pub fn backward<T: Element>(
    grad_out: &DenseTensor<T>,
    sample_map: &DenseTensor<T>,
    weight_map: &DenseTensor<T>,
    input_hw: (usize, usize),
    kernel_size: usize,
    policy: Interpolation,
) -> ResampleResult<DenseTensor<T>> {
    let device = colocated(grad_out, "grad_out", sample_map, weight_map)?;
    let grads = validate::contiguous("grad_out", grad_out)?;
    let maps = KernelMaps::new(sample_map, weight_map, kernel_size)?;
    let [batch, channels, _, _] = validate::rank::<4>("grad_out", grad_out.shape())?;
    validate::expect_shape(
        "grad_out",
        grad_out.shape(),
        &[batch, channels, maps.out_height, maps.out_width],
    )?;
    let (height, width) = input_hw;
    validate::positive("input_height", height)?;
    validate::positive("input_width", width)?;
    validate::element_count::<T>("input_hw", &[batch, channels, height, width])?;

    let locations = maps.locations();
    let backend = Backend::for_device(device);
    trace!(%backend, batch, channels, locations, kernel_size, "weighted pool backward");

    let mut grad_input = DenseTensor::zeros_on(&[batch, channels, height, width], device);
    let out = grad_input
        .as_slice_mut()
        .ok_or(ResampleError::NonContiguous { label: "grad_input" })?;
    exec::scatter(backend, out, height * width, locations, |plane, location, sink| {
        let upstream = grads[plane * locations + location];
        maps.for_each_sample(location, |x, y, weight| {
            interp::scatter(height, width, x, y, policy, weight * upstream, |index, value| {
                sink(index, value)
            });
        });
    })?;
    Ok(grad_input)
}

fn colocated<T: Element>(
    data: &DenseTensor<T>,
    label: &'static str,
    sample_map: &DenseTensor<T>,
    weight_map: &DenseTensor<T>,
) -> ResampleResult<Device> {
    validate::colocated(&[
        (label, data.device()),
        ("sample_map", sample_map.device()),
        ("weight_map", weight_map.device()),
    ])
}
