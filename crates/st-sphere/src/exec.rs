// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Schedulers driving the per-location kernels.
//!
//! Operators describe their work as a pure function of one output location
//! (gather) or of one source location emitting weighted contributions
//! (scatter). The two backends below only differ in how those functions are
//! iterated and in how scatter contributions are accumulated.

use crate::element::Element;
use crate::error::{ResampleError, ResampleResult};
use crate::tensor::Device;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use spiral_config::execution;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Loop execution strategy derived from the placement of the arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Strict nested-loop order on the calling thread.
    Sequential,
    /// One logical task per output element on the rayon pool.
    Parallel,
}

impl Backend {
    pub fn for_device(device: Device) -> Self {
        match device {
            Device::Cpu => Backend::Sequential,
            Device::Parallel => Backend::Parallel,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Backend::Sequential => "sequential",
            Backend::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

static POOL: OnceLock<Result<Option<ThreadPool>, String>> = OnceLock::new();

/// Runs `op` inside the configured rayon pool, or on the global pool when no
/// thread count is configured.
fn install<R, F>(op: F) -> ResampleResult<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    let pool = POOL.get_or_init(|| match execution::parallel_threads() {
        Some(threads) => {
            debug!(threads, "building dedicated resample pool");
            ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|index| format!("st-sphere-{index}"))
                .build()
                .map(Some)
                .map_err(|err| err.to_string())
        }
        None => Ok(None),
    });
    match pool {
        Ok(Some(pool)) => Ok(pool.install(op)),
        Ok(None) => Ok(op()),
        Err(message) => Err(ResampleError::BackendFailure {
            backend: "parallel",
            message: message.clone(),
        }),
    }
}

/// Fills `out[i] = kernel(i)` for every element.
pub(crate) fn gather<T, F>(backend: Backend, out: &mut [T], kernel: F) -> ResampleResult<()>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    match backend {
        Backend::Sequential => {
            for (index, slot) in out.iter_mut().enumerate() {
                *slot = kernel(index);
            }
            Ok(())
        }
        Backend::Parallel => install(|| {
            out.par_iter_mut()
                .enumerate()
                .for_each(|(index, slot)| *slot = kernel(index));
        }),
    }
}

/// Accumulates adjoint contributions into `out`, which is split into
/// `out.len() / plane_len` independent planes.
///
/// For each plane `p` and each source `s < sources_per_plane`,
/// `kernel(p, s, sink)` reports contributions as `sink(index_in_plane, value)`.
/// Sources of plane `p` only ever write into plane `p`.
///
/// The parallel backend accumulates through atomic cells, so the summation
/// order (and the last bits of the result) depends on scheduling. The cells
/// are a scratch buffer the size of `out`, seeded from it and written back
/// once all tasks finished; `out` stays the only buffer handed back to the caller.
/// When the reduction order is locked via `spiral_config`, each plane is
/// instead owned by one task that walks its sources in sequential order,
/// which reproduces the sequential result exactly and needs no scratch.
pub(crate) fn scatter<T, F>(
    backend: Backend,
    out: &mut [T],
    plane_len: usize,
    sources_per_plane: usize,
    kernel: F,
) -> ResampleResult<()>
where
    T: Element,
    F: Fn(usize, usize, &mut dyn FnMut(usize, T)) + Sync + Send,
{
    if plane_len == 0 || out.is_empty() {
        return Ok(());
    }
    debug_assert_eq!(out.len() % plane_len, 0);
    match backend {
        Backend::Sequential => {
            for (plane_index, plane) in out.chunks_mut(plane_len).enumerate() {
                scatter_plane(plane, plane_index, sources_per_plane, &kernel);
            }
            Ok(())
        }
        Backend::Parallel if execution::lock_reduction_order() => install(|| {
            out.par_chunks_mut(plane_len)
                .enumerate()
                .for_each(|(plane_index, plane)| {
                    scatter_plane(plane, plane_index, sources_per_plane, &kernel)
                });
        }),
        Backend::Parallel => {
            let cells: Vec<T::Atomic> = out.iter().map(|&value| T::new_atomic(value)).collect();
            let planes = out.len() / plane_len;
            install(|| {
                (0..planes * sources_per_plane)
                    .into_par_iter()
                    .for_each(|task| {
                        let plane_index = task / sources_per_plane;
                        let base = plane_index * plane_len;
                        kernel(plane_index, task % sources_per_plane, &mut |index, value| {
                            T::atomic_add(&cells[base + index], value)
                        });
                    });
            })?;
            for (slot, cell) in out.iter_mut().zip(cells) {
                *slot = T::atomic_into_inner(cell);
            }
            Ok(())
        }
    }
}

#[inline]
fn scatter_plane<T, F>(plane: &mut [T], plane_index: usize, sources_per_plane: usize, kernel: &F)
where
    T: Element,
    F: Fn(usize, usize, &mut dyn FnMut(usize, T)),
{
    for source in 0..sources_per_plane {
        kernel(plane_index, source, &mut |index, value| {
            plane[index] = plane[index] + value
        });
    }
}
