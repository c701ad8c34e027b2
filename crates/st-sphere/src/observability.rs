// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Process-wide hook for observing completed resampling calls without pulling
//! a plugin or metrics system into the core.

use crate::exec::Backend;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Metadata about a completed resampling call.
#[derive(Clone, Debug, PartialEq)]
pub struct ResampleOpEvent {
    pub op_name: &'static str,
    pub backend: Backend,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
}

/// Observer callback invoked after a resampling call succeeds.
pub type ResampleOpObserver = Arc<dyn Fn(&ResampleOpEvent) + Send + Sync + 'static>;

static RESAMPLE_OP_OBSERVER: OnceLock<RwLock<Option<ResampleOpObserver>>> = OnceLock::new();

thread_local! {
    static IN_OBSERVER_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Installs (or clears) the global observer, returning the previous one.
pub fn set_resample_op_observer(
    observer: Option<ResampleOpObserver>,
) -> Option<ResampleOpObserver> {
    let lock = RESAMPLE_OP_OBSERVER.get_or_init(|| RwLock::new(None));
    let mut slot = lock.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, observer)
}

/// Hands an event to the installed observer.
///
/// No-op (and allocation free) while no observer is installed. Events raised
/// from inside the observer itself are dropped, and a panicking observer does
/// not propagate into the operator.
pub fn emit_resample_op(
    op_name: &'static str,
    backend: Backend,
    input_shape: &[usize],
    output_shape: &[usize],
) {
    let Some(lock) = RESAMPLE_OP_OBSERVER.get() else {
        return;
    };
    let observer = lock.read().unwrap_or_else(PoisonError::into_inner).clone();
    let Some(observer) = observer else {
        return;
    };

    let already_in_callback = IN_OBSERVER_CALLBACK.with(|flag| flag.replace(true));
    if already_in_callback {
        return;
    }

    let event = ResampleOpEvent {
        op_name,
        backend,
        input_shape: input_shape.to_vec(),
        output_shape: output_shape.to_vec(),
    };
    let _ = catch_unwind(AssertUnwindSafe(|| observer(&event)));

    IN_OBSERVER_CALLBACK.with(|flag| flag.set(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The observer slot is global and other operator tests may emit while it is
    // installed, so observers only record their own op names.
    static GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn observer_receives_events_until_cleared() {
        let _guard = GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_resample_op_observer(Some(Arc::new(move |event: &ResampleOpEvent| {
            if event.op_name == "sample_op" {
                sink.lock().unwrap().push(event.clone());
            }
        })));

        emit_resample_op("sample_op", Backend::Parallel, &[1, 2], &[3]);
        let previous = set_resample_op_observer(None);
        assert!(previous.is_some());
        emit_resample_op("sample_op", Backend::Sequential, &[1], &[1]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].op_name, "sample_op");
        assert_eq!(seen[0].backend, Backend::Parallel);
        assert_eq!(seen[0].input_shape, vec![1, 2]);
        assert_eq!(seen[0].output_shape, vec![3]);
    }

    #[test]
    fn reentrant_and_panicking_observers_are_contained() {
        let _guard = GUARD.lock().unwrap_or_else(PoisonError::into_inner);
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        set_resample_op_observer(Some(Arc::new(move |event: &ResampleOpEvent| {
            if event.op_name != "outer" {
                return;
            }
            *counter.lock().unwrap() += 1;
            emit_resample_op("nested", Backend::Sequential, &[], &[]);
            panic!("observer failure");
        })));

        emit_resample_op("outer", Backend::Sequential, &[1], &[1]);
        emit_resample_op("outer", Backend::Sequential, &[1], &[1]);
        set_resample_op_observer(None);

        assert_eq!(*calls.lock().unwrap(), 2);
    }
}
