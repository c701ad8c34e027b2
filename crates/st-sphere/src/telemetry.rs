// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::sync::OnceLock;

use spiral_config::execution;
use spiral_config::tracing::{self as config_tracing, InitError};
use tracing::{debug, warn};

static SUBSCRIBER: OnceLock<Result<(), InitError>> = OnceLock::new();

/// Installs the workspace tracing subscriber once per process and logs the
/// resolved execution configuration.
///
/// Returns `false` when installation failed, e.g. because the embedding
/// application already set its own global subscriber; the failure is
/// reported as a warning rather than propagated.
pub fn init_tracing() -> bool {
    let result = SUBSCRIBER.get_or_init(|| {
        let outcome = match config_tracing::init_tracing() {
            Ok(()) | Err(InitError::AlreadyInitialised) => Ok(()),
            Err(err) => Err(err),
        };
        let cfg = execution::config();
        debug!(
            deterministic = cfg.deterministic,
            lock_reduction_order = cfg.fix_reduction,
            threads = ?cfg.threads,
            "st-sphere execution config"
        );
        outcome
    });

    match result {
        Ok(()) => true,
        Err(err) => {
            warn!("failed to initialise tracing subscriber: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialisation_is_stable() {
        let first = init_tracing();
        assert_eq!(init_tracing(), first);
    }
}
