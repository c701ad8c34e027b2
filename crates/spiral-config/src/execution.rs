use rand::{rngs::StdRng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Process-wide execution knobs for the resampling operators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Whether deterministic execution is enabled globally.
    pub deterministic: bool,
    /// Base seed used to derive per-component seeds.
    pub base_seed: u64,
    /// If true, parallel scatter (adjoint) passes accumulate in the same order
    /// as the sequential backend instead of racing through atomics.
    pub fix_reduction: bool,
    /// Size of the dedicated parallel pool. `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            deterministic: false,
            base_seed: 42,
            fix_reduction: false,
            threads: None,
        }
    }
}

impl ExecutionConfig {
    /// Builds a configuration snapshot from environment variables.
    pub fn from_env() -> Self {
        let deterministic = std::env::var("SPIRAL_DETERMINISTIC")
            .ok()
            .map(|v| !is_falsy(&v))
            .unwrap_or(false);

        let base_seed = std::env::var("SPIRAL_DETERMINISTIC_SEED")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(42);

        let fix_reduction = std::env::var("SPIRAL_DETERMINISTIC_REDUCTION")
            .ok()
            .map(|v| is_truthy(&v))
            .unwrap_or(deterministic);

        let threads = std::env::var("SPIRAL_RESAMPLE_THREADS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0);

        Self {
            deterministic,
            base_seed,
            fix_reduction,
            threads,
        }
    }

    /// Derives a deterministic seed for a given component label.
    pub fn seed_for<L: Hash>(&self, label: L) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.base_seed.hash(&mut hasher);
        label.hash(&mut hasher);
        hasher.finish()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "True" | "on" | "ON")
}

fn is_falsy(value: &str) -> bool {
    matches!(value.trim(), "0" | "false" | "False" | "off" | "OFF")
}

static CONFIG: OnceLock<ExecutionConfig> = OnceLock::new();

/// Returns the lazily initialised execution configuration.
pub fn config() -> &'static ExecutionConfig {
    CONFIG.get_or_init(ExecutionConfig::from_env)
}

/// Installs `cfg` unless a configuration was already resolved, and returns the
/// active one. Intended for tests and embedding applications.
pub fn configure(cfg: ExecutionConfig) -> &'static ExecutionConfig {
    CONFIG.get_or_init(|| cfg)
}

/// Returns whether scatter reductions must keep the sequential accumulation
/// order on every backend.
pub fn lock_reduction_order() -> bool {
    let cfg = config();
    cfg.fix_reduction
}

/// Requested size of the dedicated parallel pool.
pub fn parallel_threads() -> Option<usize> {
    config().threads
}

/// Returns a RNG derived from the provided label. When determinism is disabled
/// this falls back to a random seed from the operating system.
pub fn rng_from_label(label: &str) -> StdRng {
    let cfg = config();
    if cfg.deterministic {
        StdRng::seed_from_u64(cfg.seed_for(label))
    } else {
        StdRng::from_entropy()
    }
}

/// Returns a RNG seeded from an optional explicit seed, respecting deterministic
/// overrides when the seed is not provided.
pub fn rng_from_optional(seed: Option<u64>, label: &str) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => rng_from_label(label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
    use std::sync::{Mutex, OnceLock};

    const VARS: [&str; 4] = [
        "SPIRAL_DETERMINISTIC",
        "SPIRAL_DETERMINISTIC_SEED",
        "SPIRAL_DETERMINISTIC_REDUCTION",
        "SPIRAL_RESAMPLE_THREADS",
    ];

    fn with_env(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let _lock = GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot: Vec<(String, Option<String>)> = VARS
            .iter()
            .map(|key| {
                let previous = std::env::var(key).ok();
                let value = vars
                    .iter()
                    .find(|(name, _)| name == key)
                    .and_then(|(_, value)| *value);
                match value {
                    Some(val) => std::env::set_var(key, val),
                    None => std::env::remove_var(key),
                }
                ((*key).to_string(), previous)
            })
            .collect();

        let result = catch_unwind(AssertUnwindSafe(test));

        for (key, value) in snapshot {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }

        if let Err(err) = result {
            resume_unwind(err);
        }
    }

    #[test]
    fn defaults_leave_scatter_unordered() {
        with_env(&[], || {
            let cfg = ExecutionConfig::from_env();
            assert_eq!(cfg, ExecutionConfig::default());
        });
    }

    #[test]
    fn deterministic_switch_implies_fixed_reduction() {
        with_env(
            &[
                ("SPIRAL_DETERMINISTIC", Some("1")),
                ("SPIRAL_DETERMINISTIC_SEED", Some("1337")),
            ],
            || {
                let cfg = ExecutionConfig::from_env();
                assert!(cfg.deterministic);
                assert!(cfg.fix_reduction);
                assert_eq!(cfg.base_seed, 1337);
            },
        );
    }

    #[test]
    fn reduction_flag_overrides_global_switch() {
        with_env(
            &[
                ("SPIRAL_DETERMINISTIC", Some("on")),
                ("SPIRAL_DETERMINISTIC_REDUCTION", Some("0")),
            ],
            || {
                let cfg = ExecutionConfig::from_env();
                assert!(cfg.deterministic);
                assert!(!cfg.fix_reduction);
            },
        );
    }

    #[test]
    fn thread_count_ignores_zero_and_garbage() {
        with_env(&[("SPIRAL_RESAMPLE_THREADS", Some("0"))], || {
            assert_eq!(ExecutionConfig::from_env().threads, None);
        });
        with_env(&[("SPIRAL_RESAMPLE_THREADS", Some("many"))], || {
            assert_eq!(ExecutionConfig::from_env().threads, None);
        });
        with_env(&[("SPIRAL_RESAMPLE_THREADS", Some(" 3 "))], || {
            assert_eq!(ExecutionConfig::from_env().threads, Some(3));
        });
    }

    #[test]
    fn textual_false_values_disable_flags() {
        with_env(&[("SPIRAL_DETERMINISTIC", Some("off"))], || {
            let cfg = ExecutionConfig::from_env();
            assert!(!cfg.deterministic);
            assert!(!cfg.fix_reduction);
        });
    }

    #[test]
    fn explicit_seed_is_reproducible() {
        let a: f64 = rng_from_optional(Some(7), "fixture").gen();
        let b: f64 = rng_from_optional(Some(7), "fixture").gen();
        assert_eq!(a, b);
    }

    #[test]
    fn seed_for_depends_on_label() {
        let cfg = ExecutionConfig::default();
        assert_ne!(cfg.seed_for("uv"), cfg.seed_for("pool"));
        assert_eq!(cfg.seed_for("uv"), cfg.seed_for("uv"));
    }
}
