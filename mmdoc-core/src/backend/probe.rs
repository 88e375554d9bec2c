//! Process-wide backend availability probe

use std::panic;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use tracing::{debug, warn};

use super::BackendKind;
use crate::config::ProbeConfig;

static AVAILABILITY: [OnceLock<bool>; 3] = [OnceLock::new(), OnceLock::new(), OnceLock::new()];

#[cfg(test)]
static PROBE_ATTEMPTS: [AtomicUsize; 3] = [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)];

/// Check whether a backend can be used in this process
///
/// The first call for a given backend runs the probe; later calls return the
/// cached answer. A backend that is not compiled in, disabled through
/// [`ProbeConfig`], or whose probe fails or panics reports `false`.
pub fn is_backend_available(kind: BackendKind) -> bool {
    *AVAILABILITY[kind.index()].get_or_init(|| probe(kind))
}

/// Check backend availability by name
///
/// Unknown names report `false`.
pub fn is_backend_available_by_name(name: &str) -> bool {
    name.parse::<BackendKind>()
        .map(is_backend_available)
        .unwrap_or(false)
}

fn probe(kind: BackendKind) -> bool {
    #[cfg(test)]
    PROBE_ATTEMPTS[kind.index()].fetch_add(1, Ordering::Relaxed);

    if !kind.is_compiled() {
        debug!(backend = %kind, "tensor backend not compiled in");
        return false;
    }

    if ProbeConfig::from_env().is_disabled(kind) {
        debug!(backend = %kind, "tensor backend disabled by configuration");
        return false;
    }

    let available = panic::catch_unwind(|| probe_backend(kind)).unwrap_or_else(|_| {
        warn!(backend = %kind, "tensor backend probe panicked");
        false
    });

    debug!(backend = %kind, available, "probed tensor backend");
    available
}

fn probe_backend(kind: BackendKind) -> bool {
    match kind {
        BackendKind::NdArray => super::ndarray::probe(),
        #[cfg(feature = "candle")]
        BackendKind::Candle => super::candle::probe(),
        #[cfg(feature = "torch")]
        BackendKind::Torch => super::torch::probe(),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

#[cfg(test)]
pub(crate) fn probe_attempts(kind: BackendKind) -> usize {
    PROBE_ATTEMPTS[kind.index()].load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_is_memoized() {
        let first = is_backend_available(BackendKind::NdArray);
        let second = is_backend_available(BackendKind::NdArray);

        assert_eq!(first, second);
        assert_eq!(probe_attempts(BackendKind::NdArray), 1);
    }

    #[test]
    fn test_uncompiled_backend_is_unavailable() {
        if !BackendKind::Torch.is_compiled() {
            assert!(!is_backend_available(BackendKind::Torch));
            assert!(!is_backend_available(BackendKind::Torch));
            assert_eq!(probe_attempts(BackendKind::Torch), 1);
        }
    }

    #[test]
    fn test_availability_by_name() {
        assert_eq!(is_backend_available_by_name("numpy"), is_backend_available(BackendKind::NdArray));
        assert!(!is_backend_available_by_name("tensorflow"));
        assert!(!is_backend_available_by_name(""));
    }
}
