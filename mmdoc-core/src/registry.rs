//! Variant registry and the generic tensor selector
//!
//! The registry maps `(modality, backend)` to the concrete variant type
//! used for fields declared as `Variant[Backend]`. It is built completely on
//! first access from the backend availability probe and is read-only
//! afterwards. Lookups for pairs that are not registered fail with
//! [`Error::UnsupportedBackend`]; no selector falls back to another backend.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;
use tracing::debug;

use crate::backend::{is_backend_available, BackendKind};
use crate::error::{Error, Result};
use crate::tensor::ModalityKind;

/// A concrete tensor variant: one modality bound to one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantType {
    modality: ModalityKind,
    backend: BackendKind,
}

impl VariantType {
    /// Pair a modality with a backend without consulting the registry
    pub(crate) fn new(modality: ModalityKind, backend: BackendKind) -> Self {
        Self { modality, backend }
    }

    /// Get the modality
    pub fn modality(&self) -> ModalityKind {
        self.modality
    }

    /// Get the backend
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Canonical type name, e.g. `ImageNdArray` or `TorchEmbedding`
    pub fn name(&self) -> &'static str {
        use BackendKind::{Candle, NdArray, Torch};
        use ModalityKind::{Audio, Embedding, Generic, Image, Video};

        match (self.modality, self.backend) {
            (Generic, NdArray) => "NdArrayTensor",
            (Generic, Candle) => "CandleTensor",
            (Generic, Torch) => "TorchTensor",
            (Image, NdArray) => "ImageNdArray",
            (Image, Candle) => "ImageCandleTensor",
            (Image, Torch) => "ImageTorchTensor",
            (Audio, NdArray) => "AudioNdArray",
            (Audio, Candle) => "AudioCandleTensor",
            (Audio, Torch) => "AudioTorchTensor",
            (Video, NdArray) => "VideoNdArray",
            (Video, Candle) => "VideoCandleTensor",
            (Video, Torch) => "VideoTorchTensor",
            (Embedding, NdArray) => "NdArrayEmbedding",
            (Embedding, Candle) => "CandleEmbedding",
            (Embedding, Torch) => "TorchEmbedding",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable table of registered tensor variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    variants: BTreeMap<(ModalityKind, BackendKind), VariantType>,
}

assert_impl_all!(Registry: Send, Sync);

static REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Build a registry holding every modality for the given backends
    pub fn with_backends(backends: &[BackendKind]) -> Self {
        let mut variants = BTreeMap::new();
        for &backend in backends {
            for modality in ModalityKind::ALL {
                variants.insert((modality, backend), VariantType::new(modality, backend));
            }
        }
        Self { variants }
    }

    fn from_probe() -> Self {
        let available: Vec<BackendKind> = BackendKind::ALL
            .into_iter()
            .filter(|&kind| is_backend_available(kind))
            .collect();
        let registry = Self::with_backends(&available);
        debug!(backends = ?available, variants = registry.len(), "built tensor variant registry");
        registry
    }

    /// Resolve the variant registered for `(modality, backend)`
    pub fn select(&self, modality: ModalityKind, backend: BackendKind) -> Result<VariantType> {
        self.variants
            .get(&(modality, backend))
            .copied()
            .ok_or(Error::UnsupportedBackend { modality, backend })
    }

    /// Check whether a pair is registered
    pub fn contains(&self, modality: ModalityKind, backend: BackendKind) -> bool {
        self.variants.contains_key(&(modality, backend))
    }

    /// Backends with at least one registered variant
    pub fn backends(&self) -> Vec<BackendKind> {
        let mut backends: Vec<BackendKind> = self.variants.keys().map(|&(_, b)| b).collect();
        backends.sort();
        backends.dedup();
        backends
    }

    /// Iterate over the registered variants
    pub fn iter(&self) -> impl Iterator<Item = VariantType> + '_ {
        self.variants.values().copied()
    }

    /// Get the number of registered variants
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Check if no variant is registered
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// The process-wide registry, built on first use
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::from_probe)
}

/// Resolve the variant for a modality on a backend
///
/// Fails with [`Error::UnsupportedBackend`] when the backend is not
/// available in this process.
pub fn select(modality: ModalityKind, backend: BackendKind) -> Result<VariantType> {
    registry().select(modality, backend)
}

/// All registered variants
pub fn registered_variants() -> Vec<VariantType> {
    registry().iter().collect()
}

/// All available backends
pub fn registered_backends() -> Vec<BackendKind> {
    registry().backends()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ModalityKind::Generic)]
    #[test_case(ModalityKind::Image)]
    #[test_case(ModalityKind::Audio)]
    #[test_case(ModalityKind::Video)]
    #[test_case(ModalityKind::Embedding)]
    fn test_select_fails_closed_for_every_modality(modality: ModalityKind) {
        let registry = Registry::with_backends(&[BackendKind::NdArray]);

        for backend in [BackendKind::Candle, BackendKind::Torch] {
            match registry.select(modality, backend) {
                Err(Error::UnsupportedBackend { modality: m, backend: b }) => {
                    assert_eq!(m, modality);
                    assert_eq!(b, backend);
                }
                other => panic!("expected UnsupportedBackend, got {other:?}"),
            }
        }

        let selected = registry.select(modality, BackendKind::NdArray).unwrap();
        assert_eq!(selected.modality(), modality);
        assert_eq!(selected.backend(), BackendKind::NdArray);
    }

    #[test]
    fn test_registry_reflects_availability() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let registry = registry();
        for backend in BackendKind::ALL {
            for modality in ModalityKind::ALL {
                assert_eq!(registry.contains(modality, backend), is_backend_available(backend));
            }
        }
        assert!(registered_backends().contains(&BackendKind::NdArray));
    }

    #[test]
    fn test_select_uses_process_registry() {
        let variant = select(ModalityKind::Image, BackendKind::NdArray).unwrap();
        assert_eq!(variant.name(), "ImageNdArray");

        if !is_backend_available(BackendKind::Torch) {
            assert!(matches!(
                select(ModalityKind::Audio, BackendKind::Torch),
                Err(Error::UnsupportedBackend { .. })
            ));
        }
    }

    #[test]
    fn test_variant_names_are_unique() {
        let registry = Registry::with_backends(&BackendKind::ALL);
        let mut names: Vec<&str> = registry.iter().map(|v| v.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 15);
        assert_eq!(registry.backends(), BackendKind::ALL.to_vec());
    }
}
