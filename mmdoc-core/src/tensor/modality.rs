//! Modalities and their shape rules

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Channel counts accepted on an image channel axis
const IMAGE_CHANNELS: [usize; 3] = [1, 3, 4];

/// Size of the trailing color axis of a video
const VIDEO_COLOR_CHANNELS: usize = 3;

/// The kind of data a tensor variant carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModalityKind {
    /// Any tensor, no shape rule
    Generic,

    /// `H x W`, `H x W x C` or `C x H x W` images
    Image,

    /// Mono or multi-channel waveforms
    Audio,

    /// Frame stacks with a trailing RGB axis
    Video,

    /// One embedding vector or a batch of them
    Embedding,
}

/// Where the channel axis of an image tensor sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// `H x W`, no channel axis
    Grayscale,

    /// `H x W x C`
    ChannelsLast,

    /// `C x H x W`
    ChannelsFirst,
}

impl ModalityKind {
    /// Every modality, in registry order
    pub const ALL: [ModalityKind; 5] = [
        ModalityKind::Generic,
        ModalityKind::Image,
        ModalityKind::Audio,
        ModalityKind::Video,
        ModalityKind::Embedding,
    ];

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ModalityKind::Generic => "generic",
            ModalityKind::Image => "image",
            ModalityKind::Audio => "audio",
            ModalityKind::Video => "video",
            ModalityKind::Embedding => "embedding",
        }
    }

    /// Check a shape against this modality's rule
    pub fn validate_shape(self, shape: &[usize]) -> Result<()> {
        match self {
            ModalityKind::Generic => Ok(()),
            ModalityKind::Image => image_layout(shape).map(|_| ()),
            ModalityKind::Audio => match shape.len() {
                1 | 2 => Ok(()),
                n => Err(Error::tensor_rule(
                    self,
                    format!("expected 1 (samples) or 2 (channels x samples) dimensions, got {n} (shape {shape:?})"),
                )),
            },
            ModalityKind::Video => match shape {
                [.., last] if matches!(shape.len(), 3 | 4) && *last == VIDEO_COLOR_CHANNELS => Ok(()),
                _ => Err(Error::tensor_rule(
                    self,
                    format!(
                        "expected 3 or 4 dimensions with the last one equal to {VIDEO_COLOR_CHANNELS}, got shape {shape:?}"
                    ),
                )),
            },
            ModalityKind::Embedding => match shape.len() {
                1 | 2 => Ok(()),
                n => Err(Error::tensor_rule(
                    self,
                    format!("expected 1 or 2 dimensions, got {n} (shape {shape:?})"),
                )),
            },
        }
    }
}

/// Work out the channel layout of an image shape
///
/// Channels-last wins when both ends of a 3-D shape look like a channel axis.
pub fn image_layout(shape: &[usize]) -> Result<ChannelLayout> {
    match shape {
        [_, _] => Ok(ChannelLayout::Grayscale),
        [_, _, c] if IMAGE_CHANNELS.contains(c) => Ok(ChannelLayout::ChannelsLast),
        [c, _, _] if IMAGE_CHANNELS.contains(c) => Ok(ChannelLayout::ChannelsFirst),
        [_, _, _] => Err(Error::tensor_rule(
            ModalityKind::Image,
            format!("expected a channel axis of size 1, 3 or 4 first or last, got shape {shape:?}"),
        )),
        _ => Err(Error::tensor_rule(
            ModalityKind::Image,
            format!(
                "expected H x W, H x W x C or C x H x W, got {} dimensions (shape {shape:?})",
                shape.len()
            ),
        )),
    }
}

impl fmt::Display for ModalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-level modality marker used by [`Variant`](super::Variant)
pub trait Modality: Send + Sync + 'static {
    /// The runtime modality this marker stands for
    const KIND: ModalityKind;
}

/// Marker for tensors without a modality rule
#[derive(Debug, Clone, Copy, Default)]
pub struct Generic;

/// Marker for image tensors
#[derive(Debug, Clone, Copy, Default)]
pub struct Image;

/// Marker for audio tensors
#[derive(Debug, Clone, Copy, Default)]
pub struct Audio;

/// Marker for video tensors
#[derive(Debug, Clone, Copy, Default)]
pub struct Video;

/// Marker for embedding tensors
#[derive(Debug, Clone, Copy, Default)]
pub struct Embedding;

impl Modality for Generic {
    const KIND: ModalityKind = ModalityKind::Generic;
}

impl Modality for Image {
    const KIND: ModalityKind = ModalityKind::Image;
}

impl Modality for Audio {
    const KIND: ModalityKind = ModalityKind::Audio;
}

impl Modality for Video {
    const KIND: ModalityKind = ModalityKind::Video;
}

impl Modality for Embedding {
    const KIND: ModalityKind = ModalityKind::Embedding;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(ModalityKind::Generic, &[] ; "generic scalar")]
    #[test_case(ModalityKind::Generic, &[3, 224, 224, 5, 2] ; "generic 5d")]
    #[test_case(ModalityKind::Image, &[224, 224] ; "image grayscale")]
    #[test_case(ModalityKind::Image, &[224, 224, 3] ; "image hwc")]
    #[test_case(ModalityKind::Image, &[3, 224, 224] ; "image chw")]
    #[test_case(ModalityKind::Image, &[4, 32, 32] ; "image rgba chw")]
    #[test_case(ModalityKind::Audio, &[16000] ; "audio mono")]
    #[test_case(ModalityKind::Audio, &[2, 16000] ; "audio stereo")]
    #[test_case(ModalityKind::Video, &[10, 64, 64, 3] ; "video frames")]
    #[test_case(ModalityKind::Video, &[64, 64, 3] ; "video single frame")]
    #[test_case(ModalityKind::Embedding, &[768] ; "embedding vector")]
    #[test_case(ModalityKind::Embedding, &[100, 1] ; "embedding batch")]
    fn test_valid_shapes(modality: ModalityKind, shape: &[usize]) {
        assert!(modality.validate_shape(shape).is_ok());
    }

    #[test_case(ModalityKind::Image, &[224] ; "image 1d")]
    #[test_case(ModalityKind::Image, &[5, 224, 224] ; "image bad channels")]
    #[test_case(ModalityKind::Image, &[1, 3, 224, 224] ; "image batched")]
    #[test_case(ModalityKind::Audio, &[] ; "audio scalar")]
    #[test_case(ModalityKind::Audio, &[2, 2, 16000] ; "audio 3d")]
    #[test_case(ModalityKind::Video, &[10, 64, 64, 4] ; "video rgba")]
    #[test_case(ModalityKind::Video, &[64, 3] ; "video 2d")]
    #[test_case(ModalityKind::Embedding, &[3, 224, 224] ; "embedding 3d")]
    fn test_invalid_shapes_name_the_modality(modality: ModalityKind, shape: &[usize]) {
        let err = modality.validate_shape(shape).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains(modality.as_str()), "{err}");
    }

    #[test]
    fn test_image_layout() {
        assert_eq!(image_layout(&[8, 8]).unwrap(), ChannelLayout::Grayscale);
        assert_eq!(image_layout(&[8, 8, 3]).unwrap(), ChannelLayout::ChannelsLast);
        assert_eq!(image_layout(&[3, 8, 8]).unwrap(), ChannelLayout::ChannelsFirst);
        assert_eq!(image_layout(&[3, 8, 3]).unwrap(), ChannelLayout::ChannelsLast);
    }

    proptest! {
        #[test]
        fn prop_embedding_accepts_only_rank_one_or_two(shape in prop::collection::vec(0usize..8, 0..5)) {
            let accepted = ModalityKind::Embedding.validate_shape(&shape).is_ok();
            prop_assert_eq!(accepted, matches!(shape.len(), 1 | 2));
        }

        #[test]
        fn prop_generic_accepts_everything(shape in prop::collection::vec(0usize..8, 0..6)) {
            prop_assert!(ModalityKind::Generic.validate_shape(&shape).is_ok());
        }
    }
}
