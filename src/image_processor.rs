//! # Image Processing Module
//!
//! Questo modulo gestisce la riduzione delle immagini JPEG e PNG in memoria
//! con il crate `image`.
//!
//! ## Pipeline di ottimizzazione
//!
//! 1. **Decode**: Formato rilevato dal contenuto, non solo dall'estensione
//! 2. **Orientamento**: Il tag EXIF `Orientation` viene applicato ai pixel,
//!    così le foto ruotate non vengono salvate di lato
//! 3. **Resize**: Larghezza target 2048 (orizzontali/quadrate) o 1080 (verticali),
//!    mai ingrandire, proporzioni preservate, filtro Lanczos3
//! 4. **Encode** sul path temporaneo:
//!    - PNG: compressione lossless massima
//!    - JPEG: qualità fissa configurabile (default 90)
//!
//! Nessun progresso intermedio: l'operazione è un singolo passo,
//! eseguito su un thread bloccante di tokio.

use crate::config::Config;
use crate::error::ShrinkError;
use crate::media::{MediaType, ProcessingRequest};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageEncoder};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

const LANDSCAPE_WIDTH: u32 = 2048;
const PORTRAIT_WIDTH: u32 = 1080;

/// Handles image shrinking
pub struct ImageProcessor {
    jpeg_quality: u8,
}

impl ImageProcessor {
    pub fn new(config: &Config) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
        }
    }

    /// Decode, orient, resize and re-encode `request.input_path` into
    /// `request.output_path`.
    pub async fn shrink(&self, request: &ProcessingRequest, media_type: MediaType) -> Result<(), ShrinkError> {
        let request = request.clone();
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || shrink_image(&request, media_type, quality))
            .await
            .map_err(|e| ShrinkError::Codec(format!("Image task failed: {}", e)))?
    }
}

fn shrink_image(request: &ProcessingRequest, media_type: MediaType, jpeg_quality: u8) -> Result<(), ShrinkError> {
    let img = decode_oriented(&request.input_path)?;
    let (width, height) = img.dimensions();
    let resized = resize_to_target(img);

    debug!(
        "Resized {} from {}x{} to {}x{}",
        request.input_path.display(),
        width,
        height,
        resized.width(),
        resized.height()
    );

    encode(&resized, &request.output_path, media_type, jpeg_quality)
}

/// Decode an image and apply its EXIF orientation
pub fn decode_oriented(path: &Path) -> Result<DynamicImage, ShrinkError> {
    let img = image::io::Reader::open(path)
        .map_err(|e| ShrinkError::Codec(format!("Could not open file {}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| ShrinkError::Codec(format!("Could not read file {}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| ShrinkError::Codec(format!("Could not decode file {}: {}", path.display(), e)))?;

    Ok(match Orientation::from_path(path) {
        Some(orientation) => orientation.apply(img),
        None => img,
    })
}

/// Output width for an image: 1080 for portrait, 2048 otherwise, never wider
/// than the source.
pub fn target_width(width: u32, height: u32) -> u32 {
    let desired = if height > width {
        PORTRAIT_WIDTH
    } else {
        LANDSCAPE_WIDTH
    };
    desired.min(width)
}

pub fn resize_to_target(img: DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    let target = target_width(width, height);
    if target == width {
        return img;
    }

    let target_height = ((height as f64 * target as f64 / width as f64).round() as u32).max(1);
    img.resize_exact(target, target_height, FilterType::Lanczos3)
}

fn encode(img: &DynamicImage, path: &Path, media_type: MediaType, jpeg_quality: u8) -> Result<(), ShrinkError> {
    let file = File::create(path)
        .map_err(|e| ShrinkError::Codec(format!("Could not create output file {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);

    match media_type {
        MediaType::Png => {
            let encoder = PngEncoder::new_with_quality(&mut writer, CompressionType::Best, PngFilter::Adaptive);
            encoder.write_image(img.as_bytes(), img.width(), img.height(), img.color())?;
        }
        MediaType::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut writer, jpeg_quality);
            encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
        other => {
            return Err(ShrinkError::Codec(format!("{} is not an image type", other)));
        }
    }

    writer
        .flush()
        .map_err(|e| ShrinkError::Codec(format!("Could not write {}: {}", path.display(), e)))
}

/// EXIF orientation of a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    CW90,
    CW180,
    CW270,
    MirroredVertical,
    MirroredHorizontal,
    MirroredHorizontalAnd90CW,
    MirroredHorizontalAnd270CW,
}

impl Orientation {
    /// Read the orientation tag, if the file carries EXIF data
    pub fn from_path(path: &Path) -> Option<Self> {
        let file = File::open(path).ok()?;
        let exif = exif::Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .ok()?;
        let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
        field.value.get_uint(0).map(Self::from)
    }

    /// Rotate/flip the pixels so the image displays upright without metadata
    #[must_use]
    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::CW90 => img.rotate90(),
            Self::CW180 => img.rotate180(),
            Self::CW270 => img.rotate270(),
            Self::MirroredHorizontal => img.fliph(),
            Self::MirroredVertical => img.flipv(),
            Self::MirroredHorizontalAnd90CW => img.fliph().rotate90(),
            Self::MirroredHorizontalAnd270CW => img.fliph().rotate270(),
        }
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Self::MirroredHorizontal,
            3 => Self::CW180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalAnd270CW,
            6 => Self::CW90,
            7 => Self::MirroredHorizontalAnd90CW,
            8 => Self::CW270,
            _ => Self::Normal,
        }
    }
}
