use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resampling used for a thumbnail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Quality,
    Fast,
}

impl RendererKind {
    fn filter(self) -> FilterType {
        match self {
            RendererKind::Quality => FilterType::Lanczos3,
            RendererKind::Fast => FilterType::Triangle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInput {
    pub source: PathBuf,
    pub target: PathBuf,
    pub size: u32,
    pub make_square: bool,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write thumbnail {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to create thumbnail folder: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// The source image vanished before it could be opened.
    pub fn is_missing_source(&self) -> bool {
        match self {
            RenderError::Read { source: image::ImageError::IoError(e), .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

/// Fits the source into `size` x `size` (or crops it to that square) and writes it.
pub fn render(input: &RenderInput, kind: RendererKind) -> Result<PathBuf, RenderError> {
    let img = image::open(&input.source).map_err(|source| RenderError::Read {
        path: input.source.display().to_string(),
        source,
    })?;
    let size = input.size.max(1);

    let out = if input.make_square {
        let (w, h) = img.dimensions();
        let side = w.min(h);
        img.crop_imm((w - side) / 2, (h - side) / 2, side, side)
            .resize_exact(size, size, kind.filter())
    } else {
        img.resize(size, size, kind.filter())
    };
    let out = if is_jpeg(&input.target) { DynamicImage::ImageRgb8(out.to_rgb8()) } else { out };

    if let Some(parent) = input.target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    out.save(&input.target).map_err(|source| RenderError::Write {
        path: input.target.display().to_string(),
        source,
    })?;
    Ok(input.target.clone())
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_thumbnail_is_cropped_to_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("wide.png");
        image::RgbaImage::new(40, 20).save(&source).unwrap();
        let input = RenderInput {
            source,
            target: dir.path().join("thumbs/wide_8.jpg"),
            size: 8,
            make_square: true,
        };

        let written = render(&input, RendererKind::Fast).unwrap();
        assert_eq!(image::image_dimensions(&written).unwrap(), (8, 8));
    }

    #[test]
    fn fitted_thumbnail_keeps_aspect_ratio() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("wide.png");
        image::RgbImage::new(40, 20).save(&source).unwrap();
        let input = RenderInput {
            source,
            target: dir.path().join("wide_10.png"),
            size: 10,
            make_square: false,
        };

        render(&input, RendererKind::Quality).unwrap();
        assert_eq!(image::image_dimensions(dir.path().join("wide_10.png")).unwrap(), (10, 5));
    }

    #[test]
    fn missing_source_is_a_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = RenderInput {
            source: dir.path().join("missing.jpg"),
            target: dir.path().join("out.jpg"),
            size: 10,
            make_square: false,
        };
        assert!(matches!(render(&input, RendererKind::Fast), Err(RenderError::Read { .. })));
    }
}
