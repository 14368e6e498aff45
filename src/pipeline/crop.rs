use image::{imageops, RgbImage};
use tracing::{debug, warn};

use crate::pipeline::types::BoundingBox;

/// Region chosen for a request. Both the enhancer and the annotation renderer
/// read the same selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropSelection {
    /// The vision service's top-ranked smart crop.
    Suggested(BoundingBox),
    /// No usable suggestion; covers the whole image.
    FullFrame(BoundingBox),
}

impl CropSelection {
    pub fn region(&self) -> BoundingBox {
        match self {
            CropSelection::Suggested(region) | CropSelection::FullFrame(region) => *region,
        }
    }

    pub fn is_suggested(&self) -> bool {
        matches!(self, CropSelection::Suggested(_))
    }
}

/// Takes the first smart crop as-is. The service ranks its suggestions and
/// the first one is assumed to be the best; nothing here re-ranks them.
pub fn select_crop(smart_crops: &[BoundingBox], width: u32, height: u32) -> CropSelection {
    let Some(first) = smart_crops.first() else {
        debug!("No smart crop suggested; using the full {width}x{height} frame");
        return CropSelection::FullFrame(BoundingBox::full(width, height));
    };

    if first.fits_within(width, height) && !first.is_empty() {
        return CropSelection::Suggested(*first);
    }

    match first.clamp_to(width, height) {
        Some(clamped) => {
            warn!(
                "Smart crop {:?} exceeds {}x{} image; clipped to {:?}",
                first, width, height, clamped
            );
            CropSelection::Suggested(clamped)
        }
        None => {
            warn!(
                "Smart crop {:?} does not overlap {}x{} image; using full frame",
                first, width, height
            );
            CropSelection::FullFrame(BoundingBox::full(width, height))
        }
    }
}

/// Copies the selected region out of `image`.
pub fn crop_region(image: &RgbImage, region: BoundingBox) -> RgbImage {
    imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image()
}
