use crate::pipeline::error::ValidationError;

pub const LANDSCAPE_CROP_RATIOS: [f32; 4] = [1.77, 1.33, 1.00, 0.75];
pub const PORTRAIT_CROP_RATIOS: [f32; 4] = [0.75, 1.00, 1.33, 1.77];

/// Candidate smart-crop ratios, native orientation first. Square images are
/// treated as portrait.
pub fn candidate_crop_ratios(width: u32, height: u32) -> Result<[f32; 4], ValidationError> {
    if width == 0 || height == 0 {
        return Err(ValidationError(format!(
            "image dimensions must be positive, got {width}x{height}"
        )));
    }

    let aspect = f64::from(width) / f64::from(height);
    if aspect > 1.0 {
        Ok(LANDSCAPE_CROP_RATIOS)
    } else {
        Ok(PORTRAIT_CROP_RATIOS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_prefers_wide_ratio() {
        let ratios = candidate_crop_ratios(1920, 1080).unwrap();
        assert_eq!(ratios, LANDSCAPE_CROP_RATIOS);
        assert_eq!(candidate_crop_ratios(101, 100).unwrap()[0], 1.77);
    }

    #[test]
    fn portrait_and_square_prefer_tall_ratio() {
        assert_eq!(candidate_crop_ratios(1080, 1920).unwrap()[0], 0.75);
        assert_eq!(candidate_crop_ratios(500, 500).unwrap(), PORTRAIT_CROP_RATIOS);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(candidate_crop_ratios(0, 10).is_err());
        assert!(candidate_crop_ratios(10, 0).is_err());
    }
}
