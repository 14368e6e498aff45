//! Fixed photometric touch-up applied to the cropped region.
//!
//! Each step blends the image against a "degenerate" reference and
//! extrapolates by a factor: contrast against a flat image at the mean
//! luminance, brightness against black, saturation against the pixel's own
//! gray value. Blends are computed in `f32`, rounded and clamped to
//! `[0, 255]`. The order is contrast, brightness, saturation.

use image::{Rgb, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancementParams {
    pub contrast: f32,
    pub brightness: f32,
    pub saturation: f32,
}

impl Default for EnhancementParams {
    fn default() -> Self {
        Self {
            contrast: 1.20,
            brightness: 1.05,
            saturation: 1.20,
        }
    }
}

/// ITU-R 601 luminance in 16-bit fixed point.
fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16) as u8
}

fn blend(reference: f32, value: u8, factor: f32) -> u8 {
    (reference + factor * (f32::from(value) - reference))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn mean_luma(image: &RgbImage) -> Option<f32> {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return None;
    }
    let total: u64 = image.pixels().map(|pixel| u64::from(luma(pixel))).sum();
    Some((total as f64 / count as f64 + 0.5).floor() as f32)
}

pub fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let Some(mean) = mean_luma(image) else {
        return image.clone();
    };
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = blend(mean, *channel, factor);
        }
    }
    output
}

pub fn adjust_brightness(image: &RgbImage, factor: f32) -> RgbImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = blend(0.0, *channel, factor);
        }
    }
    output
}

pub fn adjust_saturation(image: &RgbImage, factor: f32) -> RgbImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let gray = f32::from(luma(pixel));
        for channel in pixel.0.iter_mut() {
            *channel = blend(gray, *channel, factor);
        }
    }
    output
}

pub fn enhance(image: &RgbImage, params: &EnhancementParams) -> RgbImage {
    let contrasted = adjust_contrast(image, params.contrast);
    let brightened = adjust_brightness(&contrasted, params.brightness);
    adjust_saturation(&brightened, params.saturation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(rgb))
    }

    #[test]
    fn luma_matches_reference_weights() {
        assert_eq!(luma(&Rgb([255, 255, 255])), 255);
        assert_eq!(luma(&Rgb([0, 0, 0])), 0);
        assert_eq!(luma(&Rgb([255, 0, 0])), 76);
        assert_eq!(luma(&Rgb([0, 255, 0])), 150);
        assert_eq!(luma(&Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn contrast_leaves_midpoint_gray_alone() {
        let gray = uniform(8, 8, [128, 128, 128]);
        assert_eq!(adjust_contrast(&gray, 1.2), gray);
    }

    #[test]
    fn contrast_spreads_values_around_mean() {
        let mut image = uniform(2, 1, [100, 100, 100]);
        image.put_pixel(1, 0, Rgb([200, 200, 200]));
        let output = adjust_contrast(&image, 1.2);
        assert_eq!(output.get_pixel(0, 0), &Rgb([90, 90, 90]));
        assert_eq!(output.get_pixel(1, 0), &Rgb([210, 210, 210]));
    }

    #[test]
    fn brightness_scales_and_clips() {
        let mut image = uniform(2, 1, [100, 40, 0]);
        image.put_pixel(1, 0, Rgb([250, 250, 250]));
        let output = adjust_brightness(&image, 1.05);
        assert_eq!(output.get_pixel(0, 0), &Rgb([105, 42, 0]));
        assert_eq!(output.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn saturation_ignores_gray_pixels() {
        let gray = uniform(3, 3, [77, 77, 77]);
        assert_eq!(adjust_saturation(&gray, 1.2), gray);
    }

    #[test]
    fn saturation_pushes_channels_away_from_gray() {
        let image = uniform(1, 1, [200, 100, 100]);
        let output = adjust_saturation(&image, 1.2);
        // luma is 130, so 130 + 1.2 * 70 = 214 and 130 + 1.2 * -30 = 94.
        assert_eq!(output.get_pixel(0, 0), &Rgb([214, 94, 94]));
    }

    #[test]
    fn midpoint_gray_only_gets_brighter() {
        let gray = uniform(16, 9, [128, 128, 128]);
        let output = enhance(&gray, &EnhancementParams::default());
        assert_eq!(output.dimensions(), (16, 9));
        assert!(output.pixels().all(|pixel| pixel == &Rgb([134, 134, 134])));
        assert_eq!(gray.get_pixel(0, 0), &Rgb([128, 128, 128]));
    }

    #[test]
    fn steps_run_in_declared_order() {
        let image = RgbImage::from_fn(6, 4, |x, y| {
            Rgb([(x * 40) as u8, (y * 60) as u8, ((x + y) * 20) as u8])
        });
        let params = EnhancementParams::default();
        let expected = adjust_saturation(
            &adjust_brightness(&adjust_contrast(&image, params.contrast), params.brightness),
            params.saturation,
        );
        let reversed = adjust_contrast(
            &adjust_brightness(&adjust_saturation(&image, params.saturation), params.brightness),
            params.contrast,
        );
        let output = enhance(&image, &params);
        assert_eq!(output, expected);
        assert_ne!(output, reversed);
    }

    #[test]
    fn empty_image_is_passed_through() {
        let empty = RgbImage::new(0, 0);
        assert_eq!(enhance(&empty, &EnhancementParams::default()).dimensions(), (0, 0));
    }
}
