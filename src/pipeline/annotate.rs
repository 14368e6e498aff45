use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::pipeline::crop::CropSelection;

pub const STROKE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const STROKE_WIDTH: u32 = 5;

/// Draws the suggested crop on a copy of the original. The outline's outer
/// edge passes through `(x, y)` and `(x + width, y + height)` and the stroke
/// grows inward. Returns `None` for a full-frame selection: there is no
/// suggestion to show.
pub fn render_annotation(original: &RgbImage, selection: &CropSelection) -> Option<RgbImage> {
    let CropSelection::Suggested(region) = selection else {
        return None;
    };

    let mut annotated = original.clone();
    for inset in 0..STROKE_WIDTH {
        let width = (region.width + 1).saturating_sub(inset * 2);
        let height = (region.height + 1).saturating_sub(inset * 2);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(&mut annotated, rect, STROKE_COLOR);
    }
    Some(annotated)
}
