//! Nine-color blur-up placeholder

use image::imageops::FilterType;
use image::DynamicImage;

const TINY_SIZE: u32 = 11;

/// Resize to 11x11 and sample the center of each 3x3 block inside a 1px border
///
/// Returns nine `#rrggbb` strings in row-major order.
pub fn tiny_proxy(image: &DynamicImage) -> Vec<String> {
    let small = image
        .resize_exact(TINY_SIZE, TINY_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let mut colors = Vec::with_capacity(9);
    for y in 0..3 {
        for x in 0..3 {
            let pixel = small.get_pixel(x * 3 + 2, y * 3 + 2);
            colors.push(format!(
                "#{:02x}{:02x}{:02x}",
                pixel[0], pixel[1], pixel[2]
            ));
        }
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn rgb(hex: &str) -> [i32; 3] {
        let v = u32::from_str_radix(hex.trim_start_matches('#'), 16).unwrap();
        [(v >> 16) as i32 & 0xff, (v >> 8) as i32 & 0xff, v as i32 & 0xff]
    }

    fn close_to(hex: &str, expected: [i32; 3]) -> bool {
        rgb(hex)
            .iter()
            .zip(expected.iter())
            .all(|(a, b)| (a - b).abs() <= 2)
    }

    #[test]
    fn test_solid_image_yields_nine_matching_colors() {
        let img = RgbImage::from_pixel(64, 48, Rgb([0x12, 0xab, 0xef]));
        let colors = tiny_proxy(&DynamicImage::ImageRgb8(img));
        assert_eq!(colors.len(), 9);
        assert!(colors.iter().all(|c| c.len() == 7 && c.starts_with('#')));
        assert!(colors.iter().all(|c| close_to(c, [0x12, 0xab, 0xef])));
    }

    #[test]
    fn test_left_and_right_halves_map_to_outer_columns() {
        let img = RgbImage::from_fn(90, 90, |x, _| {
            if x < 45 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let colors = tiny_proxy(&DynamicImage::ImageRgb8(img));
        assert!(close_to(&colors[0], [255, 0, 0]));
        assert!(close_to(&colors[2], [0, 0, 255]));
        assert!(close_to(&colors[6], [255, 0, 0]));
    }
}
