//! EXIF orientation correction
//!
//! Orientation codes 1..8 map to a clockwise rotation followed by an optional
//! flip. Codes outside the range clamp into it.

use image::DynamicImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    None,
    Horizontal,
    Vertical,
}

/// Rotation (clockwise degrees) then flip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub degrees: u16,
    pub flip: Flip,
}

/// Indexed by orientation code - 1
const TABLE: [Orientation; 8] = [
    Orientation { degrees: 0, flip: Flip::None },
    Orientation { degrees: 0, flip: Flip::Horizontal },
    Orientation { degrees: 180, flip: Flip::None },
    Orientation { degrees: 180, flip: Flip::Horizontal },
    Orientation { degrees: 90, flip: Flip::Horizontal },
    Orientation { degrees: 90, flip: Flip::None },
    Orientation { degrees: 270, flip: Flip::Horizontal },
    Orientation { degrees: 270, flip: Flip::None },
];

impl Orientation {
    pub const IDENTITY: Orientation = TABLE[0];

    pub fn from_exif(code: i64) -> Self {
        TABLE[(code.clamp(1, 8) - 1) as usize]
    }

    /// True for 90 and 270 degrees: displayed width is the raw height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self.degrees, 90 | 270)
    }

    /// Displayed dimensions of a raw `width`×`height` buffer
    pub fn displayed(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        let rotated = match self.degrees {
            90 => image.rotate90(),
            180 => image.rotate180(),
            270 => image.rotate270(),
            _ => image,
        };
        match self.flip {
            Flip::None => rotated,
            Flip::Horizontal => rotated.fliph(),
            Flip::Vertical => rotated.flipv(),
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn test_codes_clamp_into_range() {
        assert_eq!(Orientation::from_exif(0), Orientation::from_exif(1));
        assert_eq!(Orientation::from_exif(-5), Orientation::IDENTITY);
        assert_eq!(Orientation::from_exif(42), Orientation::from_exif(8));
    }

    #[test]
    fn test_degrees_and_swap_for_every_code() {
        for code in 1..=8 {
            let o = Orientation::from_exif(code);
            assert!([0, 90, 180, 270].contains(&o.degrees));
            assert_eq!(o.swaps_dimensions(), o.degrees == 90 || o.degrees == 270);
            assert_eq!(o.swaps_dimensions(), code >= 5);
        }
    }

    #[test]
    fn test_code_six_is_quarter_turn_without_flip() {
        let o = Orientation::from_exif(6);
        assert_eq!(o.degrees, 90);
        assert_eq!(o.flip, Flip::None);
        assert_eq!(o.displayed(4000, 3000), (3000, 4000));
    }

    #[test]
    fn test_apply_rotates_clockwise() {
        // 2x1: red on the left, blue on the right
        let mut raw = RgbImage::new(2, 1);
        raw.put_pixel(0, 0, Rgb([255, 0, 0]));
        raw.put_pixel(1, 0, Rgb([0, 0, 255]));

        let out = Orientation::from_exif(6).apply(DynamicImage::ImageRgb8(raw));
        assert_eq!(out.dimensions(), (1, 2));
        // Clockwise: left edge moves to the top
        assert_eq!(out.to_rgb8().get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(out.to_rgb8().get_pixel(0, 1), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_apply_mirror() {
        let mut raw = RgbImage::new(2, 1);
        raw.put_pixel(0, 0, Rgb([255, 0, 0]));
        let out = Orientation::from_exif(2).apply(DynamicImage::ImageRgb8(raw));
        assert_eq!(out.to_rgb8().get_pixel(1, 0), &Rgb([255, 0, 0]));
    }
}
