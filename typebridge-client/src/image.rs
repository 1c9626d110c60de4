//! Grayscale images printed as a grid of dots

/// Tallest image `Typewriter::print_image` accepts, in rows
pub const MAX_IMAGE_HEIGHT: u32 = 300;

/// Pixels below this luma are printed
const DARK_THRESHOLD: u8 = 128;

/// 8-bit grayscale image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotImage {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl DotImage {
    /// Wrap `luma`, which must hold exactly `width * height` pixels
    pub fn from_luma(width: u32, height: u32, luma: Vec<u8>) -> Option<Self> {
        let len = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        (luma.len() == len).then_some(Self {
            width,
            height,
            luma,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.luma.get((y * self.width + x) as usize).copied()
    }

    /// Reduce to black and white with Floyd-Steinberg error diffusion
    pub fn dither(&mut self) {
        let width = self.width as usize;
        let height = self.height as usize;
        let mut level: Vec<i32> = self.luma.iter().map(|&l| i32::from(l)).collect();

        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                let old = level[i].clamp(0, 255);
                let new = if old < i32::from(DARK_THRESHOLD) { 0 } else { 255 };
                self.luma[i] = new as u8;

                let error = old - new;
                let mut diffuse = |dx: isize, dy: usize, weight: i32| {
                    let Some(nx) = x.checked_add_signed(dx).filter(|&nx| nx < width) else {
                        return;
                    };
                    let ny = y + dy;
                    if ny < height {
                        level[ny * width + nx] += error * weight / 16;
                    }
                };
                diffuse(1, 0, 7);
                diffuse(-1, 1, 3);
                diffuse(0, 1, 5);
                diffuse(1, 1, 1);
            }
        }
    }

    /// Coordinates of dark pixels, row by row
    pub fn dots(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width.max(1);
        self.luma
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l < DARK_THRESHOLD)
            .map(move |(i, _)| (i as u32 % width, i as u32 / width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_luma_checks_size() {
        assert!(DotImage::from_luma(2, 2, vec![0; 4]).is_some());
        assert!(DotImage::from_luma(2, 2, vec![0; 3]).is_none());
        assert!(DotImage::from_luma(0, 5, Vec::new()).is_some());
    }

    #[test]
    fn test_dots_are_dark_pixels_in_row_order() {
        let image = DotImage::from_luma(3, 2, vec![0, 255, 127, 128, 10, 255]).unwrap();
        let dots: Vec<_> = image.dots().collect();
        assert_eq!(dots, vec![(0, 0), (2, 0), (1, 1)]);
    }

    #[test]
    fn test_dither_is_bilevel() {
        let mut black = DotImage::from_luma(4, 4, vec![0; 16]).unwrap();
        black.dither();
        assert_eq!(black.dots().count(), 16);

        let mut white = DotImage::from_luma(4, 4, vec![255; 16]).unwrap();
        white.dither();
        assert_eq!(white.dots().count(), 0);

        let mut gray = DotImage::from_luma(8, 8, vec![127; 64]).unwrap();
        gray.dither();
        assert!((0..64).all(|i| matches!(gray.luma(i % 8, i / 8), Some(0 | 255))));
        let dark = gray.dots().count();
        assert!(dark > 16 && dark < 48, "{dark} dark pixels");
    }

    #[test]
    fn test_luma_out_of_bounds() {
        let image = DotImage::from_luma(2, 1, vec![1, 2]).unwrap();
        assert_eq!(image.luma(1, 0), Some(2));
        assert_eq!(image.luma(2, 0), None);
        assert_eq!(image.luma(0, 1), None);
    }
}
