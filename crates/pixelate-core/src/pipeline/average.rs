//! Per-chunk color averaging.

use image::Rgba;

use super::grid::Region;
use crate::types::Raster;

/// Computes the single color a chunk is replaced with.
///
/// Implementations must be stateless: any worker may run any chunk.
pub trait ChunkProcessor: Send + Sync {
    fn process(&self, raster: &Raster, region: Region) -> Rgba<u8>;
}

/// Arithmetic mean of each channel, rounded half away from zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanColor;

impl ChunkProcessor for MeanColor {
    fn process(&self, raster: &Raster, region: Region) -> Rgba<u8> {
        average_region(raster, region)
    }
}

/// Average every channel of `region` independently.
///
/// An empty region averages to transparent black.
pub fn average_region(raster: &Raster, region: Region) -> Rgba<u8> {
    let count = region.pixel_count();
    if count == 0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut sums = [0u64; 4];
    for y in region.start_y..region.end_y {
        for x in region.start_x..region.end_x {
            let Rgba(px) = *raster.get_pixel(x, y);
            for (sum, value) in sums.iter_mut().zip(px) {
                *sum += value as u64;
            }
        }
    }

    Rgba(sums.map(|sum| rounded_mean(sum, count)))
}

/// `round(sum / count)` with halves rounded up, clamped to a byte.
///
/// Sums are non-negative, so rounding half up is rounding half away from zero.
fn rounded_mean(sum: u64, count: u64) -> u8 {
    let mean = (2 * sum + count) / (2 * count);
    mean.min(u8::MAX as u64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_uniform_region_is_unchanged() {
        let color = Rgba([100, 150, 200, 255]);
        let raster = RgbaImage::from_pixel(25, 12, color);
        assert_eq!(average_region(&raster, Region::new(0, 0, 25, 12)), color);
        assert_eq!(average_region(&raster, Region::new(20, 10, 25, 12)), color);
    }

    #[test]
    fn test_single_pixel_region() {
        let mut raster = RgbaImage::new(3, 3);
        raster.put_pixel(1, 2, Rgba([7, 8, 9, 10]));
        assert_eq!(
            average_region(&raster, Region::new(1, 2, 2, 3)),
            Rgba([7, 8, 9, 10])
        );
    }

    #[test]
    fn test_two_colors_average_per_channel() {
        // Left column (10, 20, 30, 255), right column (20, 41, 0, 0).
        let mut raster = RgbaImage::new(2, 2);
        for y in 0..2 {
            raster.put_pixel(0, y, Rgba([10, 20, 30, 255]));
            raster.put_pixel(1, y, Rgba([20, 41, 0, 0]));
        }
        // 15, 30.5 -> 31, 15, 127.5 -> 128
        assert_eq!(
            average_region(&raster, Region::new(0, 0, 2, 2)),
            Rgba([15, 31, 15, 128])
        );
    }

    #[test]
    fn test_uneven_mix_rounds_to_nearest() {
        // Three pixels of 0 and one of 255: 63.75 -> 64
        let mut raster = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        raster.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        assert_eq!(
            average_region(&raster, Region::new(0, 0, 2, 2)),
            Rgba([64, 64, 64, 64])
        );
    }

    #[test]
    fn test_only_region_pixels_are_sampled() {
        let mut raster = RgbaImage::from_pixel(4, 1, Rgba([255, 0, 0, 255]));
        raster.put_pixel(3, 0, Rgba([0, 0, 255, 255]));
        assert_eq!(
            average_region(&raster, Region::new(0, 0, 3, 1)),
            Rgba([255, 0, 0, 255])
        );
    }

    #[test]
    fn test_rounded_mean_halves_round_up() {
        assert_eq!(rounded_mean(1, 2), 1);
        assert_eq!(rounded_mean(3, 2), 2);
        assert_eq!(rounded_mean(5, 4), 1);
        assert_eq!(rounded_mean(255 * 9, 9), 255);
    }

    #[test]
    fn test_rounded_mean_clamps() {
        assert_eq!(rounded_mean(10_000, 1), 255);
    }

    #[test]
    fn test_empty_region() {
        let raster = RgbaImage::new(2, 2);
        assert_eq!(
            average_region(&raster, Region::new(1, 1, 1, 1)),
            Rgba([0, 0, 0, 0])
        );
    }

    #[test]
    fn test_mean_color_processor() {
        let raster = RgbaImage::from_pixel(5, 5, Rgba([1, 2, 3, 4]));
        let color = MeanColor.process(&raster, Region::new(0, 0, 5, 5));
        assert_eq!(color, Rgba([1, 2, 3, 4]));
    }
}
