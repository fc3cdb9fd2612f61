//! Image preprocessing shared by inference and training
//!
//! Pipeline: composite any alpha onto white, resize exactly to a square with a
//! bilinear (triangle) filter, scale to [0, 1] and lay out channel-first.
//! The network was trained on un-normalized [0, 1] inputs, so no mean/std
//! normalization is applied.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::IMAGE_SIZE;

/// Preprocessing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessConfig {
    /// Side length of the square network input
    pub image_size: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
        }
    }
}

/// A single preprocessed image, CHW, shape `[1, 3, H, W]`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
}

impl ImageTensor {
    pub fn height(&self) -> usize {
        self.shape[2]
    }

    pub fn width(&self) -> usize {
        self.shape[3]
    }

    /// Value at channel `c`, row `y`, column `x` of the single batch item
    pub fn at(&self, c: usize, y: usize, x: usize) -> f32 {
        let (h, w) = (self.height(), self.width());
        self.data[c * h * w + y * w + x]
    }
}

/// Composite the image onto an opaque white background.
///
/// Opaque pixels keep their colour, fully transparent pixels become white and
/// partially transparent pixels are blended linearly.
pub fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    out
}

/// Convert an RGB image into a CHW float buffer in [0, 1]
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let plane = width * height;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * width + x as usize;
        data[offset] = pixel[0] as f32 / 255.0;
        data[plane + offset] = pixel[1] as f32 / 255.0;
        data[2 * plane + offset] = pixel[2] as f32 / 255.0;
    }

    data
}

/// Run the full preprocessing pipeline on a decoded image
pub fn preprocess(img: &DynamicImage, config: &PreprocessConfig) -> ImageTensor {
    let size = config.image_size as u32;
    let rgb = flatten_to_rgb(img);
    let resized = if rgb.dimensions() == (size, size) {
        rgb
    } else {
        imageops::resize(&rgb, size, size, FilterType::Triangle)
    };

    ImageTensor {
        data: to_chw(&resized),
        shape: [1, 3, config.image_size, config.image_size],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_opaque_pixels_unchanged() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255])));
        let rgb = flatten_to_rgb(&img);
        assert!(rgb.pixels().all(|p| *p == Rgb([10, 20, 30])));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0])));
        let rgb = flatten_to_rgb(&img);
        assert!(rgb.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_partial_alpha_is_blended_onto_white() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        let rgb = flatten_to_rgb(&DynamicImage::ImageRgba8(img));

        assert_eq!(*rgb.get_pixel(0, 0), Rgb([0, 0, 0]));
        // 255 * (1 - 128/255) = 127
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([127, 127, 127]));
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 30, Rgb([255, 0, 51])));
        let tensor = preprocess(&img, &PreprocessConfig { image_size: 16 });

        assert_eq!(tensor.shape, [1, 3, 16, 16]);
        assert_eq!(tensor.data.len(), 3 * 16 * 16);
        assert!(tensor.data.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((tensor.at(0, 5, 5) - 1.0).abs() < 1e-6);
        assert!(tensor.at(1, 5, 5).abs() < 1e-6);
        assert!((tensor.at(2, 5, 5) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_default_size() {
        assert_eq!(PreprocessConfig::default().image_size, 224);
    }
}
