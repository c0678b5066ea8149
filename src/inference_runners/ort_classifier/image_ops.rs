//! Functions to preprocess images.
//!
//! The chain is fixed: shorter side resized to 256, ten 224×224 crops
//! (four corners and the center, then the same on the mirrored image),
//! CHW float conversion and per-channel normalization.

use anyhow::{bail, Result};
use fast_image_resize::{
    images::Image as FirImage,
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::{Array, IxDyn};
use crate::data::X;
use crate::utils::round_half_even;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const N_CROPS: usize = 10;

/// Resize + ten-crop + normalize.
#[derive(Debug, Clone)]
pub struct TenCrop {
    resize: u32,
    crop: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Default for TenCrop {
    fn default() -> Self {
        Self {
            resize: 256,
            crop: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl TenCrop {
    pub fn new(resize: u32, crop: u32) -> Self {
        Self {
            resize,
            crop,
            ..Default::default()
        }
    }

    /// Output size when the shorter side becomes `resize`; the longer side is truncated.
    pub fn resized_dims(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= height {
            let long = (self.resize as u64 * height as u64 / width.max(1) as u64) as u32;
            (self.resize, long)
        } else {
            let long = (self.resize as u64 * width as u64 / height.max(1) as u64) as u32;
            (long, self.resize)
        }
    }

    /// Top-left corners of the five crops: tl, tr, bl, br, center.
    pub fn crop_origins(&self, width: u32, height: u32) -> [(u32, u32); 5] {
        let (right, bottom) = (width.saturating_sub(self.crop), height.saturating_sub(self.crop));
        let center_x = round_half_even(right as f64 / 2.0) as u32;
        let center_y = round_half_even(bottom as f64 / 2.0) as u32;
        [
            (0, 0),
            (right, 0),
            (0, bottom),
            (right, bottom),
            (center_x, center_y),
        ]
    }

    /// Runs the whole chain on one RGB image, giving `[10, 3, crop, crop]`.
    pub fn apply(&self, image: RgbImage) -> Result<X> {
        if image.width() == 0 || image.height() == 0 {
            bail!("Cannot transform an empty image");
        }
        if self.resize < self.crop {
            bail!("Resize target {} is smaller than the crop size {}", self.resize, self.crop);
        }
        let (width, height) = self.resized_dims(image.width(), image.height());
        let resized = if (width, height) == image.dimensions() {
            to_fir_image(image)?
        } else {
            let mut resizer = Resizer::new();
            let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
            resize_image(&to_fir_image(image)?, width, height, &mut resizer, &options)?
        };

        let crop = self.crop as usize;
        let plane = crop * crop;
        let crop_len = 3 * plane;
        let mut out = vec![0.0f32; N_CROPS * crop_len];

        let origins = self.crop_origins(width, height);
        for (k, flip) in [false, true].into_iter().enumerate() {
            for (j, &(x0, y0)) in origins.iter().enumerate() {
                let i = k * origins.len() + j;
                let dst = &mut out[i * crop_len..(i + 1) * crop_len];
                self.write_crop(&resized, x0, y0, flip, dst);
            }
        }

        let x = Array::from_shape_vec(IxDyn(&[N_CROPS, 3, crop, crop]), out)?;
        Ok(X::from(x))
    }

    /// Copies one crop into `dst` as normalized CHW. With `flip`, the origin is
    /// taken on the mirrored image.
    fn write_crop(&self, img: &FirImage, x0: u32, y0: u32, flip: bool, dst: &mut [f32]) {
        let buf = img.buffer();
        let width = img.width() as usize;
        let crop = self.crop as usize;
        let plane = crop * crop;
        let (x0, y0) = (x0 as usize, y0 as usize);

        for y in 0..crop {
            let row = (y0 + y) * width;
            for x in 0..crop {
                let src_x = if flip { width - 1 - (x0 + x) } else { x0 + x };
                let px = 3 * (row + src_x);
                let o = y * crop + x;
                for c in 0..3 {
                    let v = buf[px + c] as f32 / 255.0;
                    dst[c * plane + o] = (v - self.mean[c]) / self.std[c];
                }
            }
        }
    }
}

pub fn to_fir_image<'a>(image: RgbImage) -> Result<FirImage<'a>> {
    let (width, height) = image.dimensions();
    let buffer = image.into_raw();
    Ok(FirImage::from_vec_u8(width, height, buffer, PixelType::U8x3)?)
}

fn resize_image<'a>(
    img: &FirImage,
    target_w: u32,
    target_h: u32,
    resizer: &mut Resizer,
    config: &ResizeOptions,
) -> Result<FirImage<'a>> {
    let mut dst = FirImage::new(target_w, target_h, PixelType::U8x3);
    resizer.resize(img, &mut dst, config)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn normalized(v: u8, c: usize) -> f32 {
        (v as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
    }

    #[test]
    fn shorter_side_goes_to_256() {
        let t = TenCrop::default();
        assert_eq!(t.resized_dims(300, 600), (256, 512));
        assert_eq!(t.resized_dims(640, 480), (341, 256));
        assert_eq!(t.resized_dims(256, 256), (256, 256));
    }

    #[test]
    fn center_crop_rounds_half_to_even() {
        let t = TenCrop::default();
        assert_eq!(t.crop_origins(256, 256)[4], (16, 16));
        assert_eq!(t.crop_origins(257, 259)[4], (16, 18));
        assert_eq!(t.crop_origins(341, 256)[1], (117, 0));
        assert_eq!(t.crop_origins(341, 256)[3], (117, 32));
    }

    #[test]
    fn output_shape() {
        let image = RgbImage::from_pixel(300, 280, Rgb([10, 20, 30]));
        let x = TenCrop::default().apply(image).unwrap();
        assert_eq!(x.shape(), &[10, 3, 224, 224]);
    }

    #[test]
    fn uniform_image_normalizes_to_constants() {
        let image = RgbImage::from_pixel(256, 256, Rgb([128, 64, 200]));
        let x = TenCrop::default().apply(image).unwrap();
        for (c, v) in [128u8, 64, 200].into_iter().enumerate() {
            let expected = normalized(v, c);
            assert!(x.index_axis(ndarray::Axis(1), c).iter().all(|&p| (p - expected).abs() < 1e-6));
        }
    }

    #[test]
    fn crops_follow_corner_then_mirror_order() {
        // red channel encodes the column
        let image = RgbImage::from_fn(256, 256, |x, _| Rgb([x as u8, 0, 0]));
        let x = TenCrop::default().apply(image).unwrap();
        let first_red = |i: usize| x[&[i, 0, 0, 0][..]];

        assert_eq!(first_red(0), normalized(0, 0));
        assert_eq!(first_red(1), normalized(32, 0));
        assert_eq!(first_red(4), normalized(16, 0));
        // mirrored top-left starts at the right edge of the source image
        assert_eq!(first_red(5), normalized(255, 0));
        assert_eq!(first_red(6), normalized(255 - 32, 0));
        assert_eq!(first_red(9), normalized(255 - 16, 0));
    }

    #[test]
    fn rejects_inverted_sizes() {
        let image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        assert!(TenCrop::new(200, 224).apply(image).is_err());
    }
}
