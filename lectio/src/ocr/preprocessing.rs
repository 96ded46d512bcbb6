//! Image cleanup before recognition.
//!
//! The chain is: upscale short text to the target height, grayscale, then the
//! grayscale steps in [`STEPS`]: bilateral denoise, CLAHE, Otsu binarization
//! and morphological closing of the foreground. [`Preprocessor::try_enhance`]
//! never fails: any error or panic inside the chain yields the original image.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::bilateral_filter;
use imageproc::morphology::close;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PreprocessConfig;

#[derive(Debug, Error)]
enum PreprocessError {
    #[error("image has no pixels ({0}x{1})")]
    EmptyImage(u32, u32),

    #[error("invalid preprocessing parameter: {0}")]
    InvalidParameter(String),

    #[error("{step} step failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<PreprocessError>,
    },
}

/// A named grayscale transform.
type Step = (
    &'static str,
    fn(&PreprocessConfig, GrayImage) -> Result<GrayImage, PreprocessError>,
);

const STEPS: [Step; 4] = [
    ("denoise", denoise),
    ("equalize", equalize),
    ("binarize", binarize),
    ("close", close_text),
];

/// Output of the filter chain.
#[derive(Debug, Clone)]
pub struct Enhanced {
    pub image: RgbImage,
    /// Factor the image was upscaled by; 1.0 when untouched.
    pub scale: f64,
}

impl Enhanced {
    pub fn unchanged(image: RgbImage) -> Self {
        Self { image, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::default())
    }
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Runs the chain, falling back to a copy of `image` on any failure.
    pub fn try_enhance(&self, image: &RgbImage) -> Enhanced {
        self.run_steps(image, &STEPS)
    }

    fn run_steps(&self, image: &RgbImage, steps: &[Step]) -> Enhanced {
        let start = Instant::now();

        match catch_unwind(AssertUnwindSafe(|| self.enhance(image, steps))) {
            Ok(Ok(enhanced)) => {
                debug!(
                    width = enhanced.image.width(),
                    height = enhanced.image.height(),
                    scale = enhanced.scale,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Preprocessed image"
                );
                enhanced
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Preprocessing failed, using original image");
                Enhanced::unchanged(image.clone())
            }
            Err(_) => {
                warn!("Preprocessing panicked, using original image");
                Enhanced::unchanged(image.clone())
            }
        }
    }

    fn enhance(&self, image: &RgbImage, steps: &[Step]) -> Result<Enhanced, PreprocessError> {
        self.check_scaling()?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage(width, height));
        }

        let scale = upscale_factor(height, self.config.target_height, self.config.max_upscale);
        let mut gray = match scale {
            Some(factor) => {
                let (new_w, new_h) = scaled_dimensions(width, height, factor);
                let resized = imageops::resize(image, new_w, new_h, FilterType::CatmullRom);
                imageops::grayscale(&resized)
            }
            None => imageops::grayscale(image),
        };

        for &(step, apply) in steps {
            gray = apply(&self.config, gray).map_err(|e| PreprocessError::Step {
                step,
                source: Box::new(e),
            })?;
        }

        Ok(Enhanced {
            image: DynamicImage::ImageLuma8(gray).to_rgb8(),
            scale: scale.unwrap_or(1.0),
        })
    }

    fn check_scaling(&self) -> Result<(), PreprocessError> {
        let c = &self.config;
        if c.target_height == 0 {
            return Err(PreprocessError::InvalidParameter(
                "target_height must be positive".into(),
            ));
        }
        if !(c.max_upscale >= 1.0) {
            return Err(PreprocessError::InvalidParameter(format!(
                "max_upscale must be at least 1, got {}",
                c.max_upscale
            )));
        }
        Ok(())
    }
}

fn denoise(c: &PreprocessConfig, gray: GrayImage) -> Result<GrayImage, PreprocessError> {
    if c.bilateral_diameter == 0 || !(c.sigma_color > 0.0) || !(c.sigma_space > 0.0) {
        return Err(PreprocessError::InvalidParameter(
            "bilateral filter needs a positive diameter and sigmas".into(),
        ));
    }
    Ok(bilateral_filter(
        &gray,
        c.bilateral_diameter,
        c.sigma_color,
        c.sigma_space,
    ))
}

fn equalize(c: &PreprocessConfig, gray: GrayImage) -> Result<GrayImage, PreprocessError> {
    if c.clahe_tiles == 0 || !(c.clahe_clip_limit > 0.0) {
        return Err(PreprocessError::InvalidParameter(
            "CLAHE needs a positive tile grid and clip limit".into(),
        ));
    }
    Ok(clahe(&gray, c.clahe_clip_limit, c.clahe_tiles))
}

fn binarize(_: &PreprocessConfig, gray: GrayImage) -> Result<GrayImage, PreprocessError> {
    Ok(threshold(&gray, otsu_level(&gray), ThresholdType::Binary))
}

fn close_text(c: &PreprocessConfig, binary: GrayImage) -> Result<GrayImage, PreprocessError> {
    Ok(close_foreground(binary, c.close_radius))
}

/// Upscale factor bringing `height` to `target`, if it lies in `(1, max]`.
pub fn upscale_factor(height: u32, target: u32, max: f32) -> Option<f64> {
    let scale = f64::from(target) / f64::from(height.max(1));
    (scale > 1.0 && scale <= f64::from(max)).then_some(scale)
}

fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w, h)
}

/// Contrast-limited adaptive histogram equalization on a `tiles`×`tiles` grid.
fn clahe(src: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = src.dimensions();
    let tile_w = width.div_ceil(tiles.min(width));
    let tile_h = height.div_ceil(tiles.min(height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(src, (x0, y0, x1, y1), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let (tx0, tx1, ax) = neighbours(x, tile_w, tiles_x);
        let (ty0, ty1, ay) = neighbours(y, tile_h, tiles_y);
        let v = usize::from(src.get_pixel(x, y)[0]);

        let top = f32::from(lut_at(tx0, ty0)[v]) * (1.0 - ax) + f32::from(lut_at(tx1, ty0)[v]) * ax;
        let bottom =
            f32::from(lut_at(tx0, ty1)[v]) * (1.0 - ax) + f32::from(lut_at(tx1, ty1)[v]) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// Indices of the two tile centres around `pos` and the blend weight between them.
fn neighbours(pos: u32, tile: u32, count: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let lo = (f.floor() as u32).min(count - 1);
    let hi = (lo + 1).min(count - 1);
    (lo, hi, f - f.floor())
}

fn tile_lut(src: &GrayImage, (x0, y0, x1, y1): (u32, u32, u32, u32), clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[usize::from(src.get_pixel(x, y)[0])] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let spread = excess / 256;
    let mut residual = excess % 256;
    for bin in hist.iter_mut() {
        *bin += spread;
    }
    if residual > 0 {
        let step = (256 / residual).max(1) as usize;
        let mut i = 0;
        while i < 256 && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (value, count) in hist.iter().enumerate() {
        cdf += count;
        lut[value] = ((cdf as f32 * 255.0 / area as f32).round()).min(255.0) as u8;
    }
    lut
}

/// Closes the minority class, which after thresholding is the text.
fn close_foreground(mut binary: GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary;
    }

    let total = u64::from(binary.width()) * u64::from(binary.height());
    let dark = binary.pixels().filter(|p| p[0] == 0).count() as u64;
    let dark_text = dark * 2 <= total;

    if dark_text {
        imageops::invert(&mut binary);
    }
    let mut closed = close(&binary, Norm::LInf, radius);
    if dark_text {
        imageops::invert(&mut closed);
    }
    closed
}
