//! Decoding of surface colour maps.
//!
//! glTF places the UV origin at the top left of an image, which is also the
//! first row of a decoded image buffer, so surface textures are created with
//! vertical flipping disabled. Uploading a flipped fabric would map it upside
//! down onto the mannequin.

use std::borrow::Cow;

use image::{ImageFormat, RgbaImage, imageops::FilterType, load_from_memory_with_format};

use crate::error::TextureError;

/// A decoded RGBA image ready to be put on a material.
#[derive(Debug, PartialEq)]
pub struct SurfaceTexture {
    pub label: String,
    pub image: RgbaImage,
    pub flip_y: bool,
}

impl SurfaceTexture {
    /// Decode `bytes`, guessing the format from the content.
    pub fn decode(bytes: &[u8], label: &str) -> Result<Self, TextureError> {
        Self::decode_with_format(bytes, label, None)
    }

    /// Decode `bytes`. `format` is an optional extension or mime subtype hint (e.g. "png").
    pub fn decode_with_format(
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
    ) -> Result<Self, TextureError> {
        if bytes.is_empty() {
            return Err(TextureError::Empty);
        }
        let img = match format.and_then(ImageFormat::from_extension) {
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
            None => image::load_from_memory(bytes)?,
        };
        Ok(Self {
            label: label.to_string(),
            image: img.to_rgba8(),
            flip_y: false,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Downscale in place so neither side exceeds `max_dimension`. Returns whether the image was resized.
    pub fn fit_within(&mut self, max_dimension: u32) -> bool {
        match fit_image(&self.image, max_dimension) {
            Cow::Owned(resized) => {
                log::info!(
                    "Downscaled {} from {:?} to {:?} to fit the GPU limit of {}px",
                    self.label,
                    self.image.dimensions(),
                    resized.dimensions(),
                    max_dimension
                );
                self.image = resized;
                true
            }
            Cow::Borrowed(_) => false,
        }
    }

    /// The pixels in upload order.
    pub fn oriented(&self) -> Cow<'_, RgbaImage> {
        if self.flip_y {
            Cow::Owned(image::imageops::flip_vertical(&self.image))
        } else {
            Cow::Borrowed(&self.image)
        }
    }
}

/// `image` scaled down to fit a `max_dimension` square, aspect ratio kept.
pub fn fit_image(image: &RgbaImage, max_dimension: u32) -> Cow<'_, RgbaImage> {
    let (width, height) = image.dimensions();
    let max_dimension = max_dimension.max(1);
    if width <= max_dimension && height <= max_dimension {
        return Cow::Borrowed(image);
    }
    let scale = max_dimension as f64 / width.max(height) as f64;
    let fitted_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let fitted_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    Cow::Owned(image::imageops::resize(
        image,
        fitted_width,
        fitted_height,
        FilterType::Triangle,
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn two_row_png() -> Vec<u8> {
        let mut img = RgbaImage::new(1, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decoded_textures_are_not_flipped() {
        let texture = SurfaceTexture::decode(&two_row_png(), "fabric.png").unwrap();
        assert!(!texture.flip_y);
        assert_eq!(texture.dimensions(), (1, 2));
        assert_eq!(texture.oriented().get_pixel(0, 0), &image::Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn flip_policy_reverses_rows() {
        let mut texture = SurfaceTexture::decode(&two_row_png(), "fabric.png").unwrap();
        texture.flip_y = true;
        assert_eq!(texture.oriented().get_pixel(0, 0), &image::Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn oversized_images_are_scaled_to_the_limit() {
        let mut texture = SurfaceTexture {
            label: "photo.jpg".into(),
            image: RgbaImage::new(3000, 8),
            flip_y: false,
        };
        assert!(texture.fit_within(2048));
        assert_eq!(texture.dimensions(), (2048, 5));
        assert!(!texture.fit_within(2048));

        let tall = RgbaImage::new(10, 4000);
        assert_eq!(fit_image(&tall, 2048).dimensions(), (5, 2048));
        assert!(matches!(fit_image(&tall, 4096), Cow::Borrowed(_)));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = SurfaceTexture::decode(b"definitely not an image", "notes.txt").unwrap_err();
        assert!(matches!(err, TextureError::Decode(_)));
        assert!(matches!(SurfaceTexture::decode(&[], "empty.png"), Err(TextureError::Empty)));
    }
}
