//! Environment maps from panoramic HDR images.
//!
//! An equirectangular Radiance HDR is turned into two things: the float
//! panorama itself, used as a skybox, and a nine coefficient spherical
//! harmonic projection of its cosine convolved radiance, used as diffuse
//! image based lighting. The decoded source image is consumed by the
//! conversion and the panorama pixels are handed over to the GPU exactly once.
//!
//! Directions use the same mapping as the skybox shader: `v = 0` is straight
//! up (+Y), `u` turns around the Y axis starting at -X.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector3};
use image::Rgb32FImage;

use crate::{error::LoadError, resources::fetch::load_binary};

/// Cosine lobe convolution per SH band.
const BAND_WEIGHTS: [f32; 3] = [PI, 2.0 * PI / 3.0, PI / 4.0];

pub type Irradiance = [[f32; 3]; 9];

#[derive(Debug)]
pub struct EnvironmentMap {
    width: u32,
    height: u32,
    radiance: Option<Vec<f32>>,
    irradiance: Irradiance,
}

impl EnvironmentMap {
    /// Convert a decoded equirectangular panorama.
    pub fn from_equirectangular(source: Rgb32FImage) -> Self {
        let (width, height) = source.dimensions();
        let mut coefficients = [[0.0f32; 3]; 9];
        let mut radiance = Vec::with_capacity((width * height * 4) as usize);
        let d_phi = 2.0 * PI / width as f32;
        let d_theta = PI / height as f32;

        for (x, y, pixel) in source.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            radiance.extend_from_slice(&[r, g, b, 1.0]);

            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let theta = v * PI;
            let solid_angle = d_phi * d_theta * theta.sin();
            let basis = sh_basis(direction(u, v));
            for (coefficient, y_lm) in coefficients.iter_mut().zip(basis) {
                let weight = y_lm * solid_angle;
                coefficient[0] += r * weight;
                coefficient[1] += g * weight;
                coefficient[2] += b * weight;
            }
        }

        for (idx, coefficient) in coefficients.iter_mut().enumerate() {
            let band = match idx {
                0 => 0,
                1..=3 => 1,
                _ => 2,
            };
            coefficient.iter_mut().for_each(|c| *c *= BAND_WEIGHTS[band]);
        }

        Self {
            width,
            height,
            radiance: Some(radiance),
            irradiance: coefficients,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Cosine convolved SH coefficients, ready for the shader.
    pub fn irradiance(&self) -> &Irradiance {
        &self.irradiance
    }

    /// Irradiance arriving at a surface facing `normal`.
    pub fn irradiance_at(&self, normal: Vector3<f32>) -> [f32; 3] {
        let basis = sh_basis(normal.normalize());
        let mut out = [0.0f32; 3];
        for (coefficient, y_lm) in self.irradiance.iter().zip(basis) {
            out[0] += coefficient[0] * y_lm;
            out[1] += coefficient[1] * y_lm;
            out[2] += coefficient[2] * y_lm;
        }
        out
    }

    /// The RGBA f32 panorama, until it has been released.
    pub fn radiance(&self) -> Option<&[f32]> {
        self.radiance.as_deref()
    }

    /// Hand the panorama pixels over. Later calls return `None`.
    pub fn release_radiance(&mut self) -> Option<Vec<f32>> {
        self.radiance.take()
    }
}

/// Unit direction for equirectangular coordinates.
pub fn direction(u: f32, v: f32) -> Vector3<f32> {
    let phi = (u - 0.5) * 2.0 * PI;
    let theta = v * PI;
    Vector3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
}

/// Real spherical harmonics up to band 2, in the order the shader expects.
pub fn sh_basis(n: Vector3<f32>) -> [f32; 9] {
    [
        0.282095,
        0.488603 * n.y,
        0.488603 * n.z,
        0.488603 * n.x,
        1.092548 * n.x * n.y,
        1.092548 * n.y * n.z,
        0.315392 * (3.0 * n.z * n.z - 1.0),
        1.092548 * n.x * n.z,
        0.546274 * (n.x * n.x - n.y * n.y),
    ]
}

/// Decode Radiance HDR bytes into an environment map.
pub fn decode_environment(bytes: &[u8], path: &str) -> Result<EnvironmentMap, LoadError> {
    let source = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)
        .map_err(|source| LoadError::Environment {
            path: path.to_string(),
            source,
        })?
        .into_rgb32f();
    Ok(EnvironmentMap::from_equirectangular(source))
}

pub async fn load_environment(path: &str, root: &str) -> Result<EnvironmentMap, LoadError> {
    let bytes = load_binary(path, root)
        .await
        .map_err(|source| LoadError::Fetch {
            path: path.to_string(),
            source,
        })?;
    decode_environment(&bytes, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(width: u32, height: u32, value: f32) -> Rgb32FImage {
        Rgb32FImage::from_pixel(width, height, image::Rgb([value, value, value]))
    }

    #[test]
    fn constant_sky_gives_pi_times_radiance_everywhere() {
        let env = EnvironmentMap::from_equirectangular(uniform(64, 32, 2.0));
        for normal in [Vector3::unit_x(), Vector3::unit_y(), -Vector3::unit_z()] {
            let [r, g, b] = env.irradiance_at(normal);
            let expected = PI * 2.0;
            for channel in [r, g, b] {
                assert!((channel - expected).abs() / expected < 0.02, "{channel} vs {expected}");
            }
        }
    }

    #[test]
    fn bright_sky_lights_upward_faces() {
        let mut source = uniform(64, 32, 0.0);
        for y in 0..16 {
            for x in 0..64 {
                source.put_pixel(x, y, image::Rgb([1.0, 1.0, 1.0]));
            }
        }
        let env = EnvironmentMap::from_equirectangular(source);
        let up = env.irradiance_at(Vector3::unit_y())[0];
        let down = env.irradiance_at(-Vector3::unit_y())[0];
        assert!(up > down * 4.0, "up {up} down {down}");
    }

    #[test]
    fn radiance_is_released_once() {
        let mut env = EnvironmentMap::from_equirectangular(uniform(4, 2, 1.0));
        assert_eq!(env.radiance().map(<[f32]>::len), Some(4 * 2 * 4));
        assert!(env.release_radiance().is_some());
        assert!(env.release_radiance().is_none());
        assert_eq!(env.dimensions(), (4, 2));
    }

    #[test]
    fn mapping_matches_the_poles() {
        assert!((direction(0.5, 0.0) - Vector3::unit_y()).magnitude() < 1e-5);
        assert!((direction(0.5, 1.0) + Vector3::unit_y()).magnitude() < 1e-5);
    }

    #[test]
    fn non_hdr_bytes_are_rejected() {
        let err = decode_environment(b"#?NOT", "sky.hdr").unwrap_err();
        assert!(matches!(err, LoadError::Environment { .. }));
    }
}
