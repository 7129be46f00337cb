//! Render surface size and the camera projection that depends on it.

use cgmath::Rad;

use crate::camera::Projection;

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    width: u32,
    height: u32,
    projection: Projection,
}

impl Viewport {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            projection: Projection::new(width, height, fovy, znear, zfar),
        }
    }

    /// Match the surface to the window and recompute the aspect ratio.
    ///
    /// Returns `false` for a zero sized (minimised) window, which is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.width = width;
        self.height = height;
        self.projection.resize(width, height);
        true
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.projection.aspect()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}
