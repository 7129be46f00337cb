use wgpu::util::DeviceExt;

use crate::resources::environment::EnvironmentMap;

/// Ambient radiance used while no environment is installed.
pub const FLAT_AMBIENT: [f32; 3] = [0.8, 0.8, 0.8];

const SH_Y00: f32 = 0.282095;

#[derive(Debug)]
pub struct EnvironmentResources {
    pub uniform: EnvironmentUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// Diffuse lighting as nine SH irradiance coefficients.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EnvironmentUniform {
    // Only xyz is used, w pads every coefficient to 16 bytes
    sh: [[f32; 4]; 9],
    // x: intensity
    params: [f32; 4],
}

impl EnvironmentUniform {
    /// Irradiance of a uniform sky of `radiance`.
    pub fn flat(radiance: [f32; 3], intensity: f32) -> Self {
        let mut sh = [[0.0; 4]; 9];
        let pi = std::f32::consts::PI;
        sh[0] = [
            pi * radiance[0] / SH_Y00,
            pi * radiance[1] / SH_Y00,
            pi * radiance[2] / SH_Y00,
            0.0,
        ];
        Self {
            sh,
            params: [intensity, 0.0, 0.0, 0.0],
        }
    }

    pub fn from_environment(environment: &EnvironmentMap, intensity: f32) -> Self {
        let mut sh = [[0.0; 4]; 9];
        for (dst, [r, g, b]) in sh.iter_mut().zip(environment.irradiance()) {
            *dst = [*r, *g, *b, 0.0];
        }
        Self {
            sh,
            params: [intensity, 0.0, 0.0, 0.0],
        }
    }

    /// One SH coefficient without its padding.
    pub fn coefficient(&self, idx: usize) -> [f32; 3] {
        let [r, g, b, _] = self.sh[idx];
        [r, g, b]
    }
}

impl Default for EnvironmentUniform {
    fn default() -> Self {
        Self::flat(FLAT_AMBIENT, 1.0)
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("environment_bind_group_layout"),
    })
}

impl EnvironmentResources {
    pub fn new(device: &wgpu::Device, uniform: EnvironmentUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Environment Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("environment_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, uniform: EnvironmentUniform) {
        self.uniform = uniform;
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_fallback_reproduces_ambient() {
        let uniform = EnvironmentUniform::flat([0.5, 0.25, 1.0], 1.0);
        // The shader divides the irradiance by pi for a lambertian surface
        let [r, g, b] = uniform.coefficient(0);
        let pi = std::f32::consts::PI;
        assert!((r * SH_Y00 / pi - 0.5).abs() < 1e-6);
        assert!((g * SH_Y00 / pi - 0.25).abs() < 1e-6);
        assert!((b * SH_Y00 / pi - 1.0).abs() < 1e-6);
        assert_eq!(std::mem::size_of::<EnvironmentUniform>(), 160);
    }
}
