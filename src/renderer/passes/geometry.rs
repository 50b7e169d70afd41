use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::error::RenderError;
use crate::gpu::GpuContext;
use crate::renderer::pipeline_builder::{create_shader, create_uniform_buffer, uniform_entry};
use crate::renderer::{ModelInstance, PipelineBuilder, Vertex};
use crate::scene::DepthShader;

const GEOMETRY_SHADER: &str = include_str!("../../shader/geometry.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub(crate) struct GeometryUniform {
    view_proj: [[f32; 4]; 4],
    params: [f32; 4],
}

impl GeometryUniform {
    pub(crate) fn new(view_proj: Mat4, params: Vec4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            params: params.to_array(),
        }
    }
}

/// A geometry-only pipeline plus the uniform it reads, handed to scene
/// objects through [`DepthShader`].
pub(crate) struct GeometryProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl GeometryProgram {
    /// Builds the program. `configure` picks entry points and targets on a
    /// builder that already carries the vertex layouts.
    pub(crate) fn new(
        gpu: &GpuContext,
        label: &str,
        configure: impl for<'b> FnOnce(PipelineBuilder<'b>) -> PipelineBuilder<'b>,
    ) -> Result<Self, RenderError> {
        gpu.compiled(label, |device| {
            let shader = create_shader(device, label, GEOMETRY_SHADER);
            let uniform_size = mem::size_of::<GeometryUniform>() as u64;

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label}Layout")),
                entries: &[uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    uniform_size,
                )],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label}PipelineLayout")),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

            let builder = PipelineBuilder::new(device, &pipeline_layout, &shader)
                .with_label(label)
                .with_vertex_buffer(Vertex::layout())
                .with_vertex_buffer(ModelInstance::layout());
            let pipeline = configure(builder).build();

            let uniform_buffer =
                create_uniform_buffer(device, &format!("{label}Uniform"), uniform_size);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label}BindGroup")),
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            Self {
                pipeline,
                uniform_buffer,
                bind_group,
            }
        })
    }

    pub(crate) fn write(&self, queue: &wgpu::Queue, uniform: GeometryUniform) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub(crate) fn shader(&self) -> DepthShader<'_> {
        DepthShader::new(&self.pipeline, &self.bind_group)
    }
}
