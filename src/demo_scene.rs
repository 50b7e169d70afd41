use std::collections::HashMap;
use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use wgpu::util::DeviceExt;

use wgpu_passes::renderer::pipeline_builder::{create_shader, uniform_entry};
use wgpu_passes::renderer::{cube_mesh, ModelInstance, PipelineBuilder, Vertex, HDR_FORMAT};
use wgpu_passes::scene::{DepthShader, DrawTarget, LightingUniform, SceneObjects};
use wgpu_passes::{GpuContext, RenderContext};

const DEMO_SHADER: &str = include_str!("shader/demo.wgsl");

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    camera_position: [f32; 4],
    bloom: [f32; 4],
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    color_formats: Vec<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
    front_face: wgpu::FrontFace,
}

impl PipelineKey {
    fn from_target(target: &DrawTarget<'_>) -> Self {
        Self {
            color_formats: target.color_formats.to_vec(),
            depth_format: target.depth_format,
            front_face: target.front_face,
        }
    }

    fn fragment_entry(&self) -> &'static str {
        match self.color_formats.as_slice() {
            [_, _] => "fs_bright",
            [format] if *format == HDR_FORMAT => "fs_hdr",
            _ => "fs_ldr",
        }
    }
}

struct Spinner {
    position: Vec3,
    axis: Vec3,
    speed: f32,
    scale: f32,
}

/// A ring of spinning cubes on a floor slab, drawn instanced with one
/// material whose pipelines are built lazily per draw target.
pub struct SpinningCubes {
    device: wgpu::Device,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    instance_buffer: wgpu::Buffer,
    spinners: Vec<Spinner>,
    frame_uniform: wgpu::Buffer,
    lighting_uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    shader: wgpu::ShaderModule,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl SpinningCubes {
    pub fn new(gpu: &GpuContext, count: usize) -> Self {
        let device = &gpu.device;
        let (vertices, indices) = cube_mesh();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("CubeVertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("CubeIndices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut spinners: Vec<Spinner> = (0..count)
            .map(|i| {
                let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
                Spinner {
                    position: Vec3::new(angle.cos() * 3.0, 0.75, angle.sin() * 3.0),
                    axis: Vec3::new(angle.sin(), 1.0, angle.cos()).normalize(),
                    speed: 0.5 + i as f32 * 0.15,
                    scale: 0.8,
                }
            })
            .collect();
        // Floor slab.
        spinners.push(Spinner {
            position: Vec3::new(0.0, -10.0, 0.0),
            axis: Vec3::Y,
            speed: 0.0,
            scale: 20.0,
        });

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("CubeInstances"),
            size: (spinners.len() * mem::size_of::<ModelInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_size = mem::size_of::<FrameUniform>() as u64;
        let lighting_size = mem::size_of::<LightingUniform>() as u64;
        let frame_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DemoFrameUniform"),
            size: frame_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lighting_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DemoLightingUniform"),
            size: lighting_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("DemoLayout"),
            entries: &[
                uniform_entry(0, visibility, frame_size),
                uniform_entry(1, visibility, lighting_size),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("DemoBindGroup"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_uniform.as_entire_binding(),
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("DemoPipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let mut cubes = Self {
            device: device.clone(),
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            instance_buffer,
            spinners,
            frame_uniform,
            lighting_uniform,
            bind_group,
            shader: create_shader(device, "Demo", DEMO_SHADER),
            pipeline_layout,
            pipelines: HashMap::new(),
        };
        cubes.update(&gpu.queue, 0.0);
        cubes
    }

    /// Advances every cube to its orientation at `time` seconds.
    pub fn update(&mut self, queue: &wgpu::Queue, time: f32) {
        let instances: Vec<ModelInstance> = self
            .spinners
            .iter()
            .map(|spinner| {
                ModelInstance::new(Mat4::from_scale_rotation_translation(
                    Vec3::splat(spinner.scale),
                    Quat::from_axis_angle(spinner.axis, spinner.speed * time),
                    spinner.position,
                ))
            })
            .collect();
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
    }

    pub fn instance_count(&self) -> u32 {
        self.spinners.len() as u32
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..self.instance_count());
    }
}

impl SceneObjects for SpinningCubes {
    fn render_all(
        &mut self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        target: &DrawTarget<'_>,
        context: &RenderContext<'_>,
    ) {
        let frame = FrameUniform {
            view_proj: context.view_projection.to_cols_array_2d(),
            camera_position: context.camera.position.extend(1.0).to_array(),
            bloom: [context.bloom.threshold_min, context.bloom.threshold_max, 0.0, 0.0],
        };
        queue.write_buffer(&self.frame_uniform, 0, bytemuck::bytes_of(&frame));
        queue.write_buffer(
            &self.lighting_uniform,
            0,
            bytemuck::bytes_of(&LightingUniform::from_lighting(context.lighting)),
        );

        let key = PipelineKey::from_target(target);
        let device = &self.device;
        let shader = &self.shader;
        let layout = &self.pipeline_layout;
        let pipeline = self.pipelines.entry(key).or_insert_with_key(|key| {
            log::debug!(
                "Demo material: building pipeline for {:?} / {:?} / {:?}",
                key.color_formats,
                key.depth_format,
                key.front_face
            );
            let mut builder = PipelineBuilder::new(device, layout, shader)
                .with_label("DemoMaterial")
                .with_fragment_entry(key.fragment_entry())
                .with_vertex_buffer(Vertex::layout())
                .with_vertex_buffer(ModelInstance::layout())
                .with_front_face(key.front_face);
            for &format in &key.color_formats {
                builder = builder.with_color_target(format, None);
            }
            if let Some(depth) = key.depth_format {
                builder = builder.with_depth_stencil(depth, true, wgpu::CompareFunction::Less);
            }
            builder.build()
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        self.draw(pass);
    }

    fn render_depth(&mut self, pass: &mut wgpu::RenderPass<'_>, shader: &DepthShader<'_>) {
        shader.bind(pass);
        self.draw(pass);
    }
}
