//! Device seam for every Vulkan call the pipeline layer makes.
//!
//! Object creation goes through [`GpuDevice`], command recording through
//! [`CommandRecorder`]. Both are implemented for `ash::Device`; tests use a
//! recording double instead.

use ash::prelude::VkResult;
use ash::vk;

/// Object creation and destruction on a logical device.
///
/// Implementations are called from the thread that owns the device. Handles
/// passed in must have been created by the same device.
pub trait GpuDevice {
    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule>;

    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create one graphics pipeline object. Blocks until the driver is done.
    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;

    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Create a pipeline cache, optionally seeded with previously saved data.
    fn create_pipeline_cache(&self, initial_data: &[u8]) -> VkResult<vk::PipelineCache>;

    fn pipeline_cache_data(&self, cache: vk::PipelineCache) -> VkResult<Vec<u8>>;

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache);

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
}

/// Commands appended to a command buffer in the recording state.
pub trait CommandRecorder {
    fn bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );

    fn bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);

    fn set_line_width(&self, cmd: vk::CommandBuffer, width: f32);

    fn draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
}

impl GpuDevice for ash::Device {
    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        // SAFETY: device is valid, code passed the SPIR-V header check
        unsafe { ash::Device::create_shader_module(self, &create_info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        // SAFETY: no pipeline creation using this module is in flight
        unsafe { ash::Device::destroy_shader_module(self, module, None) }
    }

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        // SAFETY: every pointer in info outlives this call
        let pipelines = unsafe {
            ash::Device::create_graphics_pipelines(self, cache, std::slice::from_ref(info), None)
                .map_err(|(_, result)| result)?
        };
        Ok(pipelines[0])
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        // SAFETY: caller guarantees no submitted command buffer still uses it
        unsafe { ash::Device::destroy_pipeline(self, pipeline, None) }
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> VkResult<vk::PipelineCache> {
        let create_info = vk::PipelineCacheCreateInfo::default().initial_data(initial_data);
        // SAFETY: initial_data is either empty or carries a validated header
        unsafe { ash::Device::create_pipeline_cache(self, &create_info, None) }
    }

    fn pipeline_cache_data(&self, cache: vk::PipelineCache) -> VkResult<Vec<u8>> {
        // SAFETY: cache was created by this device
        unsafe { ash::Device::get_pipeline_cache_data(self, cache) }
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        // SAFETY: no pipeline creation using this cache is in flight
        unsafe { ash::Device::destroy_pipeline_cache(self, cache, None) }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        // SAFETY: set layouts referenced by info are alive
        unsafe { ash::Device::create_pipeline_layout(self, info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        // SAFETY: every pipeline built against this layout is already destroyed
        unsafe { ash::Device::destroy_pipeline_layout(self, layout, None) }
    }
}

impl CommandRecorder for ash::Device {
    fn bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        // SAFETY: cmd is in the recording state, buffers are alive
        unsafe { self.cmd_bind_vertex_buffers(cmd, first_binding, buffers, offsets) }
    }

    fn bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        // SAFETY: cmd is in the recording state, buffer is alive
        unsafe { self.cmd_bind_index_buffer(cmd, buffer, offset, index_type) }
    }

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        // SAFETY: cmd is in the recording state inside a compatible render pass
        unsafe { self.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline) }
    }

    fn set_line_width(&self, cmd: vk::CommandBuffer, width: f32) {
        // SAFETY: bound pipelines declare LINE_WIDTH as dynamic state
        unsafe { self.cmd_set_line_width(cmd, width) }
    }

    fn draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        // SAFETY: a pipeline, vertex buffer and index buffer are bound
        unsafe {
            self.cmd_draw_indexed(
                cmd,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }
}
