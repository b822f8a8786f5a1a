//! Headless GPU device for offscreen baking.

use crate::error::BakeError;

/// Owns the wgpu instance, adapter, device and queue. No surface is created.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Initialize the GPU asynchronously.
    pub async fn new() -> Result<Self, BakeError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => return Err(BakeError::NoAdapter),
        };

        let info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        // Ask for the adapter's texture size so large panoramas fit.
        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_texture_dimension_2d: adapter_limits.max_texture_dimension_2d,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pano-bake-device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        // Anything not caught by an error scope is logged; the default
        // handler would panic the bake thread.
        device.on_uncaptured_error(std::sync::Arc::new(|error: wgpu::Error| {
            log::error!("Uncaptured wgpu error: {error}");
        }));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Fail with [`BakeError::ResourceLimit`] if a 2D texture of this size
    /// cannot be created.
    pub fn check_texture_size(
        &self,
        what: &'static str,
        width: u32,
        height: u32,
    ) -> Result<(), BakeError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        let requested = width.max(height);
        if requested > limit {
            return Err(BakeError::ResourceLimit {
                what,
                requested: requested as u64,
                limit: limit as u64,
            });
        }
        Ok(())
    }

    pub fn check_buffer_size(&self, what: &'static str, size: u64) -> Result<(), BakeError> {
        let limit = self.device.limits().max_buffer_size;
        if size > limit {
            return Err(BakeError::ResourceLimit {
                what,
                requested: size,
                limit,
            });
        }
        Ok(())
    }
}

/// Run `f` with validation and out-of-memory errors captured. Any captured
/// error becomes [`BakeError::Gpu`], prefixed with `what`.
///
/// Error scopes are per thread, so `f` must do its GPU work on the calling
/// thread.
pub fn capture_errors<T>(
    device: &wgpu::Device,
    what: &str,
    f: impl FnOnce() -> T,
) -> Result<T, BakeError> {
    let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(validation.pop());
    let out_of_memory = pollster::block_on(out_of_memory.pop());
    match validation.or(out_of_memory) {
        Some(error) => {
            log::error!("{what} failed: {error}");
            Err(BakeError::Gpu(format!("{what}: {error}")))
        }
        None => Ok(value),
    }
}

/// Initialize the GPU synchronously using `pollster`.
pub fn init_gpu_context_blocking() -> Result<GpuContext, BakeError> {
    pollster::block_on(GpuContext::new())
}
