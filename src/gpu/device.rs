//! Hardware device for the frontier BFS kernels
//!
//! Opens one adapter, checks it can bind every buffer the BFS pipeline
//! uses, and creates buffers no larger than a single storage binding.

use thiserror::Error;
use tracing::debug;
use wgpu::util::DeviceExt;

/// Storage buffers bound by one frontier kernel: offsets, targets, levels,
/// mask, queue and queue length
pub const FRONTIER_STORAGE_BUFFERS: u32 = 6;

/// Hardware device errors
#[derive(Debug, Error)]
pub enum GpuDeviceError {
    /// No compatible adapter found
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// Adapter refused the device request
    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(String),

    /// Adapter limit below what the frontier kernels bind
    #[error("GPU limit {limit} is {available}, frontier kernels need {needed}")]
    MissingCapability {
        /// wgpu limit name
        limit: &'static str,
        /// Required value
        needed: u64,
        /// Adapter value
        available: u64,
    },

    /// Buffer larger than one storage binding
    #[error("GPU buffer {label} of {size} bytes exceeds the limit of {limit} bytes")]
    BufferTooLarge {
        /// Buffer label
        label: String,
        /// Requested size
        size: u64,
        /// Binding limit
        limit: u64,
    },
}

/// Reject adapters that cannot bind a whole frontier pipeline
pub(crate) fn check_limits(limits: &wgpu::Limits) -> Result<(), GpuDeviceError> {
    let available = limits.max_storage_buffers_per_shader_stage;
    if available < FRONTIER_STORAGE_BUFFERS {
        return Err(GpuDeviceError::MissingCapability {
            limit: "max_storage_buffers_per_shader_stage",
            needed: u64::from(FRONTIER_STORAGE_BUFFERS),
            available: u64::from(available),
        });
    }
    Ok(())
}

/// Adapter, device and queue that partitions are uploaded to
#[derive(Debug)]
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
}

impl GpuDevice {
    /// Open the preferred adapter on any backend
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open)
    pub async fn new() -> Result<Self, GpuDeviceError> {
        Self::open(wgpu::Backends::all()).await
    }

    /// Open a device, or `None` when this machine has no usable adapter
    pub async fn try_new() -> Option<Self> {
        match Self::new().await {
            Ok(device) => Some(device),
            Err(e) => {
                debug!(error = %e, "no GPU device");
                None
            }
        }
    }

    /// Open the preferred adapter on `backends`
    ///
    /// The device keeps the adapter's storage binding and buffer sizes so
    /// large partitions fit in one binding.
    ///
    /// # Errors
    ///
    /// - [`GpuDeviceError::NoAdapter`] if no adapter matches
    /// - [`GpuDeviceError::MissingCapability`] if the adapter binds too few
    ///   storage buffers
    /// - [`GpuDeviceError::DeviceRequest`] if the device request fails
    pub async fn open(backends: wgpu::Backends) -> Result<Self, GpuDeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuDeviceError::NoAdapter)?;

        let supported = adapter.limits();
        check_limits(&supported)?;
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
            max_buffer_size: supported.max_buffer_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("trueno-frontier GPU device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| GpuDeviceError::DeviceRequest(e.to_string()))?;

        let info = adapter.get_info();
        debug!(
            adapter = %info.name,
            backend = ?info.backend,
            max_binding = supported.max_storage_buffer_binding_size,
            "GPU device opened"
        );

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    /// Adapter name as reported by the driver
    #[must_use]
    pub fn adapter_name(&self) -> String {
        self.adapter.get_info().name
    }

    /// Backend the adapter runs on
    #[must_use]
    pub fn backend(&self) -> wgpu::Backend {
        self.adapter.get_info().backend
    }

    /// Largest storage buffer binding, in bytes
    #[must_use]
    pub fn max_storage_binding(&self) -> u64 {
        u64::from(self.device.limits().max_storage_buffer_binding_size)
    }

    /// Buffer initialised with `contents`
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::BufferTooLarge`] past one storage binding
    pub fn upload(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuDeviceError> {
        self.check_size(label, contents.len() as u64)?;
        Ok(self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            }))
    }

    /// Host-mappable buffer that results are copied into for readback
    ///
    /// # Errors
    ///
    /// Returns [`GpuDeviceError::BufferTooLarge`] past one storage binding
    pub fn staging(&self, label: &str, size: u64) -> Result<wgpu::Buffer, GpuDeviceError> {
        self.check_size(label, size)?;
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }))
    }

    fn check_size(&self, label: &str, size: u64) -> Result<(), GpuDeviceError> {
        let limit = self.max_storage_binding();
        if size > limit {
            return Err(GpuDeviceError::BufferTooLarge {
                label: label.to_string(),
                size,
                limit,
            });
        }
        Ok(())
    }

    /// wgpu device
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Submission queue
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
