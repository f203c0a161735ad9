use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wgpu::{Adapter, Backends, Device, Instance, Queue};

use crate::error::{GpuError, GpuResult};
use crate::plan::DeviceLimits;

/// How to pick and configure the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Adapter name to open. `None` picks the default adapter.
    pub name: Option<String>,
    pub low_power: bool,
    /// Group width used by the dispatch planner.
    pub preferred_group_width: u32,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            name: None,
            low_power: false,
            preferred_group_width: 32,
        }
    }
}

#[derive(Debug)]
pub struct WgpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    limits: DeviceLimits,
}

impl WgpuContext {
    pub async fn new(options: &ContextOptions) -> GpuResult<Self> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let adapter = match &options.name {
            Some(name) => instance
                .enumerate_adapters(Backends::all())
                .into_iter()
                .find(|a| a.get_info().name == *name),
            None => {
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: if options.low_power {
                            wgpu::PowerPreference::LowPower
                        } else {
                            wgpu::PowerPreference::HighPerformance
                        },
                        force_fallback_adapter: false,
                        compatible_surface: None,
                    })
                    .await
            }
        };
        let adapter = adapter.ok_or_else(|| GpuError::DeviceUnavailable {
            requested: options.name.clone(),
            available: adapter_names(&instance),
        })?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("kernelkit device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let limits = DeviceLimits::from_wgpu(&device.limits(), options.preferred_group_width)?;
        log::debug!("opened {} with {:?}", adapter.get_info().name, limits);

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            limits,
        })
    }

    pub fn adapter_info(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// Compute-related device maxima, keyed by limit name.
    pub fn max_values(&self) -> BTreeMap<&'static str, u64> {
        compute_limits(&self.device.limits())
    }
}

fn adapter_names(instance: &Instance) -> Vec<String> {
    instance
        .enumerate_adapters(Backends::all())
        .iter()
        .map(|a| a.get_info().name)
        .collect()
}

fn compute_limits(limits: &wgpu::Limits) -> BTreeMap<&'static str, u64> {
    BTreeMap::from([
        (
            "compute_invocations_per_workgroup",
            limits.max_compute_invocations_per_workgroup as u64,
        ),
        ("compute_workgroup_size_x", limits.max_compute_workgroup_size_x as u64),
        ("compute_workgroup_size_y", limits.max_compute_workgroup_size_y as u64),
        ("compute_workgroup_size_z", limits.max_compute_workgroup_size_z as u64),
        (
            "compute_workgroups_per_dimension",
            limits.max_compute_workgroups_per_dimension as u64,
        ),
        (
            "compute_workgroup_storage_size",
            limits.max_compute_workgroup_storage_size as u64,
        ),
        (
            "storage_buffer_binding_size",
            limits.max_storage_buffer_binding_size as u64,
        ),
        (
            "storage_buffers_per_shader_stage",
            limits.max_storage_buffers_per_shader_stage as u64,
        ),
        ("buffer_size", limits.max_buffer_size),
        ("bind_groups", limits.max_bind_groups as u64),
    ])
}

/// What an adapter reports about itself.
#[derive(Debug, Clone)]
pub struct AdapterSummary {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub driver: String,
    pub driver_info: String,
    pub vendor: u32,
    pub device: u32,
    pub limits: BTreeMap<&'static str, u64>,
}

impl AdapterSummary {
    fn from_adapter(adapter: &Adapter) -> Self {
        let info = adapter.get_info();
        Self {
            name: info.name,
            device_type: info.device_type,
            backend: info.backend,
            driver: info.driver,
            driver_info: info.driver_info,
            vendor: info.vendor,
            device: info.device,
            limits: compute_limits(&adapter.limits()),
        }
    }

    pub fn is_low_power(&self) -> bool {
        self.device_type == wgpu::DeviceType::IntegratedGpu
    }

    pub fn is_software(&self) -> bool {
        self.device_type == wgpu::DeviceType::Cpu
    }

    /// Human-readable report, one line per entry.
    pub fn describe(&self) -> Vec<String> {
        fn yes(flag: bool) -> &'static str {
            if flag {
                "yes"
            } else {
                "no"
            }
        }

        let mut lines = vec![
            format!("{}:", self.name),
            format!("\t• backend: {:?}", self.backend),
            format!("\t• type: {:?}", self.device_type),
            format!("\t• low-power: {}", yes(self.is_low_power())),
            format!("\t• software: {}", yes(self.is_software())),
            format!("\t• driver: {} {}", self.driver, self.driver_info),
            format!("\t• vendor/device: {:#06x}/{:#06x}", self.vendor, self.device),
            String::new(),
            "\tCompute limits:".to_string(),
        ];
        lines.extend(
            self.limits
                .iter()
                .map(|(name, value)| format!("\t• {}: {}", name, value)),
        );
        lines
    }
}

/// Enumerates every adapter on every backend.
pub fn list_devices() -> Vec<AdapterSummary> {
    let instance = Instance::new(wgpu::InstanceDescriptor {
        backends: Backends::all(),
        ..Default::default()
    });
    instance
        .enumerate_adapters(Backends::all())
        .iter()
        .map(AdapterSummary::from_adapter)
        .collect()
}
