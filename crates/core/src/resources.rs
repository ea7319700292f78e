//! Host resource thresholds (CPU, memory, disk).
//!
//! Pure logic: the caller samples usage and passes it in.

use serde::Serialize;

use crate::error::CoreError;
use crate::metric_names::{METRIC_CPU_USAGE, METRIC_DISK_USAGE, METRIC_MEMORY_USAGE};
use crate::threshold_validation::validate_percentage;

/// Default ceiling for every resource, in percent.
pub const DEFAULT_RESOURCE_CEILING: f64 = 80.0;

/// Resource kinds sampled on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Cpu,
    Memory,
    Disk,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Cpu, Resource::Memory, Resource::Disk];

    pub fn label(self) -> &'static str {
        match self {
            Resource::Cpu => "CPU",
            Resource::Memory => "Memory",
            Resource::Disk => "Disk",
        }
    }

    /// Gauge this resource is published under.
    pub fn metric_name(self) -> &'static str {
        match self {
            Resource::Cpu => METRIC_CPU_USAGE,
            Resource::Memory => METRIC_MEMORY_USAGE,
            Resource::Disk => METRIC_DISK_USAGE,
        }
    }
}

/// Usage percentages from one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl ResourceUsage {
    pub fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Cpu => self.cpu_percent,
            Resource::Memory => self.memory_percent,
            Resource::Disk => self.disk_percent,
        }
    }
}

/// Ceilings above which a resource alert fires.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceThresholds {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_RESOURCE_CEILING,
            memory: DEFAULT_RESOURCE_CEILING,
            disk: DEFAULT_RESOURCE_CEILING,
        }
    }
}

/// Outcome of comparing one resource against its ceiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCheck {
    pub resource: Resource,
    pub value: f64,
    pub threshold: f64,
    pub exceeded: bool,
}

impl ResourceCheck {
    pub fn message(&self) -> String {
        format!(
            "{} usage is {:.1}% (threshold: {}%)",
            self.resource.label(),
            self.value,
            self.threshold
        )
    }
}

impl ResourceThresholds {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_percentage(self.cpu, "CPU usage threshold")?;
        validate_percentage(self.memory, "memory usage threshold")?;
        validate_percentage(self.disk, "disk usage threshold")?;
        Ok(())
    }

    pub fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Cpu => self.cpu,
            Resource::Memory => self.memory,
            Resource::Disk => self.disk,
        }
    }

    /// One check per resource; `exceeded` is a strict comparison.
    pub fn check(&self, usage: &ResourceUsage) -> Vec<ResourceCheck> {
        Resource::ALL
            .iter()
            .map(|&resource| {
                let value = usage.get(resource);
                let threshold = self.get(resource);
                ResourceCheck {
                    resource,
                    value,
                    threshold,
                    exceeded: value > threshold,
                }
            })
            .collect()
    }
}
