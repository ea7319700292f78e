//! Host resource probe backed by `sysinfo` (CPU, memory) and `statvfs` (disk).

use std::path::PathBuf;

use async_trait::async_trait;
use pipewatch_core::resources::ResourceUsage;
use sysinfo::System;

use super::{ResourceProbe, SampleError};

/// Samples the local host. Disk usage is measured on `disk_path`.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    disk_path: PathBuf,
}

impl SystemProbe {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self {
            disk_path: disk_path.into(),
        }
    }
}

#[async_trait]
impl ResourceProbe for SystemProbe {
    async fn sample(&self) -> Result<ResourceUsage, SampleError> {
        let disk_path = self.disk_path.clone();
        tokio::task::spawn_blocking(move || {
            let (cpu_percent, memory_percent) = cpu_and_memory();
            let disk_percent = disk_usage_percent(&disk_path)?;
            Ok(ResourceUsage {
                cpu_percent,
                memory_percent,
                disk_percent,
            })
        })
        .await
        .map_err(|e| SampleError::Unavailable(format!("Resource sampling task failed: {e}")))?
    }
}

/// CPU usage needs two refreshes at least the minimum interval apart.
fn cpu_and_memory() -> (f64, f64) {
    let mut sys = System::new();
    sys.refresh_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    let cpu = f64::from(sys.global_cpu_info().cpu_usage());
    let total = sys.total_memory();
    let memory = if total == 0 {
        0.0
    } else {
        sys.used_memory() as f64 / total as f64 * 100.0
    };
    (cpu, memory)
}

/// Used share of the filesystem holding `path`, in percent.
#[cfg(unix)]
fn disk_usage_percent(path: &std::path::Path) -> Result<f64, SampleError> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| SampleError::Malformed(format!("Invalid disk path {}", path.display())))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // Safety: `c_path` is NUL-terminated and `stat` is a valid out-pointer.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return Err(SampleError::Unavailable(format!(
            "statvfs({}) failed: {}",
            path.display(),
            std::io::Error::last_os_error()
        )));
    }

    // Safety: statvfs returned 0, so the struct is initialised.
    let stat = unsafe { stat.assume_init() };
    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free = stat.f_bavail as u64 * block_size;
    let used = total.saturating_sub(free);
    Ok(if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    })
}

#[cfg(not(unix))]
fn disk_usage_percent(path: &std::path::Path) -> Result<f64, SampleError> {
    Err(SampleError::Unavailable(format!(
        "Disk usage for {} is only supported on Unix",
        path.display()
    )))
}
