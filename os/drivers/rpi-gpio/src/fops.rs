//! The file operations of every GPIO node, and the class naming hook.

use crate::Platform;
use crate::config::DriverConfig;
use crate::error::MappingError;
use crate::mmap::{MappingRequest, install_mapping, vm_operations};
use crate::protection::resolve_protection;
use alloc::sync::Arc;
use core::fmt;
use kernel_chrdev::{DeviceInfo, Errno, File, FileOperations, UeventEnv, UeventHook};
use kernel_vmem::{VmArea, VmOperations};
use log::{info, warn};

/// Dispatcher shared by all minors. Holds nothing mutable.
pub struct GpioFileOps<P: Platform> {
    platform: Arc<P>,
    config: DriverConfig,
    vm_ops: &'static VmOperations,
}

impl<P: Platform> GpioFileOps<P> {
    /// The callback table is fixed here from the platform's capabilities.
    #[must_use]
    pub fn new(platform: Arc<P>, config: DriverConfig) -> Self {
        let vm_ops = vm_operations(platform.capabilities());
        Self {
            platform,
            config,
            vm_ops,
        }
    }

    #[must_use]
    pub const fn vm_ops(&self) -> &'static VmOperations {
        self.vm_ops
    }

    fn map(&self, file: &File, vma: &mut VmArea) -> Result<(), MappingError> {
        let request = MappingRequest::from_vma(file, vma);
        let window = request.validate(&self.config.range_policy)?;
        let protection = resolve_protection(
            &*self.platform,
            file,
            request.pfn,
            request.len(),
            vma.page_prot,
        );
        let region = install_mapping(&*self.platform, vma, &request, protection, self.vm_ops)?;
        info!(
            "{}: mmap {:?} ({:#x} bytes) at {}",
            self.config.name, window, region.len, request.start
        );
        Ok(())
    }
}

impl<P: Platform> FileOperations for GpioFileOps<P> {
    fn open(&self, file: &File) -> Result<(), Errno> {
        info!("{}: Device open ({})", self.config.name, file.devt);
        Ok(())
    }

    fn release(&self, file: &File) -> Result<(), Errno> {
        info!("{}: Device close ({})", self.config.name, file.devt);
        Ok(())
    }

    fn read(&self, file: &File, _buf: &mut [u8], _pos: &mut u64) -> Result<usize, Errno> {
        info!("{}: Device read ({})", self.config.name, file.devt);
        Ok(0)
    }

    fn write(&self, file: &File, buf: &[u8], _pos: &mut u64) -> Result<usize, Errno> {
        info!("{}: Device write ({})", self.config.name, file.devt);
        Ok(buf.len())
    }

    fn unlocked_ioctl(&self, file: &File, cmd: u32, _arg: u64) -> Result<i64, Errno> {
        info!("{}: Device ioctl {cmd:#x} ({})", self.config.name, file.devt);
        Ok(0)
    }

    fn mmap(&self, file: &File, vma: &mut VmArea) -> Result<(), Errno> {
        self.map(file, vma).map_err(|e| {
            warn!("{}: mmap on {} failed: {e}", self.config.name, file.devt);
            Errno::from(e)
        })
    }
}

/// Octal with a leading zero unless the value is zero, like C's `%#o`.
struct AltOctal(u32);

impl fmt::Display for AltOctal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("0")
        } else {
            write!(f, "0{:o}", self.0)
        }
    }
}

/// Hook adding `DEVMODE=<mode>` to every naming event of the class.
#[must_use]
pub fn devmode_hook(mode: u32) -> UeventHook {
    Arc::new(move |_: &DeviceInfo, env: &mut UeventEnv| {
        env.add_var(format_args!("DEVMODE={}", AltOctal(mode)))
    })
}
