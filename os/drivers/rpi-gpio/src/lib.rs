//! # Raspberry Pi GPIO Character Device
//!
//! Exposes the GPIO register block to user space. The driver registers a
//! family of four nodes, `/dev/RPI_GPIO_0` .. `/dev/RPI_GPIO_3`, world
//! read/writable through a `DEVMODE` uevent hook. A process opens any of
//! them and `mmap`s the register window; the byte offset passed to `mmap`
//! names the physical address, the length the window size:
//!
//! ```c
//! int fd = open("/dev/RPI_GPIO_3", O_RDWR | O_SYNC | O_CLOEXEC);
//! volatile uint32_t *gpio = mmap(NULL, 4096, PROT_READ | PROT_WRITE,
//!                                MAP_SHARED, fd, 0x00200000);
//! ```
//!
//! `read`, `write` and `ioctl` are accepted and do nothing.
//!
//! | Module        | Role |
//! |---------------|------|
//! | [`driver`]    | Start/stop with full rollback, module entry points |
//! | [`registry`]  | Fixed arena of per-minor instances |
//! | [`fops`]      | File operations and the `DEVMODE` hook |
//! | [`mmap`]      | Request validation and the mapping installer |
//! | [`protection`]| Protection resolution through the platform policy |
//!
//! The driver talks to the kernel only through the traits bundled in
//! [`Platform`], so it runs unchanged against the in-memory host kernel:
//!
//! ```rust
//! # use kernel_host::{HostConfig, HostKernel};
//! # use rpi_gpio::{DriverConfig, GpioDriver};
//! let kernel = HostKernel::new(HostConfig::raspberry_pi4());
//! let driver = GpioDriver::start(kernel.clone(), DriverConfig::default()).unwrap();
//! assert_eq!(kernel.dev_node_names(), ["RPI_GPIO_0", "RPI_GPIO_1", "RPI_GPIO_2", "RPI_GPIO_3"]);
//!
//! driver.stop();
//! assert!(kernel.is_clean());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod config;
pub mod driver;
pub mod error;
pub mod fops;
pub mod guards;
pub mod mmap;
pub mod protection;
pub mod registry;

pub use crate::config::{
    BASE_MINOR, DEV_NAME, DEVICE_PERMISSIONS, DriverConfig, MAX_MINOR_DEVS, PhysicalRangePolicy,
};
pub use crate::driver::{DriverState, GpioDriver, GpioModule};
pub use crate::error::{GpioError, MappingError, RegistryError};
pub use crate::fops::{GpioFileOps, devmode_hook};
pub use crate::mmap::{
    GPIO_VM_OPS, GPIO_VM_OPS_NO_ACCESS, MappingRegion, MappingRequest, install_mapping,
    vm_operations,
};
pub use crate::protection::resolve_protection;
pub use crate::registry::{DeviceInstance, DeviceRegistry, SlotState};

use kernel_chrdev::{CdevRegistrar, ChrdevRegionAllocator, DeviceClassRegistrar};
use kernel_vmem::{PfnRemapper, ProtectionClassifier};

/// Every kernel service the driver consumes.
pub trait Platform:
    ChrdevRegionAllocator
    + DeviceClassRegistrar
    + CdevRegistrar
    + PfnRemapper
    + ProtectionClassifier
    + Send
    + Sync
    + 'static
{
}

impl<T> Platform for T where
    T: ChrdevRegionAllocator
        + DeviceClassRegistrar
        + CdevRegistrar
        + PfnRemapper
        + ProtectionClassifier
        + Send
        + Sync
        + 'static
{
}
