//! # In-Memory Host Kernel
//!
//! [`HostKernel`] implements every service a character driver calls into
//! (`kernel_chrdev` and `kernel_vmem` contracts) entirely in memory, so a
//! driver can be loaded, opened, mapped and unloaded inside a test:
//!
//! - device number regions with dynamic majors (511 downward),
//! - cdev bindings consulted by `open`,
//! - classes and devices, with uevents run through the class hook and a
//!   `/dev` view whose node modes follow `DEVMODE`,
//! - per-process page tables filled by an all-or-nothing `remap_pfn_range`,
//! - sparse physical memory so stores through a mapping can be observed
//!   from the "hardware" side,
//! - a [`FaultPlan`] to make any of the above fail on purpose.
//!
//! [`Process`] is the user-space side: `open`/`read`/`write`/`ioctl`/`mmap`
//! and loads/stores through the installed page tables.
//!
//! ```rust
//! # use kernel_host::*;
//! # use kernel_chrdev::OpenFlags;
//! let kernel = HostKernel::new(HostConfig::raspberry_pi4());
//! let mut proc = kernel.spawn();
//! assert_eq!(proc.open("/dev/RPI_GPIO_0", OpenFlags::RDWR), Err(kernel_chrdev::Errno::NoEntry));
//! ```

mod chrdev;
mod config;
mod kernel;
mod mm;
mod process;

pub use crate::chrdev::{CHRDEV_MAJOR_DYN_END, CHRDEV_MAJOR_DYN_EXT_START, DEFAULT_NODE_MODE};
pub use crate::config::{FaultPlan, HostArch, HostConfig};
pub use crate::kernel::{DevNode, HostKernel, UeventRecord};
pub use crate::process::{Fd, MMAP_BASE, MmapFlags, MmapProt, Process};
