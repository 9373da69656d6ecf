//! Compile-time parameters and the runtime [`DriverConfig`].

use alloc::vec::Vec;
use kernel_chrdev::MINOR_MAX;
use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};

/// Number of device nodes (`RPI_GPIO_0` .. `RPI_GPIO_3`).
pub const MAX_MINOR_DEVS: usize = 4;

/// Mode injected into every node's uevent.
pub const DEVICE_PERMISSIONS: u32 = 0o666;

/// Family name used for the number region, the class and node names.
pub const DEV_NAME: &str = "RPI_GPIO";

/// First minor of the region.
pub const BASE_MINOR: u32 = 0;

const _: () = {
    assert!(MAX_MINOR_DEVS > 0);
    assert!(DEVICE_PERMISSIONS <= 0o7777);
    assert!(BASE_MINOR as usize + MAX_MINOR_DEVS <= MINOR_MAX as usize + 1);
};

/// Which physical ranges `mmap` may expose.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum PhysicalRangePolicy {
    /// Any frame the caller names is attempted.
    #[default]
    Permissive,
    /// Only requests lying entirely inside one of the ranges are accepted.
    AllowList(Vec<PhysicalRange>),
}

impl PhysicalRangePolicy {
    /// Whether `[start, start + len)` may be mapped.
    ///
    /// ```rust
    /// # use rpi_gpio::PhysicalRangePolicy;
    /// # use kernel_memory_addresses::*;
    /// let gpio = PhysicalRange::new(PhysicalAddress::new(0xFE20_0000), 0x1000);
    /// let policy = PhysicalRangePolicy::AllowList(vec![gpio]);
    /// assert!(policy.permits(PhysicalAddress::new(0xFE20_0000), 0x1000));
    /// assert!(!policy.permits(PhysicalAddress::new(0xFE20_0000), 0x2000));
    /// assert!(PhysicalRangePolicy::Permissive.permits(PhysicalAddress::zero(), 0x1000));
    /// ```
    #[must_use]
    pub fn permits(&self, start: PhysicalAddress, len: u64) -> bool {
        match self {
            Self::Permissive => true,
            Self::AllowList(ranges) => ranges.iter().any(|r| r.contains_range(start, len)),
        }
    }
}

/// Runtime configuration. `Default` reproduces the compile-time constants
/// and the permissive mapping policy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverConfig {
    pub name: &'static str,
    pub mode: u32,
    pub range_policy: PhysicalRangePolicy,
}

impl DriverConfig {
    #[must_use]
    pub fn with_allow_list(mut self, ranges: Vec<PhysicalRange>) -> Self {
        self.range_policy = PhysicalRangePolicy::AllowList(ranges);
        self
    }

    /// Node name for minor `index`.
    #[must_use]
    pub fn node_name(&self, index: usize) -> alloc::string::String {
        alloc::format!("{}_{index}", self.name)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: DEV_NAME,
            mode: DEVICE_PERMISSIONS,
            range_policy: PhysicalRangePolicy::Permissive,
        }
    }
}
