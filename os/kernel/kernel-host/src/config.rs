use kernel_memory_addresses::{PhysicalAddress, PhysicalRange};
use kernel_vmem::{RemapError, VmCapabilities};

/// Which `phys_mem_access_prot` rules the host applies.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum HostArch {
    /// RAM is cached, everything else device-uncached.
    #[default]
    Arm64,
    /// Requested protection is used unchanged.
    Generic,
}

/// Failures to inject, one switch per collaborator call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FaultPlan {
    /// `alloc_chrdev_region` reports no free major.
    pub fail_alloc_region: bool,
    /// `class_create` runs out of memory.
    pub fail_class_create: bool,
    /// `cdev_add` fails for this minor.
    pub fail_cdev_add_at_minor: Option<u32>,
    /// `device_create` fails for this minor.
    pub fail_device_create_at_minor: Option<u32>,
    /// `remap_pfn_range` fails up front with this error.
    pub fail_remap: Option<RemapError>,
    /// `remap_pfn_range` runs out of page-table memory after this many
    /// pages, exercising its rollback.
    pub fail_remap_after_pages: Option<u64>,
}

impl FaultPlan {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            fail_alloc_region: false,
            fail_class_create: false,
            fail_cdev_add_at_minor: None,
            fail_device_create_at_minor: None,
            fail_remap: None,
            fail_remap_after_pages: None,
        }
    }
}

/// Shape of the simulated machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostConfig {
    /// System RAM banks.
    pub ram: Vec<PhysicalRange>,
    /// Physical address width; frames above it cannot be mapped.
    pub phys_addr_bits: u32,
    pub arch: HostArch,
    pub capabilities: VmCapabilities,
    pub faults: FaultPlan,
}

impl HostConfig {
    /// A Raspberry Pi 4 with 1 GiB of RAM above the low peripheral hole.
    #[must_use]
    pub fn raspberry_pi4() -> Self {
        Self {
            ram: vec![PhysicalRange::new(
                PhysicalAddress::new(0x4000_0000),
                0x4000_0000,
            )],
            phys_addr_bits: 40,
            arch: HostArch::Arm64,
            capabilities: VmCapabilities { ioremap_prot: true },
            faults: FaultPlan::none(),
        }
    }

    #[must_use]
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: VmCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_arch(mut self, arch: HostArch) -> Self {
        self.arch = arch;
        self
    }

    /// One past the highest mappable frame number.
    #[must_use]
    pub const fn pfn_limit(&self) -> u64 {
        1u64 << (self.phys_addr_bits - kernel_memory_addresses::PAGE_SHIFT)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::raspberry_pi4()
    }
}
