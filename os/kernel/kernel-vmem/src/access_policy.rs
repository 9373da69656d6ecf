//! # Physical Memory Access Protection
//!
//! Before a driver maps a physical window into user space it asks the
//! architecture which caching attributes that window may be mapped with
//! (`phys_mem_access_prot`). On AArch64 the answer depends on whether the
//! frame is system RAM and on how the backing file was opened.

use crate::protection::PageProtection;
use alloc::vec::Vec;
use kernel_memory_addresses::{PageFrameNumber, PhysicalRange};

/// The subset of an open file the protection policy looks at.
pub trait MappingFile {
    /// Whether the file was opened with `O_SYNC` (any `O_DSYNC` bit).
    fn is_sync(&self) -> bool;
}

/// Platform capabilities relevant to PFN mappings.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VmCapabilities {
    /// The platform can access physical ranges with an explicit protection
    /// (`CONFIG_HAVE_IOREMAP_PROT`), which `generic_access_phys` relies on.
    pub ioremap_prot: bool,
}

/// Architecture hook computing the protection a physical range may be
/// mapped with.
pub trait ProtectionClassifier {
    /// Refine `requested` for a mapping of `size` bytes starting at `pfn`.
    fn phys_mem_access_prot(
        &self,
        file: &dyn MappingFile,
        pfn: PageFrameNumber,
        size: u64,
        requested: PageProtection,
    ) -> PageProtection;

    fn capabilities(&self) -> VmCapabilities;
}

/// The AArch64 rule set.
///
/// | Frame            | File     | Result                    |
/// |------------------|----------|---------------------------|
/// | not system RAM   | any      | `pgprot_noncached`        |
/// | system RAM       | `O_SYNC` | `pgprot_writecombine`     |
/// | system RAM       | other    | requested, unchanged      |
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// # use kernel_vmem::*;
/// struct Plain;
/// impl MappingFile for Plain {
///     fn is_sync(&self) -> bool { false }
/// }
///
/// let policy = Arm64MemoryPolicy::new(vec![
///     PhysicalRange::new(PhysicalAddress::new(0x4000_0000), 0x4000_0000),
/// ]);
/// let requested = PageProtection::for_user(true, false);
///
/// let mmio = policy.phys_mem_access_prot(&Plain, PageFrameNumber::new(0x200), 4096, requested);
/// assert_eq!(mmio.attr_index(), MemoryType::DeviceNGnRnE);
///
/// let ram = policy.phys_mem_access_prot(&Plain, PageFrameNumber::new(0x40000), 4096, requested);
/// assert_eq!(ram, requested);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Arm64MemoryPolicy {
    ram: Vec<PhysicalRange>,
    capabilities: VmCapabilities,
}

impl Arm64MemoryPolicy {
    /// Policy for a machine whose system RAM is `ram`.
    #[must_use]
    pub const fn new(ram: Vec<PhysicalRange>) -> Self {
        Self {
            ram,
            capabilities: VmCapabilities { ioremap_prot: true },
        }
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: VmCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// `pfn_is_map_memory`: whether the frame belongs to a RAM bank.
    #[must_use]
    pub fn is_ram(&self, pfn: PageFrameNumber) -> bool {
        let Some(base) = pfn.base() else {
            return false;
        };
        self.ram.iter().any(|bank| bank.contains(base))
    }

    #[must_use]
    pub fn ram(&self) -> &[PhysicalRange] {
        &self.ram
    }
}

impl ProtectionClassifier for Arm64MemoryPolicy {
    fn phys_mem_access_prot(
        &self,
        file: &dyn MappingFile,
        pfn: PageFrameNumber,
        _size: u64,
        requested: PageProtection,
    ) -> PageProtection {
        if !self.is_ram(pfn) {
            requested.noncached()
        } else if file.is_sync() {
            requested.writecombine()
        } else {
            requested
        }
    }

    fn capabilities(&self) -> VmCapabilities {
        self.capabilities
    }
}

/// Architectures without a cached/uncached distinction for `/dev/mem`
/// style mappings.
#[derive(Copy, Clone, Debug, Default)]
pub struct PassThroughPolicy {
    pub capabilities: VmCapabilities,
}

impl ProtectionClassifier for PassThroughPolicy {
    fn phys_mem_access_prot(
        &self,
        _file: &dyn MappingFile,
        _pfn: PageFrameNumber,
        _size: u64,
        requested: PageProtection,
    ) -> PageProtection {
        requested
    }

    fn capabilities(&self) -> VmCapabilities {
        self.capabilities
    }
}

/// Either shipped policy, selectable at runtime.
#[derive(Clone, Debug)]
pub enum ProtectionPolicy {
    Arm64(Arm64MemoryPolicy),
    PassThrough(PassThroughPolicy),
}

impl ProtectionClassifier for ProtectionPolicy {
    fn phys_mem_access_prot(
        &self,
        file: &dyn MappingFile,
        pfn: PageFrameNumber,
        size: u64,
        requested: PageProtection,
    ) -> PageProtection {
        match self {
            Self::Arm64(p) => p.phys_mem_access_prot(file, pfn, size, requested),
            Self::PassThrough(p) => p.phys_mem_access_prot(file, pfn, size, requested),
        }
    }

    fn capabilities(&self) -> VmCapabilities {
        match self {
            Self::Arm64(p) => p.capabilities(),
            Self::PassThrough(p) => p.capabilities(),
        }
    }
}

impl From<Arm64MemoryPolicy> for ProtectionPolicy {
    fn from(value: Arm64MemoryPolicy) -> Self {
        Self::Arm64(value)
    }
}

impl From<PassThroughPolicy> for ProtectionPolicy {
    fn from(value: PassThroughPolicy) -> Self {
        Self::PassThrough(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protection::MemoryType;
    use alloc::vec;
    use kernel_memory_addresses::PhysicalAddress;

    struct Opened {
        sync: bool,
    }

    impl MappingFile for Opened {
        fn is_sync(&self) -> bool {
            self.sync
        }
    }

    fn rpi4() -> Arm64MemoryPolicy {
        Arm64MemoryPolicy::new(vec![PhysicalRange::new(
            PhysicalAddress::new(0x4000_0000),
            0x4000_0000,
        )])
    }

    #[test]
    fn mmio_is_noncached_regardless_of_sync() {
        let policy = rpi4();
        let req = PageProtection::for_user(true, false);
        for sync in [false, true] {
            let p = policy.phys_mem_access_prot(
                &Opened { sync },
                PageFrameNumber::new(0xFE200),
                4096,
                req,
            );
            assert_eq!(p.attr_index(), MemoryType::DeviceNGnRnE);
            assert!(p.pxn() && p.uxn());
        }
    }

    #[test]
    fn sync_ram_is_write_combined() {
        let policy = rpi4();
        let req = PageProtection::for_user(true, false);
        let p = policy.phys_mem_access_prot(
            &Opened { sync: true },
            PageFrameNumber::new(0x40001),
            4096,
            req,
        );
        assert_eq!(p.attr_index(), MemoryType::NormalNonCacheable);
        assert!(p.is_writable());
    }

    #[test]
    fn ram_bank_end_is_exclusive() {
        let policy = rpi4();
        assert!(policy.is_ram(PageFrameNumber::new(0x7FFFF)));
        assert!(!policy.is_ram(PageFrameNumber::new(0x80000)));
        assert!(!policy.is_ram(PageFrameNumber::new(u64::MAX)));
    }

    #[test]
    fn pass_through_keeps_everything() {
        let policy = ProtectionPolicy::from(PassThroughPolicy::default());
        let req = PageProtection::for_user(false, false);
        let p = policy.phys_mem_access_prot(
            &Opened { sync: true },
            PageFrameNumber::new(0x200),
            4096,
            req,
        );
        assert_eq!(p, req);
        assert!(!policy.capabilities().ioremap_prot);
    }
}
