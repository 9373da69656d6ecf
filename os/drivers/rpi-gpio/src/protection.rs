use kernel_chrdev::File;
use kernel_memory_addresses::PageFrameNumber;
use kernel_vmem::{MappingFile, PageProtection, ProtectionClassifier};
use log::debug;

/// Protection for mapping `length` bytes from `pfn` through `file`.
///
/// The decision belongs to the platform's [`ProtectionClassifier`]; on
/// AArch64 MMIO comes back strongly ordered and `O_SYNC` RAM write-combined.
///
/// ```rust
/// # use kernel_chrdev::{DeviceNumber, File, OpenFlags};
/// # use kernel_memory_addresses::*;
/// # use kernel_vmem::{Arm64MemoryPolicy, MemoryType, PageProtection};
/// # use rpi_gpio::resolve_protection;
/// let ram = PhysicalRange::new(PhysicalAddress::new(0x4000_0000), 0x4000_0000);
/// let policy = Arm64MemoryPolicy::new(vec![ram]);
/// let file = File::new(DeviceNumber::mkdev(511, 3).unwrap(), OpenFlags::RDWR);
///
/// let prot = resolve_protection(
///     &policy,
///     &file,
///     PageFrameNumber::new(0x200),
///     4096,
///     PageProtection::for_user(true, false),
/// );
/// assert_eq!(prot.attr_index(), MemoryType::DeviceNGnRnE);
/// ```
pub fn resolve_protection<C>(
    classifier: &C,
    file: &File,
    pfn: PageFrameNumber,
    length: u64,
    requested: PageProtection,
) -> PageProtection
where
    C: ProtectionClassifier + ?Sized,
{
    let prot = classifier.phys_mem_access_prot(file, pfn, length, requested);
    debug!(
        "{pfn}: {:?} -> {:?} (sync={})",
        requested.attr_index(),
        prot.attr_index(),
        file.is_sync()
    );
    prot
}
