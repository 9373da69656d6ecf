//! # Virtual Memory Areas
//!
//! A [`VmArea`] describes one contiguous range of a process' address space
//! while a driver's `mmap` handler decides how to back it. The VM layer
//! builds the area (range, page offset, default protection), hands it to the
//! driver by `&mut`, and only makes it visible in the process once the
//! handler returns successfully.

use crate::access_phys::{AccessOp, PfnMapAccess, VmAccessError};
use crate::protection::PageProtection;
use core::fmt;
use kernel_memory_addresses::{PAGE_SHIFT, PageFrameNumber, VirtualAddress};

bitflags::bitflags! {
    /// Per-area flags (`vm_flags`), using the Linux bit assignment.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct VmFlags: u64 {
        const READ       = 0x0000_0001;
        const WRITE      = 0x0000_0002;
        const EXEC       = 0x0000_0004;
        const SHARED     = 0x0000_0008;

        /// Page-ranges managed without `struct page`, just pure PFN.
        const PFNMAP     = 0x0000_0400;

        /// Memory mapped I/O or similar.
        const IO         = 0x0000_4000;

        /// Cannot expand with `mremap()`.
        const DONTEXPAND = 0x0004_0000;

        /// Do not include in core dumps.
        const DONTDUMP   = 0x0400_0000;
    }
}

impl VmFlags {
    /// Flags the PFN remap primitive applies to an area it populated.
    pub const REMAPPED: Self = Self::IO
        .union(Self::PFNMAP)
        .union(Self::DONTEXPAND)
        .union(Self::DONTDUMP);
}

/// Identifies the address space an area belongs to.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MmId(pub u64);

/// Region-level callback invoked for accesses that do not go through the
/// page tables of the owning process (`ptrace`, `/proc/<pid>/mem`).
pub type VmAccessFn =
    fn(&VmArea, &dyn PfnMapAccess, VirtualAddress, AccessOp<'_>) -> Result<usize, VmAccessError>;

/// Callback table attached to an area (`vm_operations_struct`).
pub struct VmOperations {
    /// Name used in diagnostics.
    pub name: &'static str,
    pub access: Option<VmAccessFn>,
}

impl fmt::Debug for VmOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmOperations")
            .field("name", &self.name)
            .field("access", &self.access.is_some())
            .finish()
    }
}

/// One virtual memory area.
#[derive(Clone, Debug)]
pub struct VmArea {
    /// Owning address space.
    pub mm: MmId,
    /// First byte of the area (page aligned).
    pub start: VirtualAddress,
    /// One past the last byte of the area (page aligned).
    pub end: VirtualAddress,
    /// Page offset supplied by the caller of `mmap`.
    pub pgoff: PageFrameNumber,
    pub page_prot: PageProtection,
    pub flags: VmFlags,
    pub ops: Option<&'static VmOperations>,
}

impl VmArea {
    /// Build an area with the default protection derived from `flags`.
    #[must_use]
    pub const fn new(
        mm: MmId,
        start: VirtualAddress,
        end: VirtualAddress,
        pgoff: PageFrameNumber,
        flags: VmFlags,
    ) -> Self {
        let page_prot = PageProtection::for_user(
            flags.contains(VmFlags::WRITE),
            flags.contains(VmFlags::EXEC),
        );
        Self {
            mm,
            start,
            end,
            pgoff,
            page_prot,
            flags,
            ops: None,
        }
    }

    /// Length in bytes; an inverted area has length zero.
    #[must_use]
    pub const fn len(&self) -> u64 {
        match self.end.distance_from(self.start) {
            Some(len) => len,
            None => 0,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u64() >= self.start.as_u64() && va.as_u64() < self.end.as_u64()
    }

    /// Frame that `va` maps to in a linear PFN mapping of this area.
    #[must_use]
    pub const fn linear_pfn(&self, va: VirtualAddress) -> Option<PageFrameNumber> {
        if !self.contains(va) {
            return None;
        }
        let pages = (va.as_u64() - self.start.as_u64()) >> PAGE_SHIFT;
        self.pgoff.checked_add(pages)
    }

    /// Whether the remap primitive has populated this area.
    #[must_use]
    pub const fn is_pfn_mapped(&self) -> bool {
        self.flags.contains(VmFlags::PFNMAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PAGE_SIZE;

    fn area() -> VmArea {
        VmArea::new(
            MmId(1),
            VirtualAddress::new(0x7F00_0000_0000),
            VirtualAddress::new(0x7F00_0000_0000 + 2 * PAGE_SIZE),
            PageFrameNumber::new(0x200),
            VmFlags::READ | VmFlags::WRITE | VmFlags::SHARED,
        )
    }

    #[test]
    fn default_protection_follows_flags() {
        let vma = area();
        assert!(vma.page_prot.is_writable());
        assert!(vma.page_prot.uxn());
        assert!(vma.page_prot.is_cacheable());
        assert!(vma.ops.is_none());
    }

    #[test]
    fn linear_pfn_walks_pages() {
        let vma = area();
        assert_eq!(vma.len(), 2 * PAGE_SIZE);
        assert_eq!(vma.linear_pfn(vma.start), Some(PageFrameNumber::new(0x200)));
        assert_eq!(
            vma.linear_pfn(vma.start + PAGE_SIZE + 8),
            Some(PageFrameNumber::new(0x201))
        );
        assert_eq!(vma.linear_pfn(vma.end), None);
    }

    #[test]
    fn remapped_flags_cover_io_and_pfnmap() {
        assert!(VmFlags::REMAPPED.contains(VmFlags::IO | VmFlags::PFNMAP));
        assert!(!VmFlags::REMAPPED.contains(VmFlags::SHARED));
    }
}
