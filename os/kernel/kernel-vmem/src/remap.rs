//! # PFN Remapping
//!
//! [`PfnRemapper`] is the contract of `remap_pfn_range`: populate a
//! user area with raw frame mappings, all or nothing. Implementations share
//! the argument checks in [`check_remap_args`] so every backend rejects the
//! same requests with the same error.

use crate::protection::PageProtection;
use crate::vma::VmArea;
use kernel_memory_addresses::{PAGE_SHIFT, PageFrameNumber, VirtualAddress, is_page_aligned};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemapError {
    #[error("empty remap request")]
    EmptyRange,
    #[error("remap request at {addr} of {size:#x} bytes is not page aligned")]
    Unaligned { addr: VirtualAddress, size: u64 },
    #[error("remap request at {addr} of {size:#x} bytes exceeds the area")]
    OutsideVma { addr: VirtualAddress, size: u64 },
    #[error("frame {0} cannot be mapped")]
    InvalidPfn(PageFrameNumber),
    #[error("address {0} is already mapped")]
    AlreadyMapped(VirtualAddress),
    #[error("out of memory for page tables")]
    OutOfMemory,
    #[error("the area's address space is gone")]
    NoSuchAddressSpace,
}

/// Installs direct physical-to-virtual page mappings into a user area.
pub trait PfnRemapper {
    /// Map `size` bytes of frames starting at `pfn` to `addr` inside `vma`.
    ///
    /// On success the area carries [`VmFlags::REMAPPED`](crate::VmFlags::REMAPPED)
    /// and every page of `[addr, addr + size)` resolves to the matching frame
    /// with protection `prot`. On failure nothing is mapped.
    ///
    /// # Errors
    /// See [`RemapError`].
    fn remap_pfn_range(
        &self,
        vma: &mut VmArea,
        addr: VirtualAddress,
        pfn: PageFrameNumber,
        size: u64,
        prot: PageProtection,
    ) -> Result<(), RemapError>;
}

/// Number of pages a valid remap request covers.
///
/// # Errors
/// Rejects empty, unaligned and out-of-area requests, and frame ranges that
/// run past [`PageFrameNumber::MAX`].
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// # use kernel_vmem::*;
/// let vma = VmArea::new(
///     MmId(1),
///     VirtualAddress::new(0x10000),
///     VirtualAddress::new(0x12000),
///     PageFrameNumber::new(0x200),
///     VmFlags::READ | VmFlags::SHARED,
/// );
/// assert_eq!(check_remap_args(&vma, vma.start, vma.pgoff, 0x2000), Ok(2));
/// assert_eq!(
///     check_remap_args(&vma, vma.start, vma.pgoff, 0x3000),
///     Err(RemapError::OutsideVma { addr: vma.start, size: 0x3000 })
/// );
/// ```
pub fn check_remap_args(
    vma: &VmArea,
    addr: VirtualAddress,
    pfn: PageFrameNumber,
    size: u64,
) -> Result<u64, RemapError> {
    if size == 0 {
        return Err(RemapError::EmptyRange);
    }
    if !addr.is_page_aligned() || !is_page_aligned(size) {
        return Err(RemapError::Unaligned { addr, size });
    }

    let end = addr
        .checked_add(size)
        .ok_or(RemapError::OutsideVma { addr, size })?;
    if addr < vma.start || end > vma.end {
        return Err(RemapError::OutsideVma { addr, size });
    }

    let pages = size >> PAGE_SHIFT;
    match pfn.checked_add(pages - 1) {
        Some(last) if last <= PageFrameNumber::MAX => Ok(pages),
        _ => Err(RemapError::InvalidPfn(pfn)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vma::{MmId, VmFlags};
    use kernel_memory_addresses::PAGE_SIZE;

    fn vma() -> VmArea {
        VmArea::new(
            MmId(3),
            VirtualAddress::new(0x4000_0000),
            VirtualAddress::new(0x4000_0000 + 4 * PAGE_SIZE),
            PageFrameNumber::new(0),
            VmFlags::READ | VmFlags::WRITE | VmFlags::SHARED,
        )
    }

    #[test]
    fn rejects_degenerate_requests() {
        let v = vma();
        assert_eq!(check_remap_args(&v, v.start, v.pgoff, 0), Err(RemapError::EmptyRange));
        assert_eq!(
            check_remap_args(&v, v.start + 8, v.pgoff, PAGE_SIZE),
            Err(RemapError::Unaligned {
                addr: v.start + 8,
                size: PAGE_SIZE
            })
        );
        assert_eq!(
            check_remap_args(&v, v.start, v.pgoff, 100),
            Err(RemapError::Unaligned {
                addr: v.start,
                size: 100
            })
        );
    }

    #[test]
    fn request_may_cover_a_tail_of_the_area() {
        let v = vma();
        assert_eq!(
            check_remap_args(&v, v.start + 2 * PAGE_SIZE, v.pgoff, 2 * PAGE_SIZE),
            Ok(2)
        );
        assert!(matches!(
            check_remap_args(&v, v.start + 3 * PAGE_SIZE, v.pgoff, 2 * PAGE_SIZE),
            Err(RemapError::OutsideVma { .. })
        ));
    }

    #[test]
    fn frame_range_must_fit() {
        let v = vma();
        assert_eq!(check_remap_args(&v, v.start, PageFrameNumber::MAX, PAGE_SIZE), Ok(1));
        assert_eq!(
            check_remap_args(&v, v.start, PageFrameNumber::MAX, 2 * PAGE_SIZE),
            Err(RemapError::InvalidPfn(PageFrameNumber::MAX))
        );
    }
}
