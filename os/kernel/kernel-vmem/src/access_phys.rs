//! Access to PFN-mapped areas from outside the owning process.
//!
//! Areas populated by the remap primitive have no `struct page` behind them,
//! so debuggers cannot use the regular page walk to read them. A driver
//! that wants to allow this attaches [`generic_access_phys`] as the `access`
//! callback of its [`VmOperations`](crate::VmOperations).

use crate::protection::PageProtection;
use crate::vma::{VmArea, VmFlags};
use kernel_memory_addresses::{PAGE_SIZE, PageFrameNumber, PhysicalAddress, VirtualAddress};

/// Direction and buffer of a single access.
#[derive(Debug)]
pub enum AccessOp<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl AccessOp<'_> {
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Read(buf) => buf.len(),
            Self::Write(buf) => buf.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// A leaf entry of a PFN mapping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PfnMapping {
    pub pfn: PageFrameNumber,
    pub prot: PageProtection,
}

/// What [`generic_access_phys`] needs from the VM layer.
pub trait PfnMapAccess {
    /// Look up the leaf entry mapping `addr` inside `vma`.
    fn follow_pfnmap(&self, vma: &VmArea, addr: VirtualAddress) -> Option<PfnMapping>;

    /// Copy from physical memory, honoring the mapping's memory type.
    ///
    /// # Errors
    /// Fails if no memory or device backs `pa`.
    fn read_phys(
        &self,
        pa: PhysicalAddress,
        buf: &mut [u8],
        prot: PageProtection,
    ) -> Result<(), VmAccessError>;

    /// Copy to physical memory, honoring the mapping's memory type.
    ///
    /// # Errors
    /// Fails if no memory or device backs `pa`.
    fn write_phys(
        &self,
        pa: PhysicalAddress,
        buf: &[u8],
        prot: PageProtection,
    ) -> Result<(), VmAccessError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmAccessError {
    #[error("area is not a PFN mapping")]
    NotPfnMapped,
    #[error("no page mapped at {0}")]
    NotMapped(VirtualAddress),
    #[error("write to read-only mapping at {0}")]
    ReadOnly(VirtualAddress),
    #[error("no memory backs physical address {0}")]
    NoBackingMemory(PhysicalAddress),
    #[error("area has no access handler")]
    NoAccessHandler,
}

/// Read or write through a PFN mapping without touching the process' page
/// tables (`generic_access_phys`).
///
/// At most the remainder of the page containing `addr` is transferred; the
/// number of bytes moved is returned so callers can continue page by page.
///
/// # Errors
/// - [`VmAccessError::NotPfnMapped`] if `vma` was not populated by the remap primitive.
/// - [`VmAccessError::NotMapped`] if no leaf entry covers `addr`.
/// - [`VmAccessError::ReadOnly`] for writes into a read-only mapping.
/// - Whatever the physical copy reports.
pub fn generic_access_phys(
    vma: &VmArea,
    mem: &dyn PfnMapAccess,
    addr: VirtualAddress,
    op: AccessOp<'_>,
) -> Result<usize, VmAccessError> {
    if !vma.flags.intersects(VmFlags::IO | VmFlags::PFNMAP) {
        return Err(VmAccessError::NotPfnMapped);
    }

    let entry = mem
        .follow_pfnmap(vma, addr)
        .ok_or(VmAccessError::NotMapped(addr))?;
    if op.is_write() && !entry.prot.is_writable() {
        return Err(VmAccessError::ReadOnly(addr));
    }

    let offset = addr.page_offset();
    let base = entry
        .pfn
        .base()
        .ok_or(VmAccessError::NotMapped(addr))?;
    let pa = base + offset;

    let room = usize::try_from(PAGE_SIZE - offset).unwrap_or(usize::MAX);
    let len = op.len().min(room);
    match op {
        AccessOp::Read(buf) => mem.read_phys(pa, &mut buf[..len], entry.prot)?,
        AccessOp::Write(buf) => mem.write_phys(pa, &buf[..len], entry.prot)?,
    }
    log::trace!("access_phys: {len} bytes at {addr} -> {pa}");
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vma::MmId;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    /// Two pages of "device" memory at frames 0x200 and 0x201, mapped
    /// linearly by whatever area asks.
    struct TwoPages {
        bytes: RefCell<Vec<u8>>,
        prot: PageProtection,
    }

    impl PfnMapAccess for TwoPages {
        fn follow_pfnmap(&self, vma: &VmArea, addr: VirtualAddress) -> Option<PfnMapping> {
            Some(PfnMapping {
                pfn: vma.linear_pfn(addr)?,
                prot: self.prot,
            })
        }

        fn read_phys(
            &self,
            pa: PhysicalAddress,
            buf: &mut [u8],
            _prot: PageProtection,
        ) -> Result<(), VmAccessError> {
            let off = (pa.as_u64() - 0x20_0000) as usize;
            buf.copy_from_slice(&self.bytes.borrow()[off..off + buf.len()]);
            Ok(())
        }

        fn write_phys(
            &self,
            pa: PhysicalAddress,
            buf: &[u8],
            _prot: PageProtection,
        ) -> Result<(), VmAccessError> {
            let off = (pa.as_u64() - 0x20_0000) as usize;
            self.bytes.borrow_mut()[off..off + buf.len()].copy_from_slice(buf);
            Ok(())
        }
    }

    fn mapped_area() -> VmArea {
        let mut vma = VmArea::new(
            MmId(7),
            VirtualAddress::new(0x1000_0000),
            VirtualAddress::new(0x1000_0000 + 2 * PAGE_SIZE),
            PageFrameNumber::new(0x200),
            VmFlags::READ | VmFlags::WRITE | VmFlags::SHARED,
        );
        vma.flags |= VmFlags::REMAPPED;
        vma
    }

    #[test]
    fn read_is_clipped_to_the_page() {
        let mem = TwoPages {
            bytes: RefCell::new((0..2 * PAGE_SIZE).map(|b| b as u8).collect()),
            prot: PageProtection::for_user(true, false).noncached(),
        };
        let vma = mapped_area();
        let mut buf = vec![0u8; 16];
        let n = generic_access_phys(
            &vma,
            &mem,
            vma.start + (PAGE_SIZE - 4),
            AccessOp::Read(&mut buf),
        )
        .unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[0xFC, 0xFD, 0xFE, 0xFF]);
    }

    #[test]
    fn write_lands_in_second_frame() {
        let mem = TwoPages {
            bytes: RefCell::new(vec![0u8; 2 * PAGE_SIZE as usize]),
            prot: PageProtection::for_user(true, false).noncached(),
        };
        let vma = mapped_area();
        let n = generic_access_phys(
            &vma,
            &mem,
            vma.start + PAGE_SIZE + 0x1C,
            AccessOp::Write(&[1, 2, 3, 4]),
        )
        .unwrap();
        assert_eq!(n, 4);
        let bytes = mem.bytes.borrow();
        assert_eq!(&bytes[PAGE_SIZE as usize + 0x1C..PAGE_SIZE as usize + 0x20], &[1, 2, 3, 4]);
    }

    #[test]
    fn read_only_mapping_rejects_writes() {
        let mem = TwoPages {
            bytes: RefCell::new(vec![0u8; 2 * PAGE_SIZE as usize]),
            prot: PageProtection::for_user(false, false).noncached(),
        };
        let vma = mapped_area();
        let err = generic_access_phys(&vma, &mem, vma.start, AccessOp::Write(&[1])).unwrap_err();
        assert_eq!(err, VmAccessError::ReadOnly(vma.start));
    }

    #[test]
    fn plain_area_is_refused() {
        let mem = TwoPages {
            bytes: RefCell::new(Vec::new()),
            prot: PageProtection::for_user(true, false),
        };
        let mut vma = mapped_area();
        vma.flags = VmFlags::READ;
        let mut buf = [0u8; 4];
        let err = generic_access_phys(&vma, &mem, vma.start, AccessOp::Read(&mut buf)).unwrap_err();
        assert_eq!(err, VmAccessError::NotPfnMapped);
    }
}
