//! Page tables, the remap primitive and physical memory.

use crate::kernel::HostKernel;
use kernel_memory_addresses::{PAGE_SIZE, PageFrameNumber, PhysicalAddress, VirtualAddress};
use kernel_vmem::{
    MappingFile, PageProtection, PfnMapAccess, PfnMapping, PfnRemapper, ProtectionClassifier,
    RemapError, VmAccessError, VmArea, VmCapabilities, VmFlags, check_remap_args,
};
use log::{debug, trace};

impl PfnRemapper for HostKernel {
    fn remap_pfn_range(
        &self,
        vma: &mut VmArea,
        addr: VirtualAddress,
        pfn: PageFrameNumber,
        size: u64,
        prot: PageProtection,
    ) -> Result<(), RemapError> {
        let pages = check_remap_args(vma, addr, pfn, size)?;
        if pfn.as_u64() + pages > self.config.pfn_limit() {
            return Err(RemapError::InvalidPfn(pfn));
        }

        let faults = self.faults();
        if let Some(err) = faults.fail_remap {
            return Err(err);
        }

        let mut state = self.state.lock();
        if !state.mms.contains(&vma.mm) {
            return Err(RemapError::NoSuchAddressSpace);
        }
        let table = state
            .page_tables
            .get_mut(&vma.mm)
            .ok_or(RemapError::NoSuchAddressSpace)?;

        let first_vpn = addr.page_number();
        let leaf = prot.special_mapping();
        let mut installed = 0;
        let mut failure = None;
        for i in 0..pages {
            if faults.fail_remap_after_pages == Some(i) {
                failure = Some(RemapError::OutOfMemory);
                break;
            }
            let vpn = first_vpn + i;
            if table.contains_key(&vpn) {
                failure = Some(RemapError::AlreadyMapped(VirtualAddress::new(vpn * PAGE_SIZE)));
                break;
            }
            table.insert(
                vpn,
                PfnMapping {
                    pfn: PageFrameNumber::new(pfn.as_u64() + i),
                    prot: leaf,
                },
            );
            installed += 1;
        }

        if let Some(err) = failure {
            // zap what was installed so far
            for vpn in first_vpn..first_vpn + installed {
                table.remove(&vpn);
            }
            debug!("remap: {addr} +{size:#x} failed after {installed} pages: {err}");
            return Err(err);
        }

        vma.flags |= VmFlags::REMAPPED;
        debug!("remap: {addr} +{size:#x} -> pfn {pfn} ({pages} pages)");
        Ok(())
    }
}

impl ProtectionClassifier for HostKernel {
    fn phys_mem_access_prot(
        &self,
        file: &dyn MappingFile,
        pfn: PageFrameNumber,
        size: u64,
        requested: PageProtection,
    ) -> PageProtection {
        self.policy.phys_mem_access_prot(file, pfn, size, requested)
    }

    fn capabilities(&self) -> VmCapabilities {
        self.policy.capabilities()
    }
}

impl PfnMapAccess for HostKernel {
    fn follow_pfnmap(&self, vma: &VmArea, addr: VirtualAddress) -> Option<PfnMapping> {
        if !vma.contains(addr) {
            return None;
        }
        self.translate(vma.mm, addr)
    }

    fn read_phys(
        &self,
        pa: PhysicalAddress,
        buf: &mut [u8],
        _prot: PageProtection,
    ) -> Result<(), VmAccessError> {
        self.copy_phys(pa, buf.len(), |page, range| buf.copy_from_slice(&page[range]))
    }

    fn write_phys(
        &self,
        pa: PhysicalAddress,
        buf: &[u8],
        _prot: PageProtection,
    ) -> Result<(), VmAccessError> {
        self.copy_phys(pa, buf.len(), |page, range| page[range].copy_from_slice(buf))
    }
}

impl HostKernel {
    /// Leaf entry for `va` in address space `mm`.
    #[must_use]
    pub fn translate(&self, mm: kernel_vmem::MmId, va: VirtualAddress) -> Option<PfnMapping> {
        self.state
            .lock()
            .page_tables
            .get(&mm)?
            .get(&va.page_number())
            .copied()
    }

    /// Drop the leaf entries of `[start, end)` in `mm` (`zap_page_range`).
    pub(crate) fn zap_range(
        &self,
        mm: kernel_vmem::MmId,
        start: VirtualAddress,
        end: VirtualAddress,
    ) {
        let mut state = self.state.lock();
        if let Some(table) = state.page_tables.get_mut(&mm) {
            let zapped = (start.page_number()..end.page_number())
                .filter(|vpn| table.remove(vpn).is_some())
                .count();
            trace!("zap: {start}..{end} removed {zapped} entries");
        }
    }

    /// Hardware-side read of a 32-bit register or word.
    ///
    /// # Errors
    /// [`VmAccessError::NoBackingMemory`] beyond the physical address width.
    pub fn phys_read_u32(&self, pa: PhysicalAddress) -> Result<u32, VmAccessError> {
        let mut bytes = [0u8; 4];
        self.copy_phys(pa, 4, |page, range| bytes.copy_from_slice(&page[range]))?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Hardware-side write of a 32-bit register or word.
    ///
    /// # Errors
    /// [`VmAccessError::NoBackingMemory`] beyond the physical address width.
    pub fn phys_write_u32(&self, pa: PhysicalAddress, value: u32) -> Result<(), VmAccessError> {
        let bytes = value.to_le_bytes();
        self.copy_phys(pa, 4, |page, range| page[range].copy_from_slice(&bytes))
    }

    /// Run `f` on the page holding `[pa, pa + len)`, which must not cross a
    /// page boundary.
    fn copy_phys(
        &self,
        pa: PhysicalAddress,
        len: usize,
        f: impl FnOnce(&mut [u8], core::ops::Range<usize>),
    ) -> Result<(), VmAccessError> {
        let pfn = pa.pfn().as_u64();
        if pfn >= self.config.pfn_limit() || pa.page_offset() + len as u64 > PAGE_SIZE {
            return Err(VmAccessError::NoBackingMemory(pa));
        }
        let offset =
            usize::try_from(pa.page_offset()).map_err(|_| VmAccessError::NoBackingMemory(pa))?;
        let mut phys = self.phys.lock();
        let page = phys
            .entry(pfn)
            .or_insert_with(|| vec![0u8; PAGE_SIZE as usize].into_boxed_slice());
        f(page, offset..offset + len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{FaultPlan, HostConfig, HostKernel};
    use kernel_memory_addresses::*;
    use kernel_vmem::*;

    fn area(kernel: &HostKernel, pages: u64) -> VmArea {
        let mm = kernel.register_mm();
        VmArea::new(
            mm,
            VirtualAddress::new(0x7F00_0000_0000),
            VirtualAddress::new(0x7F00_0000_0000 + pages * PAGE_SIZE),
            PageFrameNumber::new(0x200),
            VmFlags::READ | VmFlags::WRITE | VmFlags::SHARED,
        )
    }

    fn remap(
        kernel: &HostKernel,
        vma: &mut VmArea,
        offset: u64,
        pfn: PageFrameNumber,
        size: u64,
    ) -> Result<(), RemapError> {
        let addr = vma.start + offset;
        let prot = vma.page_prot.noncached();
        kernel.remap_pfn_range(vma, addr, pfn, size, prot)
    }

    #[test]
    fn remap_installs_every_page_and_marks_the_area() {
        let kernel = HostKernel::new(HostConfig::default());
        let mut vma = area(&kernel, 3);
        remap(&kernel, &mut vma, 0, PageFrameNumber::new(0x200), 3 * PAGE_SIZE).unwrap();
        assert!(vma.flags.contains(VmFlags::REMAPPED));
        assert_eq!(kernel.mapped_pages(vma.mm), 3);

        let leaf = kernel.translate(vma.mm, vma.start + 2 * PAGE_SIZE).unwrap();
        assert_eq!(leaf.pfn, PageFrameNumber::new(0x202));
        assert!(leaf.prot.special());
        assert_eq!(leaf.prot.attr_index(), MemoryType::DeviceNGnRnE);
    }

    #[test]
    fn partial_failure_leaves_nothing_mapped() {
        let kernel = HostKernel::new(HostConfig::default().with_faults(FaultPlan {
            fail_remap_after_pages: Some(2),
            ..FaultPlan::none()
        }));
        let mut vma = area(&kernel, 4);
        let err =
            remap(&kernel, &mut vma, 0, PageFrameNumber::new(0x200), 4 * PAGE_SIZE).unwrap_err();
        assert_eq!(err, RemapError::OutOfMemory);
        assert_eq!(kernel.mapped_pages(vma.mm), 0);
        assert!(!vma.flags.contains(VmFlags::PFNMAP));
    }

    #[test]
    fn double_mapping_is_refused() {
        let kernel = HostKernel::new(HostConfig::default());
        let mut vma = area(&kernel, 2);
        let pfn = PageFrameNumber::new(0x200);
        remap(&kernel, &mut vma, PAGE_SIZE, pfn, PAGE_SIZE).unwrap();
        let err = remap(&kernel, &mut vma, 0, pfn, 2 * PAGE_SIZE).unwrap_err();
        assert_eq!(err, RemapError::AlreadyMapped(vma.start + PAGE_SIZE));
        assert_eq!(kernel.mapped_pages(vma.mm), 1);
    }

    #[test]
    fn frames_beyond_the_address_width_are_invalid() {
        let kernel = HostKernel::new(HostConfig::default());
        let mut vma = area(&kernel, 1);
        let pfn = PageFrameNumber::new(kernel.config().pfn_limit());
        assert_eq!(
            remap(&kernel, &mut vma, 0, pfn, PAGE_SIZE),
            Err(RemapError::InvalidPfn(pfn))
        );
    }

    #[test]
    fn dead_address_space_is_refused() {
        let kernel = HostKernel::new(HostConfig::default());
        let mut vma = area(&kernel, 1);
        kernel.unregister_mm(vma.mm);
        assert_eq!(
            remap(&kernel, &mut vma, 0, PageFrameNumber::new(0x200), PAGE_SIZE),
            Err(RemapError::NoSuchAddressSpace)
        );
    }

    #[test]
    fn physical_words_round_trip_through_sparse_pages() {
        let kernel = HostKernel::new(HostConfig::default());
        let pa = PhysicalAddress::new(0x0020_001C);
        assert_eq!(kernel.phys_read_u32(pa), Ok(0));
        kernel.phys_write_u32(pa, 0x2492_4924).unwrap();
        assert_eq!(kernel.phys_read_u32(pa), Ok(0x2492_4924));
        assert!(kernel.phys_read_u32(PhysicalAddress::new(0xFFC)).is_ok());
        assert!(kernel.phys_read_u32(PhysicalAddress::new(0xFFE)).is_err());
    }
}
