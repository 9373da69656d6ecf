//! # Mapping the Register Window
//!
//! An `mmap` of a GPIO node maps physical frames straight into the caller:
//! the page offset of the request *is* the first frame, the requested length
//! is the window size. The path is
//!
//! ```text
//! VmArea ──► MappingRequest ──validate──► PhysicalRange
//!                 │
//!                 └──► resolve_protection ──► install_mapping ──► MappingRegion
//! ```
//!
//! [`install_mapping`] is all-or-nothing from the caller's point of view:
//! if the remap fails the area's protection and callback table are put back.

use crate::config::PhysicalRangePolicy;
use crate::error::MappingError;
use kernel_chrdev::File;
use kernel_memory_addresses::{PageFrameNumber, PhysicalRange, VirtualAddress};
use kernel_vmem::{
    PageProtection, PfnRemapper, VmArea, VmCapabilities, VmOperations, generic_access_phys,
};
use log::{debug, warn};

/// Callbacks for GPIO mappings on platforms that can access physical memory
/// with an explicit protection.
pub static GPIO_VM_OPS: VmOperations = VmOperations {
    name: "rpi_gpio",
    access: Some(generic_access_phys),
};

/// Callbacks for GPIO mappings without remote access.
pub static GPIO_VM_OPS_NO_ACCESS: VmOperations = VmOperations {
    name: "rpi_gpio",
    access: None,
};

/// Callback table matching the platform's capabilities.
#[must_use]
pub const fn vm_operations(capabilities: VmCapabilities) -> &'static VmOperations {
    if capabilities.ioremap_prot {
        &GPIO_VM_OPS
    } else {
        &GPIO_VM_OPS_NO_ACCESS
    }
}

/// One `mmap` call, as seen by the driver.
#[derive(Copy, Clone, Debug)]
pub struct MappingRequest<'a> {
    pub start: VirtualAddress,
    pub end: VirtualAddress,
    /// First frame; the area's page offset taken verbatim.
    pub pfn: PageFrameNumber,
    pub file: &'a File,
}

impl<'a> MappingRequest<'a> {
    #[must_use]
    pub const fn from_vma(file: &'a File, vma: &VmArea) -> Self {
        Self {
            start: vma.start,
            end: vma.end,
            pfn: vma.pgoff,
            file,
        }
    }

    /// `end - start`, zero for an inverted request.
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

    /// Physical window the request names.
    ///
    /// # Errors
    /// [`MappingError::Degenerate`] for an empty request,
    /// [`MappingError::Overflow`] if the window does not fit the physical
    /// address space, [`MappingError::NotAllowed`] if `policy` refuses it.
    pub fn validate(&self, policy: &PhysicalRangePolicy) -> Result<PhysicalRange, MappingError> {
        let len = self.len();
        if len == 0 {
            return Err(MappingError::Degenerate);
        }
        let start = self.pfn.base().ok_or(MappingError::Overflow)?;
        if start.checked_add(len - 1).is_none() {
            return Err(MappingError::Overflow);
        }
        if !policy.permits(start, len) {
            return Err(MappingError::NotAllowed { start, len });
        }
        Ok(PhysicalRange::new(start, len))
    }
}

/// An installed mapping. The VM layer owns it from here on.
#[derive(Copy, Clone, Debug)]
pub struct MappingRegion {
    pub protection: PageProtection,
    pub ops: &'static VmOperations,
    pub len: u64,
}

/// Attach `ops` to `vma` and map the request's frames with `protection`.
///
/// # Errors
/// [`MappingError::Degenerate`] for an empty request, otherwise
/// [`MappingError::Remap`] with the primitive's error. On error `vma` is left
/// as it was passed in.
pub fn install_mapping<R>(
    platform: &R,
    vma: &mut VmArea,
    request: &MappingRequest<'_>,
    protection: PageProtection,
    ops: &'static VmOperations,
) -> Result<MappingRegion, MappingError>
where
    R: PfnRemapper + ?Sized,
{
    let len = request.len();
    if len == 0 {
        return Err(MappingError::Degenerate);
    }

    let saved = (vma.page_prot, vma.ops);
    vma.page_prot = protection;
    vma.ops = Some(ops);

    if let Err(e) = platform.remap_pfn_range(vma, request.start, request.pfn, len, protection) {
        warn!(
            "remap of {len:#x} bytes from {} for {} failed: {e}",
            request.pfn, request.file.devt
        );
        (vma.page_prot, vma.ops) = saved;
        return Err(e.into());
    }

    debug!(
        "mapped {len:#x} bytes from {} at {} as {:?}",
        request.pfn,
        request.start,
        protection.attr_index()
    );
    Ok(MappingRegion {
        protection,
        ops,
        len,
    })
}
