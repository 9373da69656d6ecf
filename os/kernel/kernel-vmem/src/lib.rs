//! # Virtual Memory Support for PFN Mappings
//!
//! The pieces of the VM layer a character driver touches when it maps a
//! physical window into a process:
//!
//! - [`PageProtection`]: the attribute bits of an AArch64 stage-1 page
//!   descriptor (`pgprot_t`), with the cache transforms
//!   ([`noncached`](PageProtection::noncached),
//!   [`writecombine`](PageProtection::writecombine)).
//! - [`VmArea`] / [`VmFlags`] / [`VmOperations`]: the area being set up by
//!   `mmap`, its flags and its callback table.
//! - [`ProtectionClassifier`]: the architecture hook that decides the
//!   caching attributes for a physical range (`phys_mem_access_prot`).
//! - [`PfnRemapper`]: the `remap_pfn_range` contract.
//! - [`generic_access_phys`]: the stock access callback for PFN areas.
//!
//! ## The `mmap` path
//!
//! ```text
//!  mmap(fd, len, off)
//!     │
//!     ▼
//!  VmArea { start, end, pgoff = off >> 12, page_prot = for_user(..) }
//!     │ driver mmap handler
//!     ├─► ProtectionClassifier::phys_mem_access_prot  → page_prot
//!     ├─► vma.ops = &VmOperations { access: generic_access_phys }
//!     └─► PfnRemapper::remap_pfn_range                 → IO | PFNMAP | ...
//! ```
//!
//! The VM layer owns the collaborators' implementations; this crate only
//! carries the types and contracts so drivers stay testable on a host.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod access_phys;
mod access_policy;
mod protection;
mod remap;
mod vma;

pub use crate::access_phys::{
    AccessOp, PfnMapAccess, PfnMapping, VmAccessError, generic_access_phys,
};
pub use crate::access_policy::{
    Arm64MemoryPolicy, MappingFile, PassThroughPolicy, ProtectionClassifier, ProtectionPolicy,
    VmCapabilities,
};
pub use crate::protection::{MemoryType, PageProtection, Shareability};
pub use crate::remap::{PfnRemapper, RemapError, check_remap_args};
pub use crate::vma::{MmId, VmAccessFn, VmArea, VmFlags, VmOperations};
