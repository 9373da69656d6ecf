//! # Physical and Virtual Memory Address Types
//!
//! Strongly typed wrappers for the raw addresses that flow through the
//! character-device `mmap` path: the virtual range a process asks for, the
//! page frame it wants mapped there, and the physical windows a driver is
//! willing to expose.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address in a process' virtual address space. |
//! | [`PhysicalAddress`] | A host RAM or MMIO address. |
//! | [`PageFrameNumber`] | A physical address shifted right by [`PAGE_SHIFT`] (`pfn`). |
//! | [`PhysicalRange`] | A half-open `[start, start + len)` window of physical memory. |
//!
//! The `mmap` offset a process passes in is interpreted as a page frame
//! number once it reaches the driver (the VMA "page offset"), so the
//! conversions between [`PageFrameNumber`] and [`PhysicalAddress`] are
//! **checked**: a frame number whose base address does not fit into 64 bits
//! yields `None` instead of silently wrapping.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0020_0000);
//! let pfn = pa.pfn();
//! assert_eq!(pfn.as_u64(), 0x200);
//! assert_eq!(pfn.base(), Some(pa));
//!
//! let gpio = PhysicalRange::new(pa, PAGE_SIZE);
//! assert!(gpio.contains_range(pa, 0x100));
//! assert!(!gpio.contains_range(pa, PAGE_SIZE + 1));
//! ```
//!
//! ## Design Notes
//!
//! - All wrappers are `#[repr(transparent)]` over `u64` and `Copy`.
//! - Page geometry is fixed at 4 KiB, matching the granule the Raspberry Pi
//!   kernels are built with.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_frame_number;
mod physical_address;
mod physical_range;
mod virtual_address;

pub use crate::page_frame_number::PageFrameNumber;
pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_range::PhysicalRange;
pub use crate::virtual_address::VirtualAddress;

/// log2 of the page size.
pub const PAGE_SHIFT: u32 = 12;

/// Page size in bytes (4 KiB granule).
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Mask selecting the in-page offset bits.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Align `x` down to the containing page boundary.
///
/// ```rust
/// # use kernel_memory_addresses::page_align_down;
/// assert_eq!(page_align_down(0), 0);
/// assert_eq!(page_align_down(4095), 0);
/// assert_eq!(page_align_down(4097), 4096);
/// ```
#[inline(always)]
#[must_use]
pub const fn page_align_down(x: u64) -> u64 {
    x & !PAGE_OFFSET_MASK
}

/// Align `x` up to the next page boundary, returning `None` on overflow.
///
/// ```rust
/// # use kernel_memory_addresses::page_align_up;
/// assert_eq!(page_align_up(1), Some(4096));
/// assert_eq!(page_align_up(4096), Some(4096));
/// assert_eq!(page_align_up(u64::MAX), None);
/// ```
#[inline(always)]
#[must_use]
pub const fn page_align_up(x: u64) -> Option<u64> {
    match x.checked_add(PAGE_OFFSET_MASK) {
        Some(v) => Some(v & !PAGE_OFFSET_MASK),
        None => None,
    }
}

/// Returns `true` if `x` sits on a page boundary.
#[inline(always)]
#[must_use]
pub const fn is_page_aligned(x: u64) -> bool {
    x & PAGE_OFFSET_MASK == 0
}

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PAGE_SIZE == 4096);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_helpers_agree() {
        for x in [0u64, 1, 4095, 4096, 4097, 0x1234_5678] {
            let down = page_align_down(x);
            let up = page_align_up(x).unwrap();
            assert!(is_page_aligned(down));
            assert!(is_page_aligned(up));
            assert!(down <= x && x <= up);
            assert!(up - down <= PAGE_SIZE);
        }
    }

    #[test]
    fn align_up_saturates_to_none() {
        assert_eq!(page_align_up(u64::MAX - 10), None);
        assert_eq!(page_align_up(u64::MAX - PAGE_OFFSET_MASK), Some(u64::MAX - PAGE_OFFSET_MASK));
    }
}
