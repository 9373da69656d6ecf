use crate::{PAGE_SHIFT, PhysicalAddress};
use core::fmt;

/// Physical page frame number (`pfn`).
///
/// This is the unit `mmap` page offsets arrive in: a process passing a byte
/// offset of `0x0020_0000` ends up with a VMA page offset of `0x200`.
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pfn = PageFrameNumber::new(0x200);
/// assert_eq!(pfn.base(), Some(PhysicalAddress::new(0x0020_0000)));
///
/// // Frame numbers past the 52-bit boundary have no 64-bit base address.
/// assert_eq!(PageFrameNumber::new(u64::MAX).base(), None);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageFrameNumber(u64);

impl PageFrameNumber {
    /// Largest frame number whose base address still fits into 64 bits.
    pub const MAX: Self = Self(u64::MAX >> PAGE_SHIFT);

    #[inline]
    #[must_use]
    pub const fn new(pfn: u64) -> Self {
        Self(pfn)
    }

    /// Frame that contains `pa` (aligns down).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u64() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Base physical address of this frame, `None` if it does not fit.
    #[inline]
    #[must_use]
    pub const fn base(self) -> Option<PhysicalAddress> {
        if self.0 > Self::MAX.0 {
            return None;
        }
        Some(PhysicalAddress::new(self.0 << PAGE_SHIFT))
    }

    /// The frame `pages` frames further up, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, pages: u64) -> Option<Self> {
        match self.0.checked_add(pages) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for PageFrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PFN(0x{:X})", self.0)
    }
}

impl fmt::Display for PageFrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<u64> for PageFrameNumber {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}
