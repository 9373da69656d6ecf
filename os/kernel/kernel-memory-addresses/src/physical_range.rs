use crate::PhysicalAddress;
use core::fmt;

/// A half-open window `[start, start + len)` of physical memory.
///
/// Used to describe system RAM banks and MMIO windows (e.g. the BCM2711 GPIO
/// register block at `0xFE20_0000`).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalRange {
    start: PhysicalAddress,
    len: u64,
}

impl PhysicalRange {
    #[inline]
    #[must_use]
    pub const fn new(start: PhysicalAddress, len: u64) -> Self {
        Self { start, len }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exclusive end, or `None` if the range wraps the address space.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Option<PhysicalAddress> {
        self.start.checked_add(self.len)
    }

    /// Whether `pa` lies inside the range.
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        let Some(off) = pa.as_u64().checked_sub(self.start.as_u64()) else {
            return false;
        };
        off < self.len
    }

    /// Whether the whole of `[start, start + len)` lies inside the range.
    ///
    /// An empty request is never contained.
    #[must_use]
    pub const fn contains_range(&self, start: PhysicalAddress, len: u64) -> bool {
        if len == 0 {
            return false;
        }
        let Some(off) = start.as_u64().checked_sub(self.start.as_u64()) else {
            return false;
        };
        match off.checked_add(len) {
            Some(end_off) => end_off <= self.len,
            None => false,
        }
    }
}

impl fmt::Debug for PhysicalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysicalRange(0x{:016X}+0x{:X})",
            self.start.as_u64(),
            self.len
        )
    }
}
