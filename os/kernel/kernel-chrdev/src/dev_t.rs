//! Device numbers (`dev_t`) and contiguous ranges of them.

use bitfield_struct::bitfield;
use core::fmt;

/// Width of the minor field.
pub const MINOR_BITS: u32 = 20;

/// Largest major number (`12` bits).
pub const MAJOR_MAX: u32 = (1 << (32 - MINOR_BITS)) - 1;

/// Largest minor number (`20` bits).
pub const MINOR_MAX: u32 = (1 << MINOR_BITS) - 1;

/// A kernel-internal device number, `MKDEV(major, minor)`.
///
/// ```rust
/// # use kernel_chrdev::DeviceNumber;
/// let dev = DeviceNumber::mkdev(511, 3).unwrap();
/// assert_eq!(dev.into_bits(), (511 << 20) | 3);
/// assert_eq!(dev.to_string(), "511:3");
///
/// assert!(DeviceNumber::mkdev(4096, 0).is_none());
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceNumber {
    #[bits(20)]
    pub minor: u32,
    #[bits(12)]
    pub major: u32,
}

impl DeviceNumber {
    /// Combine `major` and `minor`, `None` if either does not fit.
    #[must_use]
    pub const fn mkdev(major: u32, minor: u32) -> Option<Self> {
        if major > MAJOR_MAX || minor > MINOR_MAX {
            return None;
        }
        Some(Self::new().with_major(major).with_minor(minor))
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// A contiguous run of minors under one major, as handed out by
/// `alloc_chrdev_region`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceNumberRange {
    first: DeviceNumber,
    count: u32,
}

impl DeviceNumberRange {
    /// `None` if the range would run past [`MINOR_MAX`] or is empty.
    #[must_use]
    pub const fn new(first: DeviceNumber, count: u32) -> Option<Self> {
        if count == 0 {
            return None;
        }
        match first.minor().checked_add(count - 1) {
            Some(last) if last <= MINOR_MAX => Some(Self { first, count }),
            _ => None,
        }
    }

    #[must_use]
    pub const fn first(&self) -> DeviceNumber {
        self.first
    }

    #[must_use]
    pub const fn major(&self) -> u32 {
        self.first.major()
    }

    #[must_use]
    pub const fn base_minor(&self) -> u32 {
        self.first.minor()
    }

    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub const fn contains(&self, dev: DeviceNumber) -> bool {
        dev.major() == self.major()
            && dev.minor() >= self.base_minor()
            && dev.minor() - self.base_minor() < self.count
    }

    /// The `index`-th number of the range.
    #[must_use]
    pub const fn nth(&self, index: u32) -> Option<DeviceNumber> {
        if index >= self.count {
            return None;
        }
        DeviceNumber::mkdev(self.major(), self.base_minor() + index)
    }

    /// Whether two ranges share at least one number.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        if self.major() != other.major() {
            return false;
        }
        let a = self.base_minor();
        let b = other.base_minor();
        a < b + other.count && b < a + self.count
    }

    pub fn iter(&self) -> impl Iterator<Item = DeviceNumber> + '_ {
        (0..self.count).filter_map(|i| self.nth(i))
    }
}

impl fmt::Display for DeviceNumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}..{}",
            self.major(),
            self.base_minor(),
            self.base_minor() + self.count
        )
    }
}
