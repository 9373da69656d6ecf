//! # Page Protection Attributes (AArch64 stage-1)
//!
//! [`PageProtection`] models the attribute half of an AArch64 stage-1 page
//! descriptor, i.e. what Linux calls a `pgprot_t`. The output-address bits
//! are kept as padding: a protection value describes *how* a page is mapped,
//! the frame it points at travels separately.
//!
//! ### Bit layout (4 KiB granule, page descriptor)
//!
//! | Bits   | Name            | Meaning |
//! |--------|-----------------|---------|
//! | 0      | `valid`         | Descriptor is valid |
//! | 1      | `page`          | Page (vs. block) descriptor |
//! | 2–4    | `AttrIndx`      | Index into `MAIR_EL1`, see [`MemoryType`] |
//! | 5      | `NS`            | Non-secure |
//! | 6      | `AP[1]`         | EL0 accessible |
//! | 7      | `AP[2]`         | Read-only |
//! | 8–9    | `SH`            | Shareability, see [`Shareability`] |
//! | 10     | `AF`            | Access flag |
//! | 11     | `nG`            | Not global |
//! | 12–47  | OA              | Output address (unused here) |
//! | 52     | `Contiguous`    | Contiguous hint |
//! | 53     | `PXN`           | Privileged execute-never |
//! | 54     | `UXN`           | Unprivileged execute-never |
//! | 55–58  | software        | `DIRTY`, `SPECIAL`, reserved |

use bitfield_struct::bitfield;

/// Memory type selected through `AttrIndx`, using the Linux `MAIR_EL1` slot
/// assignment.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MemoryType {
    /// Normal write-back cacheable memory (`MT_NORMAL`).
    Normal = 0,
    /// Normal memory with MTE tags (`MT_NORMAL_TAGGED`).
    NormalTagged = 1,
    /// Normal non-cacheable memory (`MT_NORMAL_NC`), used for write-combining.
    NormalNonCacheable = 2,
    /// Strongly ordered device memory (`MT_DEVICE_nGnRnE`).
    DeviceNGnRnE = 3,
    /// Device memory allowing early write acknowledgement (`MT_DEVICE_nGnRE`).
    DeviceNGnRE = 4,
}

impl MemoryType {
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Unassigned MAIR slots decode as [`MemoryType::Normal`].
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value {
            1 => Self::NormalTagged,
            2 => Self::NormalNonCacheable,
            3 => Self::DeviceNGnRnE,
            4 => Self::DeviceNGnRE,
            _ => Self::Normal,
        }
    }

    /// Whether accesses may be served from the CPU caches.
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        matches!(self, Self::Normal | Self::NormalTagged)
    }

    #[must_use]
    pub const fn is_device(self) -> bool {
        matches!(self, Self::DeviceNGnRnE | Self::DeviceNGnRE)
    }
}

/// Shareability domain (`SH[1:0]`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Shareability {
    NonShareable = 0,
    OuterShareable = 2,
    InnerShareable = 3,
}

impl Shareability {
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// The reserved encoding `0b01` decodes as non-shareable.
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value {
            2 => Self::OuterShareable,
            3 => Self::InnerShareable,
            _ => Self::NonShareable,
        }
    }
}

/// Page protection attributes of a user mapping.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::{MemoryType, PageProtection};
/// let prot = PageProtection::for_user(true, false);
/// assert!(prot.is_writable());
/// assert!(prot.is_cacheable());
///
/// let mmio = prot.noncached();
/// assert_eq!(mmio.attr_index(), MemoryType::DeviceNGnRnE);
/// assert!(mmio.uxn() && mmio.pxn());
/// assert!(mmio.is_writable());
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq, Hash)]
pub struct PageProtection {
    /// Valid descriptor (bit 0).
    pub valid: bool,

    /// Page descriptor (bit 1); must be set at level 3.
    pub page: bool,

    /// `AttrIndx` (bits 2..=4).
    #[bits(3)]
    pub attr_index: MemoryType,

    /// Non-secure (bit 5).
    pub non_secure: bool,

    /// `AP[1]` (bit 6): accessible from EL0.
    pub user: bool,

    /// `AP[2]` (bit 7): read-only at every exception level.
    pub read_only: bool,

    /// `SH` (bits 8..=9).
    #[bits(2)]
    pub shareability: Shareability,

    /// Access flag (bit 10). Clear descriptors fault on first access.
    pub access_flag: bool,

    /// Not global (bit 11); user mappings are tagged with the ASID.
    pub not_global: bool,

    /// Output address bits 12..=47; frames travel separately.
    #[bits(36)]
    __: u64,

    /// Bits 48..=51 (`GP`, `DBM`, reserved).
    #[bits(4)]
    __: u8,

    /// Contiguous hint (bit 52).
    pub contiguous: bool,

    /// Privileged execute-never (bit 53).
    pub pxn: bool,

    /// Unprivileged execute-never (bit 54).
    pub uxn: bool,

    /// Software dirty bit (bit 55).
    pub sw_dirty: bool,

    /// Software "special" bit (bit 56): no `struct page` behind the frame.
    pub special: bool,

    /// Remaining software bits (57..=58).
    #[bits(2)]
    pub sw_reserved: u8,

    /// Ignored / PBHA bits (59..=63).
    #[bits(5)]
    __: u8,
}

impl PageProtection {
    /// Protection for a private or shared user mapping, the way the VM layer
    /// derives it from `PROT_*` bits before a driver gets to see it.
    #[must_use]
    pub const fn for_user(writable: bool, executable: bool) -> Self {
        Self::new()
            .with_valid(true)
            .with_page(true)
            .with_attr_index(MemoryType::Normal)
            .with_user(true)
            .with_read_only(!writable)
            .with_shareability(Shareability::InnerShareable)
            .with_access_flag(true)
            .with_not_global(true)
            .with_pxn(true)
            .with_uxn(!executable)
    }

    /// Strongly ordered, non-executable device mapping (`pgprot_noncached`).
    #[must_use]
    pub const fn noncached(self) -> Self {
        self.with_attr_index(MemoryType::DeviceNGnRnE)
            .with_pxn(true)
            .with_uxn(true)
    }

    /// Normal non-cacheable, non-executable mapping (`pgprot_writecombine`).
    #[must_use]
    pub const fn writecombine(self) -> Self {
        self.with_attr_index(MemoryType::NormalNonCacheable)
            .with_pxn(true)
            .with_uxn(true)
    }

    /// Device mapping allowing posted writes (`pgprot_device`).
    #[must_use]
    pub const fn device(self) -> Self {
        self.with_attr_index(MemoryType::DeviceNGnRE)
            .with_pxn(true)
            .with_uxn(true)
    }

    /// Mark the protection as a raw PFN mapping (`pte_mkspecial`).
    #[must_use]
    pub const fn special_mapping(self) -> Self {
        self.with_special(true)
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        !self.read_only()
    }

    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        self.attr_index().is_cacheable()
    }

    #[must_use]
    pub const fn is_device(self) -> bool {
        self.attr_index().is_device()
    }
}
