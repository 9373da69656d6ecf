use kernel_vmem::{RemapError, VmAccessError};

/// Error numbers returned across the file-operations boundary.
///
/// Discriminants are the Linux values; [`Errno::to_kernel_return`] yields
/// the negated form handlers return to the VFS.
///
/// ```rust
/// # use kernel_chrdev::Errno;
/// assert_eq!(Errno::InvalidArgument.as_i32(), 22);
/// assert_eq!(Errno::InvalidArgument.to_kernel_return(), -22);
/// assert_eq!(Errno::InvalidArgument.name(), "EINVAL");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[repr(i32)]
pub enum Errno {
    #[error("operation not permitted")]
    NotPermitted = 1,
    #[error("no such file or directory")]
    NoEntry = 2,
    #[error("input/output error")]
    Io = 5,
    #[error("no such device or address")]
    NoDeviceOrAddress = 6,
    #[error("bad file descriptor")]
    BadFileDescriptor = 9,
    #[error("cannot allocate memory")]
    OutOfMemory = 12,
    #[error("permission denied")]
    AccessDenied = 13,
    #[error("bad address")]
    BadAddress = 14,
    #[error("device or resource busy")]
    Busy = 16,
    #[error("file exists")]
    Exists = 17,
    #[error("no such device")]
    NoDevice = 19,
    #[error("invalid argument")]
    InvalidArgument = 22,
    #[error("inappropriate ioctl for device")]
    NotATty = 25,
    #[error("no space left on device")]
    NoSpace = 28,
    #[error("value too large for defined data type")]
    Overflow = 75,
}

impl Errno {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// The value a kernel handler returns (`-EINVAL` and friends).
    #[must_use]
    pub const fn to_kernel_return(self) -> i32 {
        -(self as i32)
    }

    /// Symbolic name as spelled in `errno.h`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotPermitted => "EPERM",
            Self::NoEntry => "ENOENT",
            Self::Io => "EIO",
            Self::NoDeviceOrAddress => "ENXIO",
            Self::BadFileDescriptor => "EBADF",
            Self::OutOfMemory => "ENOMEM",
            Self::AccessDenied => "EACCES",
            Self::BadAddress => "EFAULT",
            Self::Busy => "EBUSY",
            Self::Exists => "EEXIST",
            Self::NoDevice => "ENODEV",
            Self::InvalidArgument => "EINVAL",
            Self::NotATty => "ENOTTY",
            Self::NoSpace => "ENOSPC",
            Self::Overflow => "EOVERFLOW",
        }
    }
}

impl From<RemapError> for Errno {
    fn from(value: RemapError) -> Self {
        match value {
            RemapError::EmptyRange
            | RemapError::Unaligned { .. }
            | RemapError::OutsideVma { .. }
            | RemapError::InvalidPfn(_) => Self::InvalidArgument,
            RemapError::AlreadyMapped(_) => Self::AccessDenied,
            RemapError::OutOfMemory => Self::OutOfMemory,
            RemapError::NoSuchAddressSpace => Self::BadAddress,
        }
    }
}

impl From<VmAccessError> for Errno {
    fn from(value: VmAccessError) -> Self {
        match value {
            VmAccessError::NotPfnMapped => Self::InvalidArgument,
            VmAccessError::NotMapped(_) => Self::BadAddress,
            VmAccessError::ReadOnly(_) => Self::AccessDenied,
            VmAccessError::NoBackingMemory(_) | VmAccessError::NoAccessHandler => Self::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::VirtualAddress;

    #[test]
    fn remap_errors_translate_like_linux() {
        assert_eq!(Errno::from(RemapError::EmptyRange), Errno::InvalidArgument);
        assert_eq!(
            Errno::from(RemapError::AlreadyMapped(VirtualAddress::new(0x1000))),
            Errno::AccessDenied
        );
        assert_eq!(Errno::from(RemapError::OutOfMemory).to_kernel_return(), -12);
    }
}
