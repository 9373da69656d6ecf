use crate::dev_t::DeviceNumber;
use crate::errno::Errno;
use kernel_vmem::{MappingFile, VmArea};

bitflags::bitflags! {
    /// `open(2)` flags, using the generic Linux (and AArch64) values.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct OpenFlags: u32 {
        const WRONLY    = 0o0000_0001;
        const RDWR      = 0o0000_0002;
        const CREAT     = 0o0000_0100;
        const EXCL      = 0o0000_0200;
        const TRUNC     = 0o0000_1000;
        const APPEND    = 0o0000_2000;
        const NONBLOCK  = 0o0000_4000;
        const DSYNC     = 0o0001_0000;
        const CLOEXEC   = 0o0200_0000;
        /// `O_SYNC` is `__O_SYNC | O_DSYNC`.
        const SYNC      = 0o0401_0000;
    }
}

impl OpenFlags {
    /// `O_RDONLY` has no bit of its own.
    pub const RDONLY: Self = Self::empty();

    /// Access mode bits (`O_ACCMODE`).
    #[must_use]
    pub const fn access_mode(self) -> Self {
        self.intersection(Self::WRONLY.union(Self::RDWR))
    }

    #[must_use]
    pub const fn is_readable(self) -> bool {
        !self.contains(Self::WRONLY)
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.intersects(Self::WRONLY.union(Self::RDWR))
    }
}

/// An open file on a character device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct File {
    /// Device the file was opened on (`inode->i_rdev`).
    pub devt: DeviceNumber,
    pub flags: OpenFlags,
}

impl File {
    #[must_use]
    pub const fn new(devt: DeviceNumber, flags: OpenFlags) -> Self {
        Self { devt, flags }
    }
}

impl MappingFile for File {
    /// Any `O_DSYNC` bit counts, so plain `O_DSYNC` and `O_SYNC` both do.
    fn is_sync(&self) -> bool {
        self.flags.intersects(OpenFlags::DSYNC)
    }
}

/// The callback table of a character device (`struct file_operations`).
///
/// Missing handlers fall back to what the VFS does for a `NULL` slot.
pub trait FileOperations: Send + Sync {
    /// # Errors
    /// Whatever the driver refuses the open with.
    fn open(&self, _file: &File) -> Result<(), Errno> {
        Ok(())
    }

    /// # Errors
    /// Ignored by the VFS; reported for diagnostics only.
    fn release(&self, _file: &File) -> Result<(), Errno> {
        Ok(())
    }

    /// Bytes copied into `buf`.
    ///
    /// # Errors
    /// `EINVAL` when the driver has no read handler.
    fn read(&self, _file: &File, _buf: &mut [u8], _pos: &mut u64) -> Result<usize, Errno> {
        Err(Errno::InvalidArgument)
    }

    /// Bytes consumed from `buf`.
    ///
    /// # Errors
    /// `EINVAL` when the driver has no write handler.
    fn write(&self, _file: &File, _buf: &[u8], _pos: &mut u64) -> Result<usize, Errno> {
        Err(Errno::InvalidArgument)
    }

    /// # Errors
    /// `ENOTTY` when the driver has no ioctl handler.
    fn unlocked_ioctl(&self, _file: &File, _cmd: u32, _arg: u64) -> Result<i64, Errno> {
        Err(Errno::NotATty)
    }

    /// Populate `vma`. The VM layer discards the area if this fails.
    ///
    /// # Errors
    /// `ENODEV` when the driver cannot be mapped.
    fn mmap(&self, _file: &File, _vma: &mut VmArea) -> Result<(), Errno> {
        Err(Errno::NoDevice)
    }
}
