use kernel_chrdev::{ChrdevError, DeviceNumber, Errno};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::RemapError;

/// Per-instance registration failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("minor index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("slot {0} is already in use")]
    SlotInUse(usize),
    #[error("registering {devt} failed: {source}")]
    RegistrationFailed {
        devt: DeviceNumber,
        source: ChrdevError,
    },
    #[error("creating the node for {devt} failed: {source}")]
    NamespaceFailed {
        devt: DeviceNumber,
        source: ChrdevError,
    },
}

/// Reasons an `mmap` request is refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("zero-length mapping")]
    Degenerate,
    #[error("mapping wraps the physical address space")]
    Overflow,
    #[error("physical range at {start} of {len:#x} bytes is not allowed")]
    NotAllowed { start: PhysicalAddress, len: u64 },
    #[error("remap failed: {0}")]
    Remap(#[from] RemapError),
}

/// Lifecycle failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GpioError {
    #[error("device number allocation failed: {0}")]
    AllocationFailed(#[source] ChrdevError),
    #[error("device class creation failed: {0}")]
    ClassCreationFailed(#[source] ChrdevError),
    #[error("initialization failed after {populated} instances: {source}")]
    PartialInitFailure {
        populated: usize,
        source: RegistryError,
    },
    #[error("mapping failed: {0}")]
    MappingFailed(#[from] MappingError),
    #[error("driver is already running")]
    AlreadyRunning,
}

impl From<RegistryError> for Errno {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::IndexOutOfRange(_) => Self::InvalidArgument,
            RegistryError::SlotInUse(_) => Self::Busy,
            RegistryError::RegistrationFailed { source, .. }
            | RegistryError::NamespaceFailed { source, .. } => source.into(),
        }
    }
}

impl From<MappingError> for Errno {
    fn from(value: MappingError) -> Self {
        match value {
            MappingError::Degenerate | MappingError::Overflow => Self::InvalidArgument,
            MappingError::NotAllowed { .. } => Self::NotPermitted,
            MappingError::Remap(e) => e.into(),
        }
    }
}

impl From<GpioError> for Errno {
    fn from(value: GpioError) -> Self {
        match value {
            GpioError::AllocationFailed(e) | GpioError::ClassCreationFailed(e) => e.into(),
            GpioError::PartialInitFailure { source, .. } => source.into(),
            GpioError::MappingFailed(e) => e.into(),
            GpioError::AlreadyRunning => Self::Busy,
        }
    }
}
