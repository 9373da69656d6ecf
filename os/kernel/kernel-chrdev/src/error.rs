use crate::dev_t::DeviceNumber;
use crate::errno::Errno;
use crate::uevent::UeventError;

/// Failures of the character-device and class registration services.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChrdevError {
    #[error("no free dynamic major number")]
    NoFreeMajor,
    #[error("device number range at {0} is busy")]
    RangeBusy(DeviceNumber),
    #[error("invalid device number range")]
    InvalidRange,
    #[error("a class with that name already exists")]
    ClassExists,
    #[error("no such class")]
    NoSuchClass,
    #[error("device {0} already exists")]
    DeviceExists(DeviceNumber),
    #[error("device {0} is already bound to a driver")]
    CdevBusy(DeviceNumber),
    #[error("out of memory")]
    OutOfMemory,
    #[error("uevent failed: {0}")]
    Uevent(#[from] UeventError),
}

impl From<ChrdevError> for Errno {
    fn from(value: ChrdevError) -> Self {
        match value {
            ChrdevError::NoFreeMajor | ChrdevError::RangeBusy(_) | ChrdevError::CdevBusy(_) => {
                Self::Busy
            }
            ChrdevError::InvalidRange => Self::InvalidArgument,
            ChrdevError::ClassExists | ChrdevError::DeviceExists(_) => Self::Exists,
            ChrdevError::NoSuchClass => Self::NoDevice,
            ChrdevError::OutOfMemory | ChrdevError::Uevent(_) => Self::OutOfMemory,
        }
    }
}
