use crate::dev_t::DeviceNumberRange;
use crate::error::ChrdevError;

/// Device number bookkeeping (`fs/char_dev.c`).
pub trait ChrdevRegionAllocator {
    /// Reserve `count` minors starting at `base_minor` under a dynamically
    /// chosen major (`alloc_chrdev_region`).
    ///
    /// # Errors
    /// [`ChrdevError::NoFreeMajor`] when every dynamic major is taken,
    /// [`ChrdevError::InvalidRange`] for an empty or overflowing request.
    fn alloc_chrdev_region(
        &self,
        base_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DeviceNumberRange, ChrdevError>;

    /// Give a range back (`unregister_chrdev_region`). Releasing a range
    /// that is not registered is ignored.
    fn unregister_chrdev_region(&self, range: DeviceNumberRange);
}
