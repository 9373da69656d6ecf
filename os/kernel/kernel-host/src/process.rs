use crate::kernel::HostKernel;
use kernel_chrdev::{Errno, File, FileOperations, OpenFlags};
use kernel_memory_addresses::{
    PAGE_SHIFT, PAGE_SIZE, PageFrameNumber, VirtualAddress, page_align_up,
};
use kernel_vmem::{AccessOp, MmId, PfnMapping, VmArea, VmFlags};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

bitflags::bitflags! {
    /// `PROT_*` bits of `mmap(2)`.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct MmapProt: u32 {
        const READ  = 0x1;
        const WRITE = 0x2;
        const EXEC  = 0x4;
    }
}

bitflags::bitflags! {
    /// `MAP_*` sharing type of `mmap(2)`.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct MmapFlags: u32 {
        const SHARED  = 0x01;
        const PRIVATE = 0x02;
    }
}

/// A file descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fd(pub i32);

struct OpenFile {
    file: File,
    fops: Arc<dyn FileOperations>,
    pos: u64,
}

/// Lowest address handed out by `mmap`.
pub const MMAP_BASE: u64 = 0x0000_7F00_0000_0000;

/// A user process: a descriptor table and an address space.
///
/// Unprivileged processes are subject to the node's "other" permission
/// bits, which is how `DEVMODE` becomes observable.
pub struct Process {
    kernel: Arc<HostKernel>,
    mm: MmId,
    privileged: bool,
    files: BTreeMap<Fd, OpenFile>,
    next_fd: i32,
    vmas: Vec<VmArea>,
    next_va: u64,
}

impl HostKernel {
    /// Start an unprivileged process.
    #[must_use]
    pub fn spawn(self: &Arc<Self>) -> Process {
        Process::new(Arc::clone(self), false)
    }

    /// Start a process that bypasses node permissions.
    #[must_use]
    pub fn spawn_privileged(self: &Arc<Self>) -> Process {
        Process::new(Arc::clone(self), true)
    }
}

impl Process {
    fn new(kernel: Arc<HostKernel>, privileged: bool) -> Self {
        let mm = kernel.register_mm();
        Self {
            kernel,
            mm,
            privileged,
            files: BTreeMap::new(),
            next_fd: 3,
            vmas: Vec::new(),
            next_va: MMAP_BASE,
        }
    }

    #[must_use]
    pub const fn mm(&self) -> MmId {
        self.mm
    }

    /// Open `/dev/<name>`.
    ///
    /// # Errors
    /// `ENOENT` without a node, `EACCES` if the node mode forbids the access
    /// mode, `ENXIO` if no driver is bound to the number, or whatever the
    /// driver's `open` reports.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Fd, Errno> {
        let name = path.strip_prefix("/dev/").ok_or(Errno::NoEntry)?;
        let node = self.kernel.dev_node(name).ok_or(Errno::NoEntry)?;

        if !self.privileged {
            let mut need = 0;
            if flags.is_readable() {
                need |= 0o004;
            }
            if flags.is_writable() {
                need |= 0o002;
            }
            if node.mode & need != need {
                return Err(Errno::AccessDenied);
            }
        }

        let fops = self.kernel.lookup_cdev(node.devt).ok_or(Errno::NoDeviceOrAddress)?;
        let file = File::new(node.devt, flags);
        fops.open(&file)?;

        let fd = Fd(self.next_fd);
        self.next_fd += 1;
        self.files.insert(fd, OpenFile { file, fops, pos: 0 });
        Ok(fd)
    }

    /// # Errors
    /// `EBADF` for an unknown descriptor.
    pub fn close(&mut self, fd: Fd) -> Result<(), Errno> {
        let open = self.files.remove(&fd).ok_or(Errno::BadFileDescriptor)?;
        if let Err(e) = open.fops.release(&open.file) {
            debug!("close: release of {} reported {e}", open.file.devt);
        }
        Ok(())
    }

    /// # Errors
    /// `EBADF`, or the driver's error.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, Errno> {
        let open = self.files.get_mut(&fd).ok_or(Errno::BadFileDescriptor)?;
        if !open.file.flags.is_readable() {
            return Err(Errno::BadFileDescriptor);
        }
        open.fops.read(&open.file, buf, &mut open.pos)
    }

    /// # Errors
    /// `EBADF`, or the driver's error.
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, Errno> {
        let open = self.files.get_mut(&fd).ok_or(Errno::BadFileDescriptor)?;
        if !open.file.flags.is_writable() {
            return Err(Errno::BadFileDescriptor);
        }
        open.fops.write(&open.file, buf, &mut open.pos)
    }

    /// # Errors
    /// `EBADF`, or the driver's error.
    pub fn ioctl(&mut self, fd: Fd, cmd: u32, arg: u64) -> Result<i64, Errno> {
        let open = self.files.get(&fd).ok_or(Errno::BadFileDescriptor)?;
        open.fops.unlocked_ioctl(&open.file, cmd, arg)
    }

    /// Map `len` bytes of `fd` at byte `offset`, returning the address.
    ///
    /// # Errors
    /// The usual `mmap(2)` argument errors, or the driver's error. A failed
    /// driver `mmap` leaves no page of the would-be area mapped.
    pub fn mmap(
        &mut self,
        len: u64,
        prot: MmapProt,
        flags: MmapFlags,
        fd: Fd,
        offset: u64,
    ) -> Result<VirtualAddress, Errno> {
        if len == 0 || offset & (PAGE_SIZE - 1) != 0 {
            return Err(Errno::InvalidArgument);
        }
        if flags.contains(MmapFlags::SHARED) == flags.contains(MmapFlags::PRIVATE) {
            return Err(Errno::InvalidArgument);
        }
        let len = page_align_up(len).ok_or(Errno::OutOfMemory)?;
        let pgoff = offset >> PAGE_SHIFT;
        if pgoff.checked_add(len >> PAGE_SHIFT).is_none() {
            return Err(Errno::Overflow);
        }

        let open = self.files.get(&fd).ok_or(Errno::BadFileDescriptor)?;
        let shared = flags.contains(MmapFlags::SHARED);
        if !open.file.flags.is_readable()
            || (shared && prot.contains(MmapProt::WRITE) && !open.file.flags.is_writable())
        {
            return Err(Errno::AccessDenied);
        }

        let start = VirtualAddress::new(self.next_va);
        let end = start.checked_add(len).ok_or(Errno::OutOfMemory)?;

        let mut vm_flags = VmFlags::empty();
        vm_flags.set(VmFlags::READ, prot.contains(MmapProt::READ));
        vm_flags.set(VmFlags::WRITE, prot.contains(MmapProt::WRITE));
        vm_flags.set(VmFlags::EXEC, prot.contains(MmapProt::EXEC));
        vm_flags.set(VmFlags::SHARED, shared);
        let mut vma = VmArea::new(self.mm, start, end, PageFrameNumber::new(pgoff), vm_flags);

        if let Err(e) = open.fops.mmap(&open.file, &mut vma) {
            self.kernel.zap_range(self.mm, start, end);
            return Err(e);
        }

        self.next_va = end.as_u64() + PAGE_SIZE;
        self.vmas.push(vma);
        Ok(start)
    }

    /// Unmap every area lying inside `[addr, addr + len)`.
    ///
    /// # Errors
    /// `EINVAL` for an unaligned address or empty length.
    pub fn munmap(&mut self, addr: VirtualAddress, len: u64) -> Result<(), Errno> {
        if len == 0 || !addr.is_page_aligned() {
            return Err(Errno::InvalidArgument);
        }
        let len = page_align_up(len).ok_or(Errno::InvalidArgument)?;
        let end = addr.checked_add(len).ok_or(Errno::InvalidArgument)?;

        let (gone, kept): (Vec<VmArea>, Vec<VmArea>) = self
            .vmas
            .drain(..)
            .partition(|v| v.start >= addr && v.end <= end);
        self.vmas = kept;
        for vma in gone {
            self.kernel.zap_range(self.mm, vma.start, vma.end);
        }
        Ok(())
    }

    #[must_use]
    pub fn vmas(&self) -> &[VmArea] {
        &self.vmas
    }

    #[must_use]
    pub fn vma_at(&self, va: VirtualAddress) -> Option<&VmArea> {
        self.vmas.iter().find(|v| v.contains(va))
    }

    /// Page-table entry the MMU would use for `va`.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PfnMapping> {
        self.kernel.translate(self.mm, va)
    }

    /// A 32-bit load through the process' page tables.
    ///
    /// # Errors
    /// `EFAULT` where the access would raise `SIGSEGV`/`SIGBUS`.
    pub fn load_u32(&self, va: VirtualAddress) -> Result<u32, Errno> {
        let pa = self.resolve(va, false)?;
        Ok(self.kernel.phys_read_u32(pa)?)
    }

    /// A 32-bit store through the process' page tables.
    ///
    /// # Errors
    /// `EFAULT` where the access would raise `SIGSEGV`/`SIGBUS`, `EACCES`
    /// for a read-only page.
    pub fn store_u32(&self, va: VirtualAddress, value: u32) -> Result<(), Errno> {
        let pa = self.resolve(va, true)?;
        Ok(self.kernel.phys_write_u32(pa, value)?)
    }

    fn resolve(
        &self,
        va: VirtualAddress,
        write: bool,
    ) -> Result<kernel_memory_addresses::PhysicalAddress, Errno> {
        if va.as_u64() % 4 != 0 {
            return Err(Errno::BadAddress);
        }
        let vma = self.vma_at(va).ok_or(Errno::BadAddress)?;
        let allowed = if write { VmFlags::WRITE } else { VmFlags::READ };
        if !vma.flags.contains(allowed) {
            return Err(Errno::AccessDenied);
        }
        let leaf = self.translate(va).ok_or(Errno::BadAddress)?;
        if write && !leaf.prot.is_writable() {
            return Err(Errno::AccessDenied);
        }
        let base = leaf.pfn.base().ok_or(Errno::BadAddress)?;
        Ok(base + va.page_offset())
    }

    /// Access another process' memory the way `ptrace` does
    /// (`access_remote_vm`), through the area's `access` callback.
    ///
    /// # Errors
    /// `EFAULT` outside any area, `EIO` if the area has no callback, or the
    /// callback's error.
    pub fn access_remote(&self, va: VirtualAddress, op: AccessOp<'_>) -> Result<usize, Errno> {
        let vma = self.vma_at(va).ok_or(Errno::BadAddress)?;
        let access = vma.ops.and_then(|ops| ops.access).ok_or(Errno::Io)?;
        Ok(access(vma, &*self.kernel, va, op)?)
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        for (_, open) in std::mem::take(&mut self.files) {
            let _ = open.fops.release(&open.file);
        }
        self.kernel.unregister_mm(self.mm);
    }
}
