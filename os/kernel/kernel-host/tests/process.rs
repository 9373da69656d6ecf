use kernel_chrdev::*;
use kernel_host::*;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_vmem::{AccessOp, PfnRemapper, VmArea, VmOperations, generic_access_phys};
use std::sync::{Arc, Weak};

static MEM_VM_OPS: VmOperations = VmOperations {
    name: "mem",
    access: Some(generic_access_phys),
};

/// A `/dev/mem` lookalike: maps whatever the offset names, as asked.
struct Mem {
    kernel: Weak<HostKernel>,
}

impl FileOperations for Mem {
    fn mmap(&self, _file: &File, vma: &mut VmArea) -> Result<(), Errno> {
        let kernel = self.kernel.upgrade().ok_or(Errno::NoDevice)?;
        vma.ops = Some(&MEM_VM_OPS);
        let (start, pgoff, len, prot) = (vma.start, vma.pgoff, vma.len(), vma.page_prot);
        kernel.remap_pfn_range(vma, start, pgoff, len, prot)?;
        Ok(())
    }
}

fn boot(mode: u32) -> Arc<HostKernel> {
    let kernel = HostKernel::new(HostConfig::raspberry_pi4());
    let range = kernel.alloc_chrdev_region(0, 1, "mem").unwrap();
    let dev = range.first();
    kernel
        .cdev_add(dev, 1, Arc::new(Mem { kernel: Arc::downgrade(&kernel) }))
        .unwrap();
    let class = kernel.class_create("mem").unwrap();
    kernel
        .class_set_uevent(
            class,
            Arc::new(move |_: &DeviceInfo, env: &mut UeventEnv| {
                env.add_var(format_args!("DEVMODE=0{mode:o}"))
            }),
        )
        .unwrap();
    kernel.device_create(class, dev, "mem").unwrap();
    kernel
}

#[test]
fn node_mode_gates_unprivileged_opens() {
    let kernel = boot(0o640);
    let mut user = kernel.spawn();
    assert_eq!(user.open("/dev/mem", OpenFlags::RDWR), Err(Errno::AccessDenied));
    assert_eq!(user.open("/dev/nope", OpenFlags::RDWR), Err(Errno::NoEntry));

    let mut root = kernel.spawn_privileged();
    let fd = root.open("/dev/mem", OpenFlags::RDWR).unwrap();
    // the driver has no read handler
    assert_eq!(root.read(fd, &mut [0; 4]), Err(Errno::InvalidArgument));
    assert_eq!(root.close(fd), Ok(()));
    assert_eq!(root.close(fd), Err(Errno::BadFileDescriptor));
}

#[test]
fn stores_through_a_mapping_reach_physical_memory() {
    let kernel = boot(0o666);
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/mem", OpenFlags::RDWR | OpenFlags::SYNC).unwrap();
    let va = proc
        .mmap(PAGE_SIZE, MmapProt::READ | MmapProt::WRITE, MmapFlags::SHARED, fd, 0x0020_0000)
        .unwrap();
    assert_eq!(va.as_u64(), MMAP_BASE);

    proc.store_u32(va + 0x1C, 0x0000_0010).unwrap();
    assert_eq!(kernel.phys_read_u32(PhysicalAddress::new(0x0020_001C)), Ok(0x10));

    kernel.phys_write_u32(PhysicalAddress::new(0x0020_0034), 0xDEAD_BEEF).unwrap();
    assert_eq!(proc.load_u32(va + 0x34), Ok(0xDEAD_BEEF));

    assert_eq!(proc.load_u32(va + PAGE_SIZE), Err(Errno::BadAddress));
    assert_eq!(proc.load_u32(va + 2), Err(Errno::BadAddress));
}

#[test]
fn remote_access_goes_through_the_area_callback() {
    let kernel = boot(0o666);
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/mem", OpenFlags::RDWR).unwrap();
    let va = proc
        .mmap(2 * PAGE_SIZE, MmapProt::READ | MmapProt::WRITE, MmapFlags::SHARED, fd, 0x0020_0000)
        .unwrap();

    let n = proc
        .access_remote(va + PAGE_SIZE + 8, AccessOp::Write(&[0xAA, 0xBB]))
        .unwrap();
    assert_eq!(n, 2);
    let mut buf = [0u8; 2];
    proc.access_remote(va + PAGE_SIZE + 8, AccessOp::Read(&mut buf)).unwrap();
    assert_eq!(buf, [0xAA, 0xBB]);
    assert_eq!(
        kernel.phys_read_u32(PhysicalAddress::new(0x0020_1008)),
        Ok(0xBBAA)
    );
}

#[test]
fn failed_driver_mmap_leaves_nothing_behind() {
    let kernel = boot(0o666);
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/mem", OpenFlags::RDWR).unwrap();

    kernel.set_faults(FaultPlan {
        fail_remap_after_pages: Some(1),
        ..FaultPlan::none()
    });
    let err = proc
        .mmap(4 * PAGE_SIZE, MmapProt::READ, MmapFlags::SHARED, fd, 0x0020_0000)
        .unwrap_err();
    assert_eq!(err, Errno::OutOfMemory);
    assert!(proc.vmas().is_empty());
    assert_eq!(kernel.mapped_pages(proc.mm()), 0);
}

#[test]
fn mmap_argument_checks() {
    let kernel = boot(0o666);
    let mut proc = kernel.spawn();
    let ro = proc.open("/dev/mem", OpenFlags::RDONLY).unwrap();
    let rw = MmapProt::READ | MmapProt::WRITE;
    assert_eq!(proc.mmap(0, rw, MmapFlags::SHARED, ro, 0), Err(Errno::InvalidArgument));
    assert_eq!(proc.mmap(PAGE_SIZE, rw, MmapFlags::SHARED, ro, 12), Err(Errno::InvalidArgument));
    assert_eq!(proc.mmap(PAGE_SIZE, rw, MmapFlags::empty(), ro, 0), Err(Errno::InvalidArgument));
    assert_eq!(proc.mmap(PAGE_SIZE, rw, MmapFlags::SHARED, ro, 0), Err(Errno::AccessDenied));
    assert_eq!(
        proc.mmap(PAGE_SIZE, rw, MmapFlags::SHARED, Fd(99), 0),
        Err(Errno::BadFileDescriptor)
    );
}

#[test]
fn munmap_and_exit_release_page_tables() {
    let kernel = boot(0o666);
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/mem", OpenFlags::RDWR).unwrap();
    let a = proc.mmap(PAGE_SIZE, MmapProt::READ, MmapFlags::SHARED, fd, 0).unwrap();
    let _b = proc.mmap(PAGE_SIZE, MmapProt::READ, MmapFlags::SHARED, fd, 0).unwrap();
    assert_eq!(kernel.mapped_pages(proc.mm()), 2);

    proc.munmap(a, PAGE_SIZE).unwrap();
    assert_eq!(kernel.mapped_pages(proc.mm()), 1);
    assert!(proc.vma_at(a).is_none());

    drop(proc);
    assert_eq!(kernel.mapped_bytes(), 0);
}
