use kernel_chrdev::{DeviceNumber, Errno, File, FileOperations, OpenFlags};
use kernel_host::{FaultPlan, HostArch, HostConfig, HostKernel, MmapFlags, MmapProt};
use kernel_memory_addresses::{
    PAGE_SIZE, PageFrameNumber, PhysicalAddress, PhysicalRange, VirtualAddress,
};
use kernel_vmem::{AccessOp, MemoryType, MmId, RemapError, VmArea, VmCapabilities, VmFlags};
use rpi_gpio::*;
use std::sync::Arc;

const GPIO_OFFSET: u64 = 0x0020_0000;
const RW: MmapProt = MmapProt::READ.union(MmapProt::WRITE);

fn running(config: HostConfig) -> (Arc<HostKernel>, GpioDriver<HostKernel>) {
    let kernel = HostKernel::new(config);
    let driver = GpioDriver::start(kernel.clone(), DriverConfig::default()).unwrap();
    (kernel, driver)
}

#[test]
fn gpio_window_is_mapped_strongly_ordered() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4());
    let mut proc = kernel.spawn();
    let fd = proc
        .open(
            "/dev/RPI_GPIO_3",
            OpenFlags::RDWR | OpenFlags::SYNC | OpenFlags::CLOEXEC,
        )
        .unwrap();
    let va = proc.mmap(4096, RW, MmapFlags::SHARED, fd, GPIO_OFFSET).unwrap();

    let vma = proc.vma_at(va).unwrap();
    assert_eq!(vma.len(), 4096);
    assert!(vma.flags.contains(VmFlags::REMAPPED));
    assert_eq!(vma.page_prot.attr_index(), MemoryType::DeviceNGnRnE);
    assert!(vma.page_prot.uxn() && vma.page_prot.pxn());
    assert!(std::ptr::eq(vma.ops.unwrap(), &GPIO_VM_OPS));

    let leaf = proc.translate(va).unwrap();
    assert_eq!(leaf.pfn, PageFrameNumber::new(0x200));
    assert_eq!(leaf.prot.attr_index(), MemoryType::DeviceNGnRnE);
    assert_eq!(kernel.mapped_pages(proc.mm()), 1);

    // GPFSEL1 of the register block, as the probe tool pokes it
    proc.store_u32(va + 0x04, 1 << 21).unwrap();
    assert_eq!(kernel.phys_read_u32(PhysicalAddress::new(GPIO_OFFSET + 0x04)), Ok(1 << 21));
    kernel.phys_write_u32(PhysicalAddress::new(GPIO_OFFSET + 0x34), 0x0001_0000).unwrap();
    assert_eq!(proc.load_u32(va + 0x34), Ok(0x0001_0000));

    proc.close(fd).unwrap();
    drop(proc);
    driver.stop();
    assert!(kernel.is_clean());
}

#[test]
fn zero_length_request_fails_before_remapping() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4());
    let file = File::new(DeviceNumber::mkdev(511, 0).unwrap(), OpenFlags::RDWR);
    let start = VirtualAddress::new(0x7F00_0000_0000);
    let mut vma = VmArea::new(
        MmId(42),
        start,
        start,
        PageFrameNumber::new(0x200),
        VmFlags::READ | VmFlags::WRITE | VmFlags::SHARED,
    );

    assert_eq!(
        driver.file_operations().mmap(&file, &mut vma),
        Err(Errno::InvalidArgument)
    );

    let request = MappingRequest::from_vma(&file, &vma);
    let prot = vma.page_prot;
    let err = install_mapping(&*kernel, &mut vma, &request, prot, &GPIO_VM_OPS).unwrap_err();
    assert_eq!(err, MappingError::Degenerate);
    assert_eq!(
        GpioError::from(err),
        GpioError::MappingFailed(MappingError::Degenerate)
    );
    assert!(vma.ops.is_none());
    assert_eq!(kernel.mapped_bytes(), 0);
    driver.stop();
}

#[test]
fn failed_remap_leaves_nothing_mapped() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4());
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_0", OpenFlags::RDWR).unwrap();

    kernel.set_faults(FaultPlan {
        fail_remap_after_pages: Some(2),
        ..FaultPlan::none()
    });
    assert_eq!(
        proc.mmap(4 * PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET),
        Err(Errno::OutOfMemory)
    );
    assert!(proc.vmas().is_empty());
    assert_eq!(kernel.mapped_pages(proc.mm()), 0);

    kernel.set_faults(FaultPlan {
        fail_remap: Some(RemapError::InvalidPfn(PageFrameNumber::new(0x200))),
        ..FaultPlan::none()
    });
    assert_eq!(
        proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET),
        Err(Errno::InvalidArgument)
    );

    kernel.set_faults(FaultPlan::none());
    let va = proc
        .mmap(4 * PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET)
        .unwrap();
    assert_eq!(kernel.mapped_pages(proc.mm()), 4);
    assert_eq!(
        proc.translate(va + 3 * PAGE_SIZE).map(|m| m.pfn),
        Some(PageFrameNumber::new(0x203))
    );

    drop(proc);
    driver.stop();
}

#[test]
fn frames_beyond_the_physical_address_space_are_refused() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4());
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_1", OpenFlags::RDWR).unwrap();

    // 40 physical address bits on this machine
    assert_eq!(
        proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, 1 << 40),
        Err(Errno::InvalidArgument)
    );
    // wraps the 64-bit space
    assert_eq!(
        proc.mmap(2 * PAGE_SIZE, RW, MmapFlags::SHARED, fd, u64::MAX & !(PAGE_SIZE - 1)),
        Err(Errno::InvalidArgument)
    );
    assert!(proc.vmas().is_empty());

    drop(proc);
    driver.stop();
}

#[test]
fn sync_ram_is_write_combined() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4());
    let mut proc = kernel.spawn();
    let ram = 0x4000_0000;

    let sync = proc
        .open("/dev/RPI_GPIO_0", OpenFlags::RDWR | OpenFlags::SYNC)
        .unwrap();
    let va = proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, sync, ram).unwrap();
    assert_eq!(
        proc.vma_at(va).unwrap().page_prot.attr_index(),
        MemoryType::NormalNonCacheable
    );

    let plain = proc.open("/dev/RPI_GPIO_0", OpenFlags::RDWR).unwrap();
    let va = proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, plain, ram).unwrap();
    assert_eq!(proc.vma_at(va).unwrap().page_prot.attr_index(), MemoryType::Normal);

    drop(proc);
    driver.stop();
}

#[test]
fn pass_through_platform_keeps_the_requested_protection() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4().with_arch(HostArch::Generic));
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_2", OpenFlags::RDWR).unwrap();
    let va = proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET).unwrap();
    let prot = proc.vma_at(va).unwrap().page_prot;
    assert_eq!(prot.attr_index(), MemoryType::Normal);
    assert!(prot.is_writable());

    drop(proc);
    driver.stop();
}

#[test]
fn remote_access_depends_on_the_platform_capability() {
    let (kernel, driver) = running(HostConfig::raspberry_pi4());
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_3", OpenFlags::RDWR).unwrap();
    let va = proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET).unwrap();
    proc.store_u32(va + 0x1C, 0x0020_0000).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(proc.access_remote(va + 0x1C, AccessOp::Read(&mut buf)), Ok(4));
    assert_eq!(u32::from_le_bytes(buf), 0x0020_0000);
    drop(proc);
    driver.stop();

    let (kernel, driver) = running(
        HostConfig::raspberry_pi4().with_capabilities(VmCapabilities {
            ioremap_prot: false,
        }),
    );
    assert!(driver.file_operations().vm_ops().access.is_none());
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_3", OpenFlags::RDWR).unwrap();
    let va = proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET).unwrap();
    assert!(std::ptr::eq(proc.vma_at(va).unwrap().ops.unwrap(), &GPIO_VM_OPS_NO_ACCESS));
    assert_eq!(
        proc.access_remote(va, AccessOp::Read(&mut buf)),
        Err(Errno::Io)
    );
    drop(proc);
    driver.stop();
}

#[test]
fn allow_list_confines_mappings() {
    let kernel = HostKernel::new(HostConfig::raspberry_pi4());
    let config = DriverConfig::default().with_allow_list(vec![PhysicalRange::new(
        PhysicalAddress::new(GPIO_OFFSET),
        PAGE_SIZE,
    )]);
    let driver = GpioDriver::start(kernel.clone(), config).unwrap();
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_0", OpenFlags::RDWR).unwrap();

    assert!(proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET).is_ok());
    assert_eq!(
        proc.mmap(2 * PAGE_SIZE, RW, MmapFlags::SHARED, fd, GPIO_OFFSET),
        Err(Errno::NotPermitted)
    );
    assert_eq!(
        proc.mmap(PAGE_SIZE, RW, MmapFlags::SHARED, fd, 0x4000_0000),
        Err(Errno::NotPermitted)
    );
    assert_eq!(proc.vmas().len(), 1);

    drop(proc);
    driver.stop();
    assert!(kernel.is_clean());
}
