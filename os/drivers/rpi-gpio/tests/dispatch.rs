use kernel_chrdev::OpenFlags;
use kernel_host::{HostConfig, HostKernel};
use kernel_printk::{PrintkLogger, dmesg};
use log::LevelFilter;
use rpi_gpio::{DriverConfig, GpioDriver};
use std::sync::Arc;

fn running() -> (Arc<HostKernel>, GpioDriver<HostKernel>) {
    running_as(DriverConfig::default())
}

fn running_as(config: DriverConfig) -> (Arc<HostKernel>, GpioDriver<HostKernel>) {
    // first test in wins; the rest share its logger
    let _ = PrintkLogger::new(LevelFilter::Info).init();
    let kernel = HostKernel::new(HostConfig::raspberry_pi4());
    let driver = GpioDriver::start(kernel.clone(), config).unwrap();
    (kernel, driver)
}

/// `dmesg` is shared by every test in this binary; only lines under
/// `family` belong to the caller.
fn logged(family: &str, suffix: &str) -> bool {
    let tail = format!("{family}: {suffix}");
    dmesg().iter().any(|l| l.ends_with(&tail))
}

#[test]
fn open_and_close_are_audited() {
    let family = "AUDIT_GPIO";
    let (kernel, driver) = running_as(DriverConfig {
        name: family,
        ..DriverConfig::default()
    });
    let mut proc = kernel.spawn();

    let fd = proc.open("/dev/AUDIT_GPIO_2", OpenFlags::RDWR).unwrap();
    assert!(
        dmesg()
            .iter()
            .any(|l| l.starts_with("[INFO]") && l.ends_with("AUDIT_GPIO: Device open (511:2)"))
    );
    assert!(!logged(family, "Device open (511:1)"));
    proc.close(fd).unwrap();
    assert!(logged(family, "Device close (511:2)"));

    drop(proc);
    driver.stop();
    assert!(logged(family, "Device exit successful"));
}

#[test]
fn every_minor_opens_unprivileged() {
    let (kernel, driver) = running();
    let mut proc = kernel.spawn();
    for minor in 0..4 {
        let path = format!("/dev/RPI_GPIO_{minor}");
        let fd = proc.open(&path, OpenFlags::RDWR).unwrap();
        proc.close(fd).unwrap();
    }
    assert!(proc.open("/dev/RPI_GPIO_4", OpenFlags::RDWR).is_err());
    drop(proc);
    driver.stop();
}

#[test]
fn write_consumes_everything() {
    let (kernel, driver) = running();
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_0", OpenFlags::WRONLY).unwrap();

    assert_eq!(proc.write(fd, b"abc"), Ok(3));
    assert_eq!(proc.write(fd, &[0xFF; 4096]), Ok(4096));
    assert_eq!(proc.write(fd, &[]), Ok(0));

    drop(proc);
    driver.stop();
}

#[test]
fn read_returns_end_of_file() {
    let (kernel, driver) = running();
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_1", OpenFlags::RDONLY).unwrap();

    let mut buf = [0x5A_u8; 16];
    assert_eq!(proc.read(fd, &mut buf), Ok(0));
    assert_eq!(buf, [0x5A; 16]);

    drop(proc);
    driver.stop();
}

#[test]
fn ioctl_accepts_any_command() {
    let (kernel, driver) = running();
    let mut proc = kernel.spawn();
    let fd = proc.open("/dev/RPI_GPIO_3", OpenFlags::RDWR).unwrap();

    for (cmd, arg) in [(0, 0), (0x4004_6601, 0xDEAD_BEEF), (u32::MAX, u64::MAX)] {
        assert_eq!(proc.ioctl(fd, cmd, arg), Ok(0));
    }

    drop(proc);
    driver.stop();
}
