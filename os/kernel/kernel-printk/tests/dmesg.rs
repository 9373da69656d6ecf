use kernel_printk::{PrintkLogger, dmesg};
use log::{LevelFilter, debug, info, trace, warn};
use std::sync::atomic::{AtomicUsize, Ordering};

static ECHOED: AtomicUsize = AtomicUsize::new(0);

fn count_echo(line: &str) {
    assert!(line.starts_with('['));
    ECHOED.fetch_add(1, Ordering::SeqCst);
}

// One test per binary: the logger is process global.
#[test]
fn records_land_in_the_ring_and_on_the_console() {
    PrintkLogger::new(LevelFilter::Debug)
        .with_console(count_echo)
        .init()
        .unwrap();
    assert!(PrintkLogger::new(LevelFilter::Trace).init().is_err());

    info!(target: "rpi_gpio", "Device open");
    warn!(target: "rpi_gpio", "rolling back {} instances", 2);
    debug!("state change");
    trace!("filtered out");

    let lines = dmesg();
    assert!(lines.contains(&"[INFO] rpi_gpio: Device open".to_string()));
    assert!(lines.contains(&"[WARN] rpi_gpio: rolling back 2 instances".to_string()));
    assert!(lines.contains(&"[DEBUG] dmesg: state change".to_string()));
    assert!(!lines.iter().any(|l| l.contains("filtered out")));
    assert_eq!(ECHOED.load(Ordering::SeqCst), 3);

    kernel_printk::dmesg_clear();
    assert!(dmesg().is_empty());
}
