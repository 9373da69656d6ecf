use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

/// Number of lines retained.
pub const LOG_BUF_LINES: usize = 256;

struct LogRing {
    lines: VecDeque<String>,
    dropped: u64,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            dropped: 0,
        }
    }

    fn push(&mut self, line: String) {
        if self.lines.len() == LOG_BUF_LINES {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line);
    }
}

static RING: Mutex<LogRing> = Mutex::new(LogRing::new());

pub(crate) fn append(line: String) {
    RING.lock().push(line);
}

/// Snapshot of the buffered lines, oldest first.
#[must_use]
pub fn dmesg() -> Vec<String> {
    RING.lock().lines.iter().cloned().collect()
}

/// Empty the buffer (`dmesg -C`).
pub fn dmesg_clear() {
    let mut ring = RING.lock();
    ring.lines.clear();
    ring.dropped = 0;
}

/// Lines overwritten since the last clear.
#[must_use]
pub fn dropped_lines() -> u64 {
    RING.lock().dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keeps_the_newest_lines() {
        let mut ring = LogRing::new();
        for i in 0..LOG_BUF_LINES + 3 {
            ring.push(alloc::format!("line {i}"));
        }
        assert_eq!(ring.lines.len(), LOG_BUF_LINES);
        assert_eq!(ring.dropped, 3);
        assert_eq!(ring.lines.front().map(String::as_str), Some("line 3"));
    }
}
