use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Direction marker for outbound bytes
const OUTBOUND: &str = ">>";
/// Direction marker for inbound bytes
const INBOUND: &str = "<<";

/// Thread-safe hex trace of the raw byte stream.
///
/// Each record is one line: `<seconds>.<micros> >> 7E 00 04 ...` for bytes
/// written to the module and `<<` for bytes read from it.
#[derive(Clone)]
pub struct TraceRecorder {
    inner: Arc<Mutex<File>>,
}

impl TraceRecorder {
    /// Open `path` for appending, creating it if needed.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    /// Record bytes written to the module.
    pub fn outbound(&self, bytes: &[u8]) -> io::Result<()> {
        self.record(OUTBOUND, bytes)
    }

    /// Record bytes read from the module.
    pub fn inbound(&self, bytes: &[u8]) -> io::Result<()> {
        self.record(INBOUND, bytes)
    }

    fn record(&self, marker: &str, bytes: &[u8]) -> io::Result<()> {
        let (secs, micros) = timestamp(SystemTime::now());
        let mut line = format!("{secs}.{micros:06} {marker}");
        for byte in bytes {
            line.push_str(&format!(" {byte:02X}"));
        }
        line.push('\n');

        let mut file = self.inner.lock();
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

impl std::fmt::Debug for TraceRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceRecorder").finish_non_exhaustive()
    }
}

fn timestamp(time: SystemTime) -> (u64, u32) {
    let duration = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    (duration.as_secs(), duration.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_both_directions() {
        let path = std::env::temp_dir().join(format!("xbee-trace-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let recorder = TraceRecorder::create(&path).unwrap();
        recorder.outbound(&[0x7E, 0x00, 0x04]).unwrap();
        recorder.inbound(&[0x8A, 0x02]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(">> 7E 00 04"));
        assert!(lines[1].ends_with("<< 8A 02"));
        let _ = std::fs::remove_file(&path);
    }
}
