//! Static corpora and filesystem helpers used across harnesses.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use rptwatch_core::EventKind;

/// One real-world line per event kind, in pattern table order.
pub const CORPUS_BY_KIND: &[(EventKind, &str)] = &[
    (EventKind::HostStarting, "M: 2024-01-15 10:00:00.123 MMDVMHost-20240101 is starting"),
    (EventKind::HostRunning, "M: 2024-01-15 10:00:00.456 MMDVMHost-20240101 is running"),
    (EventKind::HostExited, "M: 2024-01-15 23:59:59.999 MMDVMHost-20240101 exited on receipt of SIGTERM"),
    (EventKind::DeviceOpening, "M: 2024-01-15 10:00:01.000 Opening the MMDVM"),
    (EventKind::DeviceClosing, "M: 2024-01-15 23:59:59.000 Closing the MMDVM"),
    (
        EventKind::DeviceProtocol,
        "I: 2024-01-15 10:00:02.500 MMDVM protocol version: 1, description: MMDVM_HS_Hat-v1.4.17 20190529 14.7456MHz ADF7021 FW by CA6JAU GitID #cc451c4",
    ),
    (EventKind::DmrNetOpening, "M: 2024-01-15 10:00:03.000 DMR, Opening DMR Network"),
    (EventKind::DmrNetClosing, "M: 2024-01-15 23:59:58.000 DMR, Closing DMR Network"),
    (EventKind::DmrNetSendingAuthorization, "M: 2024-01-15 10:00:03.100 DMR, Sending authorisation"),
    (EventKind::DmrNetSendingConfiguration, "M: 2024-01-15 10:00:03.200 DMR, Sending configuration"),
    (EventKind::DmrNetLoggedIn, "M: 2024-01-15 10:00:03.300 DMR, Logged into the master successfully"),
    (EventKind::DmrIdThreadStarted, "M: 2024-01-15 10:00:01.500 Started the DMR Id lookup reload thread"),
    (EventKind::DmrIdThreadStopped, "M: 2024-01-15 23:59:57.000 Stopped the DMR Id lookup reload thread"),
    (EventKind::DmrRfRxVoiceHeader, "M: 2024-01-15 10:05:00.000 DMR Slot 2, received RF voice header from N0CALL to TG 91"),
    (EventKind::DmrRfRxVoiceFrame, "D: 2024-01-15 10:05:00.360 DMR Slot 2, audio sequence no. 1, errs: 3/141 (2.13%)"),
    (EventKind::DmrRfRxVoiceEnd, "M: 2024-01-15 10:05:03.900 DMR Slot 2, received RF end of voice transmission, 3.9 seconds, BER: 0.4%"),
];

/// Lines the host writes that carry no status.
pub const CORPUS_NOISE: &[&str] = &[
    "I: 2024-01-15 10:00:00.000 This software is for use on amateur radio networks only,",
    "I: 2024-01-15 10:00:00.000 General Parameters",
    "I: 2024-01-15 10:00:00.000     Callsign: N0CALL",
    "M: 2024-01-15 10:05:00.000 DMR Slot 2, RF user N0CALL rejected",
    "not a log line at all",
    "M: 2024-01-15 10:05:00.000 DMR Slot 3, received RF voice header from N0CALL to TG 91",
];

/// A complete session: startup, network login, one transmission on slot 2.
pub const SESSION: &[&str] = &[
    "M: 2024-01-15 10:00:00.123 MMDVMHost-20240101 is starting",
    "M: 2024-01-15 10:00:01.000 Opening the MMDVM",
    "I: 2024-01-15 10:00:02.500 MMDVM protocol version: 1, description: MMDVM_HS_Hat-v1.4.17 GitID #cc451c4",
    "M: 2024-01-15 10:00:03.000 DMR, Opening DMR Network",
    "M: 2024-01-15 10:00:03.100 DMR, Sending authorisation",
    "M: 2024-01-15 10:00:03.200 DMR, Sending configuration",
    "M: 2024-01-15 10:00:03.300 DMR, Logged into the master successfully",
    "M: 2024-01-15 10:00:04.000 Started the DMR Id lookup reload thread",
    "M: 2024-01-15 10:00:04.456 MMDVMHost-20240101 is running",
    "M: 2024-01-15 10:05:00.000 DMR Slot 2, received RF voice header from N0CALL to TG 91",
    "D: 2024-01-15 10:05:00.360 DMR Slot 2, audio sequence no. 1, errs: 3/141 (2.13%)",
    "M: 2024-01-15 10:05:03.900 DMR Slot 2, received RF end of voice transmission, 3.9 seconds, BER: 0.4%",
];

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

/// Write `lines` to `dir/name`, one per line, replacing any existing file.
pub fn write_log(dir: &Path, name: &str, lines: &[impl AsRef<str>]) {
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    std::fs::write(dir.join(name), text).unwrap();
}

/// Append raw text (no newline added) to `dir/name`, creating it if needed.
pub fn append_raw(dir: &Path, name: &str, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Append `lines` to `dir/name`, each newline-terminated.
pub fn append_log(dir: &Path, name: &str, lines: &[impl AsRef<str>]) {
    for line in lines {
        append_raw(dir, name, &format!("{}\n", line.as_ref()));
    }
}

/// Poll `check` until it returns true or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
