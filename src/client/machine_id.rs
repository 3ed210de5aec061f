//! Stable machine identity for license binding.
//!
//! The server binds each license to a single machine id, so the id must be
//! stable across restarts and reinstalls of the application. We take a
//! per-OS raw identifier and hash it, so the raw value never leaves the
//! machine:
//!
//!   machine_id = hex(SHA256(raw_os_identifier))

use sha2::{Digest, Sha256};

/// Returns the machine id to send with activation and validation requests.
///
/// The result is a 64-character lowercase hex string, stable for the
/// lifetime of the OS installation.
pub fn get_machine_id() -> String {
    let raw = raw_machine_id();
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(target_os = "linux")]
fn raw_machine_id() -> String {
    // systemd machine id, with the dbus location as a fallback
    std::fs::read_to_string("/etc/machine-id")
        .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| hostname_fallback())
}

#[cfg(target_os = "macos")]
fn raw_machine_id() -> String {
    use std::process::Command;

    let output = Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output();

    if let Ok(out) = output {
        let text = String::from_utf8_lossy(&out.stdout);
        for line in text.lines() {
            if line.contains("IOPlatformUUID") {
                if let Some(uuid) = line.split('"').nth(3) {
                    return uuid.to_string();
                }
            }
        }
    }

    hostname_fallback()
}

#[cfg(target_os = "windows")]
fn raw_machine_id() -> String {
    use std::process::Command;

    let output = Command::new("reg")
        .args([
            "query",
            r"HKLM\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
        ])
        .output();

    if let Ok(out) = output {
        let text = String::from_utf8_lossy(&out.stdout);
        if let Some(guid) = text.split_whitespace().last() {
            if !guid.is_empty() {
                return guid.to_string();
            }
        }
    }

    hostname_fallback()
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn raw_machine_id() -> String {
    hostname_fallback()
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}
