//! Local host name discovery for metric paths.

use std::process::Command;

use crate::error::HostnameError;

/// Ask the system for its fully-qualified name via `hostname -f`.
pub fn fqdn() -> Result<String, HostnameError> {
    let output = Command::new("hostname").arg("-f").output()?;
    if !output.status.success() {
        return Err(HostnameError::Status(output.status));
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if name.is_empty() {
        return Err(HostnameError::Empty);
    }
    Ok(name)
}

/// Kernel host name, used when the FQDN is unavailable.
fn short_hostname() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Pick the host name for metric paths: the configured override, else the
/// FQDN, else the short host name, else `localhost`.
pub fn resolve(configured: Option<&str>) -> String {
    if let Some(name) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match fqdn() {
        Ok(name) => name,
        Err(e) => {
            log::warn!("Cannot get system's FQDN hostname: {}", e);
            short_hostname().unwrap_or_else(|| "localhost".to_string())
        }
    }
}
