//! Host environment detection
//!
//! `SystemProfile::detect()` gathers an immutable snapshot of the host:
//! OS family, architecture, memory, CPU count, package managers, tool
//! availability, encoding capability and filesystem permissions. Every
//! sub-probe catches its own errors and substitutes a conservative
//! default, so detection never fails and never aborts a session.
//!
//! The profile is computed once per process and never persisted across
//! runs; the environment may have changed in between.

use std::collections::BTreeMap;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exec::{self, PROBE_TIMEOUT};

/// Default memory assumption when every probe fails, in gigabytes
const DEFAULT_MEMORY_GB: u64 = 8;

/// Endpoints used for the best-effort offline-install warning
pub const REACHABILITY_ENDPOINTS: &[&str] = &[
    "github.com:443",
    "registry.npmjs.org:443",
    "hub.docker.com:443",
];

/// Tools whose availability downstream stages care about
const PROBED_TOOLS: &[&str] = &["docker", "git", "node"];

/// Operating system family of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
    Macos,
    Unknown,
}

impl OsFamily {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::Macos,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }
}

/// Package managers Noxup knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManager {
    Winget,
    Choco,
    Scoop,
    AptGet,
    Apt,
    Yum,
    Dnf,
    Pacman,
    Zypper,
    Brew,
    Port,
    Snap,
    Pip,
    Conda,
}

impl PackageManager {
    /// The binary probed on PATH for this manager
    pub fn command(self) -> &'static str {
        match self {
            Self::Winget => "winget",
            Self::Choco => "choco",
            Self::Scoop => "scoop",
            Self::AptGet => "apt-get",
            Self::Apt => "apt",
            Self::Yum => "yum",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Brew => "brew",
            Self::Port => "port",
            Self::Snap => "snap",
            Self::Pip => "pip",
            Self::Conda => "conda",
        }
    }

    /// Managers native to an OS family, in preference order
    pub fn native_for(os: OsFamily) -> &'static [PackageManager] {
        match os {
            OsFamily::Windows => &[Self::Winget, Self::Choco, Self::Scoop],
            OsFamily::Linux => &[
                Self::AptGet,
                Self::Apt,
                Self::Yum,
                Self::Dnf,
                Self::Pacman,
                Self::Zypper,
            ],
            OsFamily::Macos => &[Self::Brew, Self::Port],
            OsFamily::Unknown => &[],
        }
    }

    /// Cross-platform managers tried after the native ones
    pub fn universal() -> &'static [PackageManager] {
        &[Self::Snap, Self::Pip, Self::Conda]
    }
}

/// Text-encoding capability of the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSupport {
    /// A multi-script sample survives a write/read round-trip on disk
    pub utf8_roundtrip: bool,
    /// The console locale advertises UTF-8
    pub console_utf8: bool,
}

/// Filesystem and privilege capability of the current user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionFlags {
    pub current_dir_write: bool,
    pub home_dir_write: bool,
    pub elevated: bool,
}

/// Immutable snapshot of host capabilities, created once per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemProfile {
    pub os: OsFamily,
    pub arch: String,
    pub memory_gb: u64,
    pub cpu_cores: usize,
    pub package_managers: Vec<PackageManager>,
    pub tools: BTreeMap<String, bool>,
    pub encoding: EncodingSupport,
    pub permissions: PermissionFlags,
}

impl SystemProfile {
    /// Detect the executing host. Never fails; each sub-probe degrades
    /// to a conservative default on error.
    pub fn detect() -> Self {
        let os = OsFamily::current();

        let profile = Self {
            os,
            arch: std::env::consts::ARCH.to_string(),
            memory_gb: detect_memory_gb(os),
            cpu_cores: num_cpus::get().max(1),
            package_managers: detect_package_managers(os),
            tools: probe_tools(),
            encoding: probe_encoding(),
            permissions: probe_permissions(os),
        };

        debug!(
            os = profile.os.as_str(),
            memory_gb = profile.memory_gb,
            cpu_cores = profile.cpu_cores,
            managers = profile.package_managers.len(),
            "system profile detected"
        );

        profile
    }

    pub fn tool_available(&self, name: &str) -> bool {
        self.tools.get(name).copied().unwrap_or(false)
    }
}

/// Memory detection fallback chain: sysinfo, then an OS-specific
/// command, then a fixed default.
fn detect_memory_gb(os: OsFamily) -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let bytes = sys.total_memory();
    if bytes > 0 {
        return (bytes / (1024 * 1024 * 1024)).max(1);
    }

    if let Some(gb) = detect_memory_via_command(os) {
        return gb.max(1);
    }

    DEFAULT_MEMORY_GB
}

fn detect_memory_via_command(os: OsFamily) -> Option<u64> {
    match os {
        OsFamily::Windows => {
            let out = exec::run_command(
                "wmic",
                &["computersystem", "get", "TotalPhysicalMemory"],
                PROBE_TIMEOUT,
            );
            if !out.succeeded() {
                return None;
            }
            out.stdout
                .lines()
                .filter_map(|l| l.trim().parse::<u64>().ok())
                .next()
                .map(|b| b / (1024 * 1024 * 1024))
        }
        OsFamily::Linux => {
            let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
            meminfo
                .lines()
                .find(|l| l.starts_with("MemTotal"))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb / (1024 * 1024))
        }
        OsFamily::Macos => {
            let out = exec::run_command("sysctl", &["-n", "hw.memsize"], PROBE_TIMEOUT);
            if !out.succeeded() {
                return None;
            }
            out.stdout
                .trim()
                .parse::<u64>()
                .ok()
                .map(|b| b / (1024 * 1024 * 1024))
        }
        OsFamily::Unknown => None,
    }
}

/// Ordered package-manager detection: native managers first, then the
/// universal fallbacks. Order here drives installation preference.
fn detect_package_managers(os: OsFamily) -> Vec<PackageManager> {
    PackageManager::native_for(os)
        .iter()
        .chain(PackageManager::universal())
        .copied()
        .filter(|pm| exec::which(pm.command()).is_some())
        .collect()
}

fn probe_tools() -> BTreeMap<String, bool> {
    PROBED_TOOLS
        .iter()
        .map(|tool| (tool.to_string(), tool_available(tool)))
        .collect()
}

/// A tool counts as available when its version command runs, falling
/// back to a plain PATH lookup when the version probe misbehaves.
fn tool_available(tool: &str) -> bool {
    let out = exec::run_command(tool, &["--version"], PROBE_TIMEOUT);
    if out.succeeded() {
        return true;
    }
    exec::which(tool).is_some()
}

fn probe_encoding() -> EncodingSupport {
    EncodingSupport {
        utf8_roundtrip: utf8_file_roundtrip(),
        console_utf8: console_locale_is_utf8(),
    }
}

/// Write a multi-script sample to a scoped temp file and read it back.
fn utf8_file_roundtrip() -> bool {
    let sample = "NoxSuite check: ASCII, ümlaut, 测试, тест";
    let attempt = || -> std::io::Result<bool> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = tempfile::tempfile()?;
        file.write_all(sample.as_bytes())?;
        file.seek(SeekFrom::Start(0))?;
        let mut back = String::new();
        file.read_to_string(&mut back)?;
        Ok(back == sample)
    };
    attempt().unwrap_or(false)
}

fn console_locale_is_utf8() -> bool {
    for var in ["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value.to_uppercase().contains("UTF-8")
                    || value.to_uppercase().contains("UTF8");
            }
        }
    }
    false
}

/// Real write-then-delete probes. Scoped temp files guarantee no
/// residue on any exit path, including panics inside the probe.
fn probe_permissions(os: OsFamily) -> PermissionFlags {
    let current_dir_write = std::env::current_dir()
        .map(|d| dir_writable(&d))
        .unwrap_or(false);
    let home_dir_write = dirs::home_dir().map(|d| dir_writable(&d)).unwrap_or(false);

    PermissionFlags {
        current_dir_write,
        home_dir_write,
        elevated: check_elevated(os),
    }
}

pub(crate) fn dir_writable(dir: &Path) -> bool {
    let attempt = || -> std::io::Result<()> {
        let mut probe = tempfile::Builder::new()
            .prefix(".noxup-probe-")
            .tempfile_in(dir)?;
        probe.write_all(b"probe")?;
        Ok(())
    };
    attempt().is_ok()
}

fn check_elevated(os: OsFamily) -> bool {
    let outcome = match os {
        OsFamily::Windows => exec::run_command("net", &["session"], PROBE_TIMEOUT),
        _ => {
            let out = exec::run_command("id", &["-u"], PROBE_TIMEOUT);
            return out.succeeded() && out.stdout.trim() == "0";
        }
    };
    outcome.succeeded()
}

/// Best-effort reachability check against a fixed endpoint set.
///
/// Used only to warn about offline installs; failures are never fatal
/// and never abort anything.
pub fn check_reachability(timeout: Duration) -> Vec<(String, bool)> {
    REACHABILITY_ENDPOINTS
        .iter()
        .map(|endpoint| (endpoint.to_string(), endpoint_reachable(endpoint, timeout)))
        .collect()
}

fn endpoint_reachable(endpoint: &str, timeout: Duration) -> bool {
    let addrs = match endpoint.to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(_) => return false,
    };
    for addr in addrs {
        if TcpStream::connect_timeout(&addr, timeout).is_ok() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_populates_every_field() {
        let profile = SystemProfile::detect();
        assert!(profile.memory_gb >= 1);
        assert!(profile.cpu_cores >= 1);
        assert!(!profile.arch.is_empty());
        // Tool map always carries the probed set, available or not
        for tool in PROBED_TOOLS {
            assert!(profile.tools.contains_key(*tool));
        }
    }

    #[test]
    fn test_detect_leaves_no_probe_residue() {
        let before: Vec<_> = leftover_probe_files();
        let _ = SystemProfile::detect();
        let after: Vec<_> = leftover_probe_files();
        assert_eq!(before, after);
    }

    fn leftover_probe_files() -> Vec<String> {
        let mut found = Vec::new();
        if let Ok(dir) = std::env::current_dir() {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if name.starts_with(".noxup-probe-") {
                        found.push(name);
                    }
                }
            }
        }
        found.sort();
        found
    }

    #[test]
    fn test_os_family_is_known_on_supported_hosts() {
        let os = OsFamily::current();
        if cfg!(target_os = "linux") {
            assert_eq!(os, OsFamily::Linux);
        }
        assert!(!os.as_str().is_empty());
    }

    #[test]
    fn test_native_managers_ordered_before_universal() {
        let managers = detect_package_managers(OsFamily::current());
        let natives = PackageManager::native_for(OsFamily::current());
        let first_universal = managers
            .iter()
            .position(|m| PackageManager::universal().contains(m));
        let last_native = managers.iter().rposition(|m| natives.contains(m));
        if let (Some(u), Some(n)) = (first_universal, last_native) {
            assert!(n < u, "native managers must precede universal fallbacks");
        }
    }

    #[test]
    fn test_utf8_roundtrip_on_tmpfs() {
        assert!(utf8_file_roundtrip());
    }

    #[test]
    fn test_dir_writable_on_temp_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(dir_writable(temp.path()));
    }

    #[test]
    fn test_unreachable_endpoint_is_false() {
        assert!(!endpoint_reachable(
            "nonexistent.invalid:443",
            Duration::from_millis(200)
        ));
    }

    #[test]
    fn test_profile_serializes() {
        let profile = SystemProfile::detect();
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"os\""));
        assert!(json.contains("\"memory_gb\""));
    }
}
