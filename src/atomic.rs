//! Atomic, platform-aware file writing
//!
//! All generated artifacts go through `write_atomic`: content is
//! written to a sibling temp file and renamed into place, so a reader
//! can never observe a partially written artifact. On any error the
//! temp file is removed and the previous artifact, if one existed, is
//! left untouched.

use std::io::Write;
use std::path::Path;

use crate::error::{NoxupError, Result};
use crate::probe::OsFamily;

/// UTF-8 byte-order mark, prepended to structured files on Windows
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Newline and BOM policy for a generated text file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPolicy {
    pub crlf: bool,
    pub bom: bool,
}

impl TextPolicy {
    /// Policy for structured files (JSON/YAML/env): BOM + CRLF on
    /// Windows, plain LF elsewhere.
    pub fn structured(os: OsFamily) -> Self {
        Self {
            crlf: os.is_windows(),
            bom: os.is_windows(),
        }
    }

    /// Policy for scripts: batch files want CRLF, POSIX shells want
    /// LF and must never see a BOM.
    pub fn script(os: OsFamily) -> Self {
        Self {
            crlf: os.is_windows(),
            bom: false,
        }
    }

    /// Plain LF, no BOM, regardless of platform
    pub fn plain() -> Self {
        Self {
            crlf: false,
            bom: false,
        }
    }

    fn apply(self, content: &str) -> Vec<u8> {
        let normalized = content.replace("\r\n", "\n");
        let text = if self.crlf {
            normalized.replace('\n', "\r\n")
        } else {
            normalized
        };
        let mut bytes = Vec::with_capacity(text.len() + UTF8_BOM.len());
        if self.bom {
            bytes.extend_from_slice(UTF8_BOM);
        }
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }
}

/// Write `content` to `path` atomically under the given text policy.
pub fn write_atomic(path: &Path, content: &str, policy: TextPolicy) -> Result<()> {
    write_atomic_bytes(path, &policy.apply(content))
}

/// Write raw bytes to `path` via a same-directory temp file + rename.
pub fn write_atomic_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| NoxupError::FileWriteFailed {
        path: parent.display().to_string(),
        reason: e.to_string(),
    })?;

    // NamedTempFile removes itself on drop, so every early return below
    // leaves no temp residue behind.
    let mut tmp = tempfile::Builder::new()
        .prefix(".noxup-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| NoxupError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|e| NoxupError::FileWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    tmp.persist(path).map_err(|e| NoxupError::FileWriteFailed {
        path: path.display().to_string(),
        reason: e.error.to_string(),
    })?;

    Ok(())
}

/// Strip a leading UTF-8 BOM, tolerated when reading structured files
/// written on Windows.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Mark a generated script executable. No-op on non-unix targets where
/// execute permission is not a file attribute.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| NoxupError::FileWriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Whether a path currently carries an execute bit (always true where
/// the attribute does not exist).
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("config/app.json");

        write_atomic(&target, "{\"ok\": true}\n", TextPolicy::plain()).unwrap();

        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "{\"ok\": true}\n"
        );
    }

    #[test]
    fn test_write_atomic_replaces_existing_content() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("app.json");

        write_atomic(&target, "first", TextPolicy::plain()).unwrap();
        write_atomic(&target, "second", TextPolicy::plain()).unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
    }

    #[test]
    fn test_failed_write_preserves_previous_content() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("app.json");
        write_atomic(&target, "previous", TextPolicy::plain()).unwrap();

        // Writing under a path whose parent is a regular file must fail
        // without touching the original artifact.
        let bogus = target.join("child.json");
        let result = write_atomic(&bogus, "garbage", TextPolicy::plain());
        assert!(result.is_err());

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "previous");
    }

    #[test]
    fn test_no_temp_residue_after_writes() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("app.json");
        write_atomic(&target, "content", TextPolicy::plain()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_windows_policy_applies_crlf_and_bom() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("app.json");

        write_atomic(
            &target,
            "line one\nline two\n",
            TextPolicy::structured(OsFamily::Windows),
        )
        .unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(&bytes[..3], UTF8_BOM);
        assert!(
            String::from_utf8_lossy(&bytes).contains("line one\r\nline two\r\n")
        );
    }

    #[test]
    fn test_posix_script_policy_is_lf_without_bom() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("start.sh");

        write_atomic(
            &target,
            "#!/bin/bash\necho hi\n",
            TextPolicy::script(OsFamily::Linux),
        )
        .unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert_ne!(&bytes[..3], UTF8_BOM);
        assert!(!String::from_utf8_lossy(&bytes).contains('\r'));
    }

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}{}"), "{}");
        assert_eq!(strip_bom("{}"), "{}");
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable_sets_bits() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("run.sh");
        write_atomic(&script, "#!/bin/sh\n", TextPolicy::plain()).unwrap();

        assert!(!is_executable(&script));
        make_executable(&script).unwrap();
        assert!(is_executable(&script));
    }
}
