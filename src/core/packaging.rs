//! Packaging module directories into deterministic gzip tar archives

use crate::core::service::ServiceError;
use flate2::{Compression, GzBuilder};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Component, Path};
use tracing::debug;
use walkdir::WalkDir;

/// Tool state directories left out when `ArchiveOptions::exclude_tool_dirs` is set
const TOOL_DIRS: &[&str] = &[".git", ".terraform"];

/// Knobs for [`archive_module_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Skip `.git` and `.terraform` directories below the root
    pub exclude_tool_dirs: bool,
}

/// Archive a module directory into an in-memory `.tar.gz` buffer.
///
/// Every regular file is archived under its root-relative path. Headers
/// carry no timestamps or ownership so the same tree always yields the same
/// bytes. Any I/O failure aborts the whole archive.
pub fn archive_module(root: &Path) -> Result<Vec<u8>, ServiceError> {
    archive_module_with(root, ArchiveOptions::default())
}

/// [`archive_module`] with explicit options
pub fn archive_module_with(root: &Path, options: ArchiveOptions) -> Result<Vec<u8>, ServiceError> {
    if !root.is_dir() {
        return Err(ServiceError::DirectoryNotFound(root.to_path_buf()));
    }

    let encoder = GzBuilder::new().write(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(options.exclude_tool_dirs
                && e.depth() > 0
                && e.file_type().is_dir()
                && TOOL_DIRS.iter().any(|d| e.file_name() == *d))
        });

    let mut count = 0usize;
    for entry in walker {
        let entry = entry.map_err(|e| ServiceError::ArchiveIo(e.to_string()))?;

        // Directories, symlinks and special files are not archived
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).map_err(|e| {
            ServiceError::ArchiveIo(format!(
                "{} is outside {}: {}",
                entry.path().display(),
                root.display(),
                e
            ))
        })?;
        let name = entry_name(relative)?;

        let mut content = Vec::new();
        fs::File::open(entry.path())
            .and_then(|mut f| f.read_to_end(&mut content))
            .map_err(|e| io_error(entry.path(), e))?;

        let metadata = entry.metadata().map_err(|e| ServiceError::ArchiveIo(e.to_string()))?;

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(entry_mode(&metadata));
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);

        builder
            .append_data(&mut header, &name, content.as_slice())
            .map_err(|e| io_error(entry.path(), e))?;

        debug!("Archived {} ({} bytes)", name, content.len());
        count += 1;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ServiceError::ArchiveIo(format!("Failed to finalize tar: {}", e)))?;
    let bytes = encoder
        .finish()
        .map_err(|e| ServiceError::ArchiveIo(format!("Failed to finalize gzip: {}", e)))?;

    debug!(
        "Archived {} file(s) from {} into {} bytes",
        count,
        root.display(),
        bytes.len()
    );
    Ok(bytes)
}

/// Build a `/`-separated entry name, refusing anything that could escape the root
fn entry_name(relative: &Path) -> Result<String, ServiceError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    ServiceError::ArchiveIo(format!(
                        "Path is not valid UTF-8: {}",
                        relative.display()
                    ))
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(ServiceError::ArchiveIo(format!(
                    "Refusing to archive path outside the module root: {}",
                    relative.display()
                )))
            }
        }
    }

    if parts.is_empty() {
        return Err(ServiceError::ArchiveIo("Empty archive entry name".to_string()));
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn entry_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn entry_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

fn io_error(path: &Path, err: std::io::Error) -> ServiceError {
    ServiceError::ArchiveIo(format!("{}: {}", path.display(), err))
}

/// SHA256 digest of an archive buffer, lowercase hex
pub fn calculate_checksum(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (name, data)
            })
            .collect()
    }

    fn sample_module() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a")).unwrap();
        fs::write(temp_dir.path().join("a/b.txt"), "nested").unwrap();
        fs::write(temp_dir.path().join("c.txt"), "top").unwrap();
        temp_dir
    }

    #[test]
    fn test_entries_are_root_relative() {
        let module = sample_module();
        let bytes = archive_module(module.path()).unwrap();

        let entries = entries(&bytes);
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a/b.txt", "c.txt"]);
        assert_eq!(entries[0].1, b"nested");
        assert_eq!(entries[1].1, b"top");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let module = sample_module();
        std::os::unix::fs::symlink(module.path().join("c.txt"), module.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(module.path().join("a"), module.path().join("linked-dir"))
            .unwrap();

        let bytes = archive_module(module.path()).unwrap();
        let names: Vec<_> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a/b.txt", "c.txt"]);
    }

    #[test]
    fn test_archive_is_deterministic() {
        let module = sample_module();
        let first = archive_module(module.path()).unwrap();
        let second = archive_module(module.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(calculate_checksum(&first), calculate_checksum(&second));
    }

    fn with_tool_dirs() -> TempDir {
        let module = sample_module();
        fs::create_dir_all(module.path().join(".git/objects")).unwrap();
        fs::write(module.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::create_dir_all(module.path().join(".terraform")).unwrap();
        fs::write(module.path().join(".terraform/environment"), "default").unwrap();
        module
    }

    #[test]
    fn test_tool_dirs_archived_by_default() {
        let module = with_tool_dirs();
        let bytes = archive_module(module.path()).unwrap();
        let names: Vec<_> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![".git/HEAD", ".terraform/environment", "a/b.txt", "c.txt"]
        );
    }

    #[test]
    fn test_tool_dirs_excluded_on_request() {
        let module = with_tool_dirs();
        let options = ArchiveOptions {
            exclude_tool_dirs: true,
        };
        let bytes = archive_module_with(module.path(), options).unwrap();
        let names: Vec<_> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a/b.txt", "c.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_fails_archive() {
        use std::os::unix::fs::PermissionsExt;

        let module = sample_module();
        let locked = module.path().join("locked.tf");
        fs::write(&locked, "secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits
        if fs::File::open(&locked).is_ok() {
            return;
        }

        let result = archive_module(module.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(result, Err(ServiceError::ArchiveIo(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_fails_archive() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let module = sample_module();
        fs::write(module.path().join(OsStr::from_bytes(b"bad\xff.tf")), "x").unwrap();

        let result = archive_module(module.path());
        assert!(matches!(result, Err(ServiceError::ArchiveIo(_))));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = archive_module(&temp_dir.path().join("absent"));
        assert!(matches!(result, Err(ServiceError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_entry_name_rejects_escaping_paths() {
        assert!(entry_name(Path::new("../etc/passwd")).is_err());
        assert!(entry_name(Path::new("/etc/passwd")).is_err());
        assert_eq!(entry_name(Path::new("./a/b.txt")).unwrap(), "a/b.txt");
    }

    #[test]
    fn test_checksum_format() {
        let checksum = calculate_checksum(b"petra");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
