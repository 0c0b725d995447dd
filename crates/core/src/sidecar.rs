//! Per-file sidecar directories holding probe caches and derived assets.

use std::path::{Path, PathBuf};

/// Name of the hidden namespace directory created next to source files.
pub const SIDECAR_NAMESPACE: &str = ".mediashelf";

/// Suffix of files that are still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Maps source files to their sidecar directories.
#[derive(Debug, Clone)]
pub struct SidecarLayout {
    library_root: PathBuf,
    previews_dir: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

impl SidecarLayout {
    pub fn new(
        library_root: impl Into<PathBuf>,
        previews_dir: Option<PathBuf>,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            library_root: library_root.into(),
            previews_dir,
            scratch_dir,
        }
    }

    /// Sidecar directory of the file at `abs_path`.
    ///
    /// Without a previews directory this is `<parent>/.mediashelf/<escaped name>`;
    /// with one, the library's relative layout is mirrored under it.
    pub fn sidecar_dir(&self, abs_path: &Path) -> PathBuf {
        let parent = abs_path.parent().unwrap_or(Path::new(""));
        let name = abs_path
            .file_name()
            .map(|n| escape_name(&n.to_string_lossy()))
            .unwrap_or_else(|| "_".to_string());

        match self.previews_dir {
            Some(ref previews) => {
                let mut dir = previews.clone();
                if let Ok(rel) = parent.strip_prefix(&self.library_root) {
                    for component in rel.components() {
                        dir.push(escape_name(&component.as_os_str().to_string_lossy()));
                    }
                }
                dir.join(name)
            }
            None => parent.join(SIDECAR_NAMESPACE).join(name),
        }
    }

    /// Directory for intermediate files of the asset that will land at `final_path`.
    ///
    /// Inside a sidecar it is a partial of the final name, so an interrupted
    /// generation's leftovers are swept like any other partial.
    pub fn scratch_dir(&self, final_path: &Path) -> PathBuf {
        match self.scratch_dir {
            Some(ref scratch) => {
                let tag = final_path
                    .parent()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                scratch.join(format!("{}-{}", tag, uuid::Uuid::new_v4().simple()))
            }
            None => partial_path(final_path),
        }
    }

    /// The configured shared scratch directory, if any.
    pub fn shared_scratch(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }
}

/// Escapes a file name into a sidecar directory name.
///
/// Every byte outside `[a-z0-9._-]` is percent-encoded, uppercase letters
/// included, so two names that differ only in case never collide on a
/// case-insensitive filesystem.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    // "." and ".." are not usable as directory names
    if out.chars().all(|c| c == '.') {
        out = out.replace('.', "%2E");
    }
    out
}

/// Temporary path next to `final_path`, never mistaken for a finished file.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(
        ".{}.{}{}",
        name,
        uuid::Uuid::new_v4().simple(),
        PARTIAL_SUFFIX
    ))
}

/// Whether `file_name` belongs to an unfinished write of `final_name`.
///
/// Files named after a partial, such as a concat list, count as well.
pub fn is_partial_of(file_name: &str, final_name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(&format!(".{}.", final_name)) else {
        return false;
    };
    rest.ends_with(PARTIAL_SUFFIX) || rest.contains(&format!("{}.", PARTIAL_SUFFIX))
}
