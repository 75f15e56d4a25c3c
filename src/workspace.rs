//! Working space layout and stage markers.
//!
//! ```text
//! <dir>/rhcos.iso              base image cache (kept across runs)
//! <dir>/ove/isomnt/            loop mount point or direct-extraction scratch
//! <dir>/ove/work/              writable tree (removed after success)
//! <dir>/ove/output/agent.iso   authored image
//! <dir>/agent.iso              final, relocated image
//! ```
//!
//! Resumability is driven only by the presence of these paths. There is no
//! lock: two invocations against the same directory race on the presence
//! checks and are unsupported.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name of the cached base image.
pub const BASE_IMAGE_NAME: &str = "rhcos.iso";
/// File name of the produced image.
pub const OUTPUT_IMAGE_NAME: &str = "agent.iso";
/// Default working space when none is configured.
pub const DEFAULT_BUILD_DIR: &str = "/tmp/iso_builder";

/// Whether a stage's canonical marker is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Absent,
    Complete,
}

impl StageState {
    /// Complete iff `path` is a regular file.
    pub fn of_file(path: &Path) -> Self {
        if path.is_file() {
            Self::Complete
        } else {
            Self::Absent
        }
    }

    /// Complete iff `path` is a regular file with at least one byte.
    pub fn of_non_empty_file(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Self::Complete,
            _ => Self::Absent,
        }
    }

    /// Complete iff `path` is a directory with at least one entry.
    pub fn of_dir(path: &Path) -> Self {
        let populated = fs::read_dir(path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if populated {
            Self::Complete
        } else {
            Self::Absent
        }
    }

    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Complete => "complete",
        }
    }
}

/// Root directory owning all intermediate and output state of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSpace {
    root: PathBuf,
}

impl WorkingSpace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root (and the `ove/` parent) if absent.
    pub fn create(&self) -> io::Result<()> {
        fs::create_dir_all(self.ove_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cached base image.
    pub fn base_image(&self) -> PathBuf {
        self.root.join(BASE_IMAGE_NAME)
    }

    /// Parent of all derived state.
    pub fn ove_dir(&self) -> PathBuf {
        self.root.join("ove")
    }

    /// Loop mount point or direct-extraction directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.ove_dir().join("isomnt")
    }

    /// Writable copy of the base image tree.
    pub fn tree_dir(&self) -> PathBuf {
        self.ove_dir().join("work")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.ove_dir().join("output")
    }

    /// Image as written by the assembler.
    pub fn output_image(&self) -> PathBuf {
        self.output_dir().join(OUTPUT_IMAGE_NAME)
    }

    /// Image after relocation; its presence means the whole build is done.
    pub fn final_image(&self) -> PathBuf {
        self.root.join(OUTPUT_IMAGE_NAME)
    }

    /// True when this working space is the host filesystem root.
    ///
    /// A builder whose working space is `/` runs inside an isolated
    /// environment where loop devices are unavailable.
    pub fn is_host_root(&self) -> bool {
        let resolved = fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        resolved == Path::new("/")
    }

    /// Marker states for every stage, in pipeline order.
    pub fn status(&self, artifact_archive: &Path) -> Vec<(&'static str, StageState)> {
        vec![
            ("base image", StageState::of_file(&self.base_image())),
            ("scratch", StageState::of_dir(&self.scratch_dir())),
            ("tree", StageState::of_dir(&self.tree_dir())),
            ("artifact", StageState::of_non_empty_file(artifact_archive)),
            ("assembled image", StageState::of_file(&self.output_image())),
            ("final image", StageState::of_file(&self.final_image())),
        ]
    }
}

/// `<path>.part`: where a marker file is written before its atomic rename.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Remove a leftover `.part` file from an interrupted run.
pub fn discard_partial(partial: &Path) -> io::Result<()> {
    match fs::remove_file(partial) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Total size in bytes of regular files under `path` (0 if absent).
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
