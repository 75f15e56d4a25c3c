//! Shared test utilities for ove-builder tests.
//!
//! `TestEnv` owns a temporary working space plus a `bin/` directory of fake
//! collaborators. Each fake is a small `sh` script that appends its argv to
//! `calls.log` and produces the files the real tool would.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use ove_builder::download::ImageSource;
use ove_builder::extract::{DirectExtract, LoopMount};
use ove_builder::inject::ArtifactRef;
use ove_builder::privilege::{Direct, Sudo};
use ove_builder::tools::Tools;
use ove_builder::workspace::WorkingSpace;
use ove_builder::BuildContext;

pub const VOLUME_LABEL: &str = "rhcos-418.94.test";
pub const EFI_IMAGE_SIZE: u64 = 5000;
pub const ARTIFACT: &str = "quay.io/example/agent-ui:v1";

/// Test environment with a temporary working space and fake tools.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Working space root
    pub dir: PathBuf,
    /// Fake collaborator scripts
    pub bin: PathBuf,
    /// Every fake invocation, one line each
    pub log: PathBuf,
    pub tools: Tools,
}

impl TestEnv {
    /// Create a new test environment with working fakes for every tool.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("build");
        let bin = temp_dir.path().join("bin");
        let log = temp_dir.path().join("calls.log");
        fs::create_dir_all(&dir).expect("Failed to create build dir");
        fs::create_dir_all(&bin).expect("Failed to create bin dir");

        let mut env = Self {
            _temp_dir: temp_dir,
            dir,
            bin,
            log,
            tools: Tools::default(),
        };

        env.tools.osirrox = env.fake("osirrox", &format!("out=\"$5\"\n{}", iso_contents()));
        env.tools.xorriso = env.fake(
            "xorriso",
            &format!(
                r#"case " $* " in
  *" -toc "*)
    echo "Drive current: -indev '$2'"
    echo "Volume id    : '{label}'"
    ;;
  *" mkisofs "*)
    printf 'ISO' > "$4"
    ;;
esac
"#,
                label = VOLUME_LABEL
            ),
        );
        env.tools.skopeo = env.fake(
            "skopeo",
            r#"dest="${3#oci-archive:}"
printf 'oci-archive' > "$dest"
"#,
        );
        env.tools.isohybrid = env.fake("isohybrid", r#"printf 'MBR' >> "$2""#);
        env
    }

    /// Write an executable fake named `name` and return its path.
    ///
    /// The script logs `name args...` before running `body`.
    pub fn fake(&self, name: &str, body: &str) -> String {
        let path = self.bin.join(name);
        let script = format!(
            "#!/bin/sh\necho \"{name} $*\" >> '{log}'\n{body}\n",
            name = name,
            log = self.log.display(),
            body = body
        );
        fs::write(&path, script).expect("Failed to write fake tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod fake tool");
        path.to_string_lossy().into_owned()
    }

    /// A fake that logs, prints to stderr and exits 1.
    pub fn failing(&self, name: &str) -> String {
        self.fake(name, &format!("echo '{} exploded' >&2\nexit 1", name))
    }

    /// Install fake `mount`/`mountpoint`/`umount` and a `sudo` that logs
    /// and then runs its arguments.
    ///
    /// The fake mount fills the mount point and records the mount in a
    /// state file; the fake umount empties the mount point again.
    pub fn install_loop_mount(&mut self) {
        let state = self.bin.join("mounted.state");
        let state = state.display();
        self.tools.mount = self.fake(
            "mount",
            &format!(
                "out=\"$4\"\n{}touch '{}'",
                iso_contents(),
                state
            ),
        );
        self.tools.mountpoint = self.fake("mountpoint", &format!("test -e '{}'", state));
        self.tools.umount = self.fake(
            "umount",
            &format!("find \"$1\" -mindepth 1 -delete\nrm -f '{}'", state),
        );
        self.tools.sudo = self.fake("sudo", "exec \"$@\"");
    }

    /// Context with the loop-mount strategy elevated through the fake sudo.
    pub fn loop_mount_context(&self) -> BuildContext {
        BuildContext::new(self.workspace(), self.tools.clone())
            .with_privileged(Box::new(Sudo::new(&self.tools.sudo)))
            .with_strategy(Box::new(LoopMount))
    }

    /// True while the fake loop mount is in place.
    pub fn is_mounted(&self) -> bool {
        self.bin.join("mounted.state").exists()
    }

    pub fn workspace(&self) -> WorkingSpace {
        WorkingSpace::new(&self.dir)
    }

    /// Context with fakes, direct extraction and no privilege elevation.
    pub fn build_context(&self) -> BuildContext {
        BuildContext::new(self.workspace(), self.tools.clone())
            .with_privileged(Box::new(Direct))
            .with_strategy(Box::new(DirectExtract))
    }

    /// Place a base image so acquisition is a no-op.
    pub fn seed_base_image(&self) {
        fs::write(self.workspace().base_image(), b"base iso").expect("Failed to seed base image");
    }

    pub fn artifact(&self) -> ArtifactRef {
        ARTIFACT.parse().expect("valid artifact")
    }

    pub fn offline_source(&self) -> ImageSource {
        ImageSource::default()
    }

    /// Logged invocations, one per line.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Invocations of one tool.
    pub fn calls_to(&self, name: &str) -> Vec<String> {
        let prefix = format!("{} ", name);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        let _ = fs::remove_file(&self.log);
    }
}

/// Shell lines writing a minimal ISO tree into `$out`.
pub fn iso_contents() -> String {
    format!(
        r#"mkdir -p "$out/isolinux" "$out/images" "$out/EFI/BOOT"
printf 'isolinux' > "$out/isolinux/isolinux.bin"
head -c {size} /dev/zero > "$out/images/efiboot.img"
printf 'grub' > "$out/EFI/BOOT/grub.cfg"
chmod a-w "$out/isolinux/isolinux.bin"
"#,
        size = EFI_IMAGE_SIZE
    )
}

/// Assert a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.is_file(), "Expected file to exist: {}", path.display());
}

/// Assert nothing exists at a path.
pub fn assert_absent(path: &Path) {
    assert!(
        fs::symlink_metadata(path).is_err(),
        "Expected nothing at: {}",
        path.display()
    );
}

/// Assert a file contains the given text.
pub fn assert_file_contains(path: &Path, pattern: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert!(
        content.contains(pattern),
        "File {} does not contain '{}'. Content:\n{}",
        path.display(),
        pattern,
        content
    );
}
