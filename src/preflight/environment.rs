//! Build environment checks (working space, privileges, loop devices).

use std::fs;
use std::path::Path;

use crate::context::BuildContext;
use crate::workspace::{StageState, WorkingSpace};

use super::types::CheckResult;

/// Check the working space and the capabilities the chosen strategy needs.
pub fn check_build_environment(ctx: &BuildContext, loop_mount: bool) -> Vec<CheckResult> {
    let mut results = vec![check_writable(&ctx.workspace)];

    if loop_mount {
        if Path::new("/dev/loop-control").exists() {
            results.push(CheckResult::pass("loop devices"));
        } else {
            results.push(CheckResult::fail(
                "loop devices",
                "/dev/loop-control missing - load the 'loop' module or build with BUILD_DIR=/",
            ));
        }
    }

    if ctx.invoker.is_root() {
        results.push(CheckResult::pass_with("privileges", "running as root"));
    } else {
        results.push(CheckResult::warn(
            "privileges",
            "not root - mount, chown and skopeo will run through sudo and may prompt",
        ));
    }

    let base = ctx.workspace.base_image();
    if StageState::of_file(&base).is_complete() {
        results.push(CheckResult::pass_with("base image", &base.display().to_string()));
    } else {
        results.push(CheckResult::warn(
            "base image",
            "not cached yet - BASE_ISO_URL (or --iso-url) must be set",
        ));
    }

    results
}

fn check_writable(ws: &WorkingSpace) -> CheckResult {
    let name = "working space writable";
    if let Err(e) = fs::create_dir_all(ws.root()) {
        return CheckResult::fail(name, &format!("Cannot create {}: {}", ws.root().display(), e));
    }
    let probe = ws.root().join(".preflight-test");
    match fs::write(&probe, "test") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            CheckResult::pass_with(name, &ws.root().display().to_string())
        }
        Err(e) => CheckResult::fail(
            name,
            &format!("Cannot write to {}: {}", ws.root().display(), e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;

    #[test]
    fn test_writable_workspace_passes() {
        let temp = tempfile::TempDir::new().unwrap();
        let ws = WorkingSpace::new(temp.path().join("build"));
        let result = check_writable(&ws);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(!ws.root().join(".preflight-test").exists());
    }

    #[test]
    fn test_unwritable_workspace_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        let result = check_writable(&WorkingSpace::new(file.join("build")));
        assert_eq!(result.status, CheckStatus::Fail);
    }
}
