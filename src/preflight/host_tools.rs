//! Host tool availability checks.

use crate::tools::{ToolSpec, Tools};

use super::types::CheckResult;

/// Check every collaborator is installed.
///
/// Mount tools are only needed for loop mounting, `osirrox` only for direct
/// extraction, and `sudo` only when not running as root.
pub fn check_host_tools(tools: &Tools, needs_mount: bool, needs_sudo: bool) -> Vec<CheckResult> {
    tools
        .specs()
        .into_iter()
        .map(|spec| {
            if required_here(&spec, tools, needs_mount, needs_sudo) {
                check_tool_exists(&spec)
            } else {
                CheckResult::skip(spec.program, "Not used in this environment")
            }
        })
        .collect()
}

fn required_here(spec: &ToolSpec<'_>, tools: &Tools, needs_mount: bool, needs_sudo: bool) -> bool {
    if !spec.conditional {
        true
    } else if spec.program == tools.sudo {
        needs_sudo
    } else if spec.program == tools.osirrox {
        !needs_mount
    } else {
        // mount, umount, mountpoint
        needs_mount
    }
}

/// Check if a tool exists in PATH (or at the configured path).
fn check_tool_exists(spec: &ToolSpec<'_>) -> CheckResult {
    match which::which(spec.program) {
        Ok(path) => CheckResult::pass_with(spec.program, &path.display().to_string()),
        Err(_) => CheckResult::fail(
            spec.program,
            &format!("Not found. Install '{}' package. {}", spec.package, spec.purpose),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preflight::types::CheckStatus;

    #[test]
    fn test_missing_tool_fails() {
        let tools = Tools {
            skopeo: "nonexistent_program_12345".to_string(),
            ..Tools::default()
        };
        let results = check_host_tools(&tools, false, false);
        let skopeo = results
            .iter()
            .find(|r| r.name == "nonexistent_program_12345")
            .unwrap();
        assert_eq!(skopeo.status, CheckStatus::Fail);
        assert!(skopeo.details.as_deref().unwrap().contains("skopeo"));
    }

    #[test]
    fn test_mount_tools_skipped_for_direct_extraction() {
        let results = check_host_tools(&Tools::default(), false, false);
        let mount = results.iter().find(|r| r.name == "mount").unwrap();
        assert_eq!(mount.status, CheckStatus::Skip);
        let sudo = results.iter().find(|r| r.name == "sudo").unwrap();
        assert_eq!(sudo.status, CheckStatus::Skip);
    }

    #[test]
    fn test_present_tool_passes() {
        let tools = Tools {
            cp: "sh".to_string(),
            ..Tools::default()
        };
        let results = check_host_tools(&tools, true, true);
        let sh = results.iter().find(|r| r.name == "sh").unwrap();
        assert_eq!(sh.status, CheckStatus::Pass);
    }
}
