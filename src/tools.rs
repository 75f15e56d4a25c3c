//! External programs the pipeline drives.
//!
//! Each collaborator is referenced by program name. The defaults resolve
//! through `PATH`; any of them can be replaced with `OVE_TOOL_<NAME>`
//! (e.g. `OVE_TOOL_XORRISO=/opt/xorriso/bin/xorriso`).

use std::collections::HashMap;

/// Program names for every external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub sudo: String,
    pub mount: String,
    pub umount: String,
    pub mountpoint: String,
    pub cp: String,
    pub chown: String,
    pub chmod: String,
    pub rm: String,
    pub xorriso: String,
    pub osirrox: String,
    pub skopeo: String,
    pub isohybrid: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            sudo: "sudo".to_string(),
            mount: "mount".to_string(),
            umount: "umount".to_string(),
            mountpoint: "mountpoint".to_string(),
            cp: "cp".to_string(),
            chown: "chown".to_string(),
            chmod: "chmod".to_string(),
            rm: "rm".to_string(),
            xorriso: "xorriso".to_string(),
            osirrox: "osirrox".to_string(),
            skopeo: "skopeo".to_string(),
            isohybrid: "isohybrid".to_string(),
        }
    }
}

/// A collaborator as seen by preflight.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec<'a> {
    pub program: &'a str,
    pub package: &'static str,
    pub purpose: &'static str,
    /// Only needed by the loop-mount strategy or when not running as root.
    pub conditional: bool,
}

impl Tools {
    /// Defaults with `OVE_TOOL_<NAME>` overrides applied.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let mut tools = Self::default();
        {
            let slots: [(&str, &mut String); 12] = [
                ("SUDO", &mut tools.sudo),
                ("MOUNT", &mut tools.mount),
                ("UMOUNT", &mut tools.umount),
                ("MOUNTPOINT", &mut tools.mountpoint),
                ("CP", &mut tools.cp),
                ("CHOWN", &mut tools.chown),
                ("CHMOD", &mut tools.chmod),
                ("RM", &mut tools.rm),
                ("XORRISO", &mut tools.xorriso),
                ("OSIRROX", &mut tools.osirrox),
                ("SKOPEO", &mut tools.skopeo),
                ("ISOHYBRID", &mut tools.isohybrid),
            ];
            for (name, slot) in slots {
                if let Some(value) = vars.get(&format!("OVE_TOOL_{}", name)) {
                    let value = value.trim();
                    if !value.is_empty() {
                        *slot = value.to_string();
                    }
                }
            }
        }
        tools
    }

    /// Every collaborator with its package hint.
    pub fn specs(&self) -> Vec<ToolSpec<'_>> {
        vec![
            ToolSpec {
                program: &self.xorriso,
                package: "xorriso",
                purpose: "Reads the base ISO table of contents and authors the new ISO",
                conditional: false,
            },
            ToolSpec {
                program: &self.osirrox,
                package: "xorriso",
                purpose: "Extracts the base ISO without mounting it",
                conditional: true,
            },
            ToolSpec {
                program: &self.skopeo,
                package: "skopeo",
                purpose: "Copies the artifact from its registry into an OCI archive",
                conditional: false,
            },
            ToolSpec {
                program: &self.isohybrid,
                package: "syslinux",
                purpose: "Patches the hybrid MBR for USB/disk boot",
                conditional: false,
            },
            ToolSpec {
                program: &self.cp,
                package: "coreutils",
                purpose: "Copies the extracted tree",
                conditional: false,
            },
            ToolSpec {
                program: &self.chown,
                package: "coreutils",
                purpose: "Normalizes ownership of the extracted tree",
                conditional: false,
            },
            ToolSpec {
                program: &self.chmod,
                package: "coreutils",
                purpose: "Makes the extracted tree writable",
                conditional: false,
            },
            ToolSpec {
                program: &self.mount,
                package: "util-linux",
                purpose: "Loop-mounts the base ISO",
                conditional: true,
            },
            ToolSpec {
                program: &self.umount,
                package: "util-linux",
                purpose: "Releases the loop mount",
                conditional: true,
            },
            ToolSpec {
                program: &self.mountpoint,
                package: "util-linux",
                purpose: "Detects a lingering loop mount",
                conditional: true,
            },
            ToolSpec {
                program: &self.sudo,
                package: "sudo",
                purpose: "Privilege elevation when not running as root",
                conditional: true,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_path_names() {
        let tools = Tools::default();
        assert_eq!(tools.xorriso, "xorriso");
        assert_eq!(tools.isohybrid, "isohybrid");
    }

    #[test]
    fn test_overrides_apply() {
        let mut vars = HashMap::new();
        vars.insert("OVE_TOOL_XORRISO".to_string(), "/opt/bin/xorriso".to_string());
        vars.insert("OVE_TOOL_SKOPEO".to_string(), "  ".to_string());

        let tools = Tools::from_vars(&vars);
        assert_eq!(tools.xorriso, "/opt/bin/xorriso");
        // Blank override is ignored
        assert_eq!(tools.skopeo, "skopeo");
    }

    #[test]
    fn test_specs_cover_authoring_and_patching() {
        let tools = Tools::default();
        let specs = tools.specs();
        assert!(specs.iter().any(|s| s.program == "xorriso" && !s.conditional));
        assert!(specs.iter().any(|s| s.program == "isohybrid" && !s.conditional));
        assert!(specs.iter().any(|s| s.program == "mount" && s.conditional));
    }
}
