//! Privilege elevation for the few operations that need root.
//!
//! Mounting, unmounting, ownership normalization and the registry copy may
//! need elevated capability. The decision is made once at startup from the
//! effective uid and handed to the stages that need it.

use crate::process::Cmd;

/// Capability to run a command with elevated privileges.
pub trait PrivilegedExecutor {
    /// Wrap `cmd` so that it runs privileged.
    fn elevate(&self, cmd: Cmd) -> Cmd;

    /// Short description for logs.
    fn describe(&self) -> &'static str;
}

/// Already privileged: commands run unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Direct;

impl PrivilegedExecutor for Direct {
    fn elevate(&self, cmd: Cmd) -> Cmd {
        cmd
    }

    fn describe(&self) -> &'static str {
        "direct (running as root)"
    }
}

/// Elevate through `sudo`.
#[derive(Debug, Clone)]
pub struct Sudo {
    program: String,
}

impl Sudo {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Sudo {
    fn default() -> Self {
        Self::new("sudo")
    }
}

impl PrivilegedExecutor for Sudo {
    fn elevate(&self, cmd: Cmd) -> Cmd {
        cmd.wrapped_by(&self.program)
    }

    fn describe(&self) -> &'static str {
        "sudo"
    }
}

/// Identity of the invoking user, used for ownership normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invoker {
    pub uid: u32,
    pub gid: u32,
}

impl Invoker {
    /// Effective uid/gid of this process.
    pub fn current() -> Self {
        // SAFETY: geteuid/getegid have no preconditions and cannot fail.
        let (uid, gid) = unsafe { (libc::geteuid(), libc::getegid()) };
        Self { uid, gid }
    }

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }

    /// `uid:gid` as accepted by chown.
    pub fn owner_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

/// Pick the executor for this invocation: no-op as root, `sudo` otherwise.
pub fn detect(invoker: Invoker, sudo_program: &str) -> Box<dyn PrivilegedExecutor> {
    if invoker.is_root() {
        Box::new(Direct)
    } else {
        Box::new(Sudo::new(sudo_program))
    }
}
