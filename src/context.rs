//! Build context shared by all pipeline stages.
//!
//! Everything environment-dependent is decided once, here: which extraction
//! strategy to use, whether privileged commands need `sudo`, and who owns
//! the extracted tree afterwards.

use crate::extract::{select_strategy, ExtractionStrategy};
use crate::privilege::{self, Invoker, PrivilegedExecutor};
use crate::tools::Tools;
use crate::workspace::WorkingSpace;

/// Shared context for one pipeline invocation.
pub struct BuildContext {
    pub workspace: WorkingSpace,
    pub tools: Tools,
    /// Wraps mount, unmount, ownership and registry-copy commands.
    pub privileged: Box<dyn PrivilegedExecutor>,
    /// Owner the extracted tree is normalized to.
    pub invoker: Invoker,
    pub strategy: Box<dyn ExtractionStrategy>,
}

impl BuildContext {
    /// Probe the environment and build the context.
    pub fn new(workspace: WorkingSpace, tools: Tools) -> Self {
        let invoker = Invoker::current();
        let privileged = privilege::detect(invoker, &tools.sudo);
        let strategy = select_strategy(&workspace);
        Self {
            workspace,
            tools,
            privileged,
            invoker,
            strategy,
        }
    }

    /// Replace the privilege executor.
    pub fn with_privileged(mut self, privileged: Box<dyn PrivilegedExecutor>) -> Self {
        self.privileged = privileged;
        self
    }

    /// Replace the extraction strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Log the environment decisions.
    pub fn log_environment(&self) {
        tracing::info!("Working space: {}", self.workspace.root().display());
        tracing::info!("Extraction strategy: {}", self.strategy.name());
        tracing::info!("Privileged commands: {}", self.privileged.describe());
    }
}
