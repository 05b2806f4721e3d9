//! External process execution for functions that shell out.
//!
//! Processes run through the [`ProcessRunner`] trait so function bodies can be
//! tested without spawning anything. The system runner races the child
//! against the call's [`Context`] and kills it when the context is done.

use crate::context::Context;
use crate::error::ExecutionError;
use anyhow::anyhow;
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};

// =============================================================================
// Traits for Dependency Injection
// =============================================================================

/// Trait for running system processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` to completion and captures its output.
    ///
    /// Fails with [`ExecutionError::Context`] when `ctx` is done first; the
    /// child is killed in that case.
    async fn run(&self, ctx: &Context, program: &str, args: &[String]) -> Result<Output, ExecutionError>;

    /// Checks if a program exists in PATH.
    fn program_exists(&self, program: &str) -> bool;
}

// =============================================================================
// Default Implementations
// =============================================================================

/// Default process runner using tokio::process::Command.
#[derive(Debug, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, ctx: &Context, program: &str, args: &[String]) -> Result<Output, ExecutionError> {
        info!("Executing system command: {} {:?}", program, args);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| anyhow!("Failed to start {}: {}", program, e))?;

        // Dropping the pending future drops the child, which kills it.
        match ctx.run(child.wait_with_output()).await {
            Ok(output) => {
                let output = output.map_err(|e| anyhow!("Failed to wait for {}: {}", program, e))?;
                debug!("{} exited with status: {}", program, output.status);
                Ok(output)
            }
            Err(err) => {
                warn!("Killed {} after context ended: {}", program, err);
                Err(err.into())
            }
        }
    }

    fn program_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Lossy UTF-8 text of a captured stream, trimmed of trailing whitespace.
pub fn output_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}
