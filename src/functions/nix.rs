use crate::context::Context;
use crate::error::ExecutionError;
use crate::executor::{ProcessRunner, SystemProcessRunner, output_text};
use crate::function::{Function, FunctionOptions};
use crate::result::{FunctionResult, Progress};
use crate::schema::{FunctionParameter, FunctionSchema, Parameters};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

const PROGRAMS: [&str; 2] = ["nix", "nixos-rebuild"];

/// Runs `nix` or `nixos-rebuild` with caller-supplied arguments.
pub struct NixFunction {
    schema: FunctionSchema,
    runner: Arc<dyn ProcessRunner>,
}

impl NixFunction {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemProcessRunner))
    }

    pub fn with_runner(runner: Arc<dyn ProcessRunner>) -> Self {
        let schema = FunctionSchema::new(
            "nix",
            "Run a nix or nixos-rebuild command and capture its output",
            vec![
                FunctionParameter::string_enum("program", "Program to run", false, PROGRAMS).with_default("nix"),
                FunctionParameter::array(
                    "args",
                    "Command-line arguments passed to the program",
                    true,
                    FunctionParameter::string("arg", "A single argument", false),
                ),
            ],
        )
        .with_example(
            "Show the installed Nix version",
            json!({"args": ["--version"]}),
            "Version string on stdout",
        )
        .with_example(
            "Dry-run a system rebuild",
            json!({"program": "nixos-rebuild", "args": ["dry-build"]}),
            "Derivations that would be built",
        );

        Self { schema, runner }
    }
}

impl Default for NixFunction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Function for NixFunction {
    fn schema(&self) -> &FunctionSchema {
        &self.schema
    }

    async fn execute(
        &self,
        ctx: &Context,
        params: &Parameters,
        options: &FunctionOptions,
    ) -> Result<FunctionResult, ExecutionError> {
        let program = self
            .schema
            .param_or_default(params, "program")
            .and_then(|p| p.as_str())
            .unwrap_or("nix");
        let args: Vec<String> = params
            .get("args")
            .and_then(|a| a.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).map(str::to_string).collect())
            .unwrap_or_default();

        if !self.runner.program_exists(program) {
            return Ok(FunctionResult::failure(format!(
                "{} is not installed or not in PATH",
                program
            )));
        }

        options.report(
            Progress::new(1, 2, format!("Running {} {}", program, args.join(" "))).with_stage("running"),
        );
        let output = self.runner.run(ctx, program, &args).await?;
        options.report(Progress::new(2, 2, "Command finished").with_stage("complete"));

        let stdout = output_text(&output.stdout);
        let stderr = output_text(&output.stderr);
        let exit_code = output.status.code();

        if output.status.success() {
            return Ok(FunctionResult::success(json!({
                "program": program,
                "args": args,
                "exit_code": exit_code,
                "stdout": stdout,
                "stderr": stderr,
            })));
        }

        warn!("{} failed with status: {}", program, output.status);
        let error = if stderr.is_empty() {
            format!("{} exited with status: {}", program, output.status)
        } else {
            stderr
        };
        Ok(FunctionResult::failure(error)
            .with_metadata("exit_code", json!(exit_code))
            .with_metadata("stdout", stdout))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use parking_lot::Mutex;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};

    // =========================================================================
    // Mock implementations
    // =========================================================================

    /// Mock process runner for testing.
    struct MockProcessRunner {
        output: Output,
        program_exists: bool,
        last_call: Mutex<Option<(String, Vec<String>)>>,
    }

    impl MockProcessRunner {
        fn success(stdout: &str) -> Arc<Self> {
            Self::with_output(0, stdout, "", true)
        }

        fn failure(stderr: &str) -> Arc<Self> {
            Self::with_output(1 << 8, "", stderr, true) // Exit code 1
        }

        fn missing_program() -> Arc<Self> {
            Self::with_output(0, "", "", false)
        }

        fn with_output(raw_status: i32, stdout: &str, stderr: &str, program_exists: bool) -> Arc<Self> {
            Arc::new(Self {
                output: Output {
                    status: ExitStatus::from_raw(raw_status),
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: stderr.as_bytes().to_vec(),
                },
                program_exists,
                last_call: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn run(&self, ctx: &Context, program: &str, args: &[String]) -> Result<Output, ExecutionError> {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }
            *self.last_call.lock() = Some((program.to_string(), args.to_vec()));
            Ok(self.output.clone())
        }

        fn program_exists(&self, _program: &str) -> bool {
            self.program_exists
        }
    }

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    async fn run(runner: Arc<MockProcessRunner>, value: serde_json::Value) -> Result<FunctionResult, ExecutionError> {
        NixFunction::with_runner(runner)
            .execute(&Context::background(), &params(value), &FunctionOptions::new())
            .await
    }

    #[test]
    fn test_schema_requires_string_args() {
        let nix = NixFunction::new();
        assert!(nix.validate_parameters(&Parameters::new()).is_err());
        assert!(nix.validate_parameters(&params(json!({"args": [1]}))).is_err());
        assert!(nix.validate_parameters(&params(json!({"program": "rm", "args": []}))).is_err());
        assert!(nix.validate_parameters(&params(json!({"args": ["--version"]}))).is_ok());
    }

    #[tokio::test]
    async fn test_success_defaults_to_nix() {
        let runner = MockProcessRunner::success("nix (Nix) 2.18.1\n");
        let result = run(runner.clone(), json!({"args": ["--version"]})).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.data().unwrap()["stdout"], "nix (Nix) 2.18.1");
        assert_eq!(result.data().unwrap()["exit_code"], 0);
        assert_eq!(
            *runner.last_call.lock(),
            Some(("nix".to_string(), vec!["--version".to_string()]))
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_domain_failure() {
        let runner = MockProcessRunner::failure("error: flake 'path:/etc/nixos' does not provide attribute\n");
        let result = run(runner, json!({"program": "nixos-rebuild", "args": ["build"]}))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert!(result.error().unwrap().starts_with("error: flake"));
        assert_eq!(result.metadata()["exit_code"], 1);
    }

    #[tokio::test]
    async fn test_missing_program_is_a_domain_failure() {
        let result = run(MockProcessRunner::missing_program(), json!({"args": []}))
            .await
            .unwrap();
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("nix is not installed or not in PATH"));
    }

    #[tokio::test]
    async fn test_cancellation_is_an_execution_error() {
        let (ctx, guard) = Context::background().with_cancel();
        guard.cancel();

        let err = NixFunction::with_runner(MockProcessRunner::success(""))
            .execute(&ctx, &params(json!({"args": ["build"]})), &FunctionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Context(ContextError::Canceled)));
    }

    #[tokio::test]
    async fn test_reports_two_progress_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = FunctionOptions::new().with_progress(move |p| sink.lock().push((p.current, p.stage)));

        NixFunction::with_runner(MockProcessRunner::success(""))
            .execute(&Context::background(), &params(json!({"args": ["flake", "check"]})), &options)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(1, "running".to_string()), (2, "complete".to_string())]
        );
    }
}
