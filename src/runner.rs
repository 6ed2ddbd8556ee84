use crate::error::{PipelineError, Result};
use std::process::Command;
use tracing::debug;

/// Captured output of an external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Narrow seam around external CLIs (kaggle, dvc, git).
///
/// Commands are passed as an argv vector, never as a shell string, so paths
/// containing spaces or metacharacters cannot be reinterpreted. Tests inject a
/// fake implementation to observe the exact invocations.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<ToolOutput>;
}

/// Runs commands on the host system via `std::process::Command`.
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<ToolOutput> {
        debug!("Running command: {}", render_command(program, args));
        let output = Command::new(program).args(args).output()?;
        Ok(ToolOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs a command and converts a non-zero exit into an `ExternalTool` error.
pub fn run_checked(runner: &dyn ToolRunner, program: &str, args: &[&str]) -> Result<ToolOutput> {
    let output = runner.run(program, args)?;
    if output.success() {
        Ok(output)
    } else {
        Err(PipelineError::ExternalTool {
            command: render_command(program, args),
            status: output.status,
            stderr: output.stderr,
        })
    }
}

/// Display form of an invocation, for logs and error messages only.
pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeRunner {
        status: i32,
        calls: Mutex<Vec<String>>,
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(render_command(program, args));
            Ok(ToolOutput {
                status: self.status,
                stdout: String::new(),
                stderr: "boom".to_string(),
            })
        }
    }

    #[test]
    fn run_checked_passes_through_success() {
        let runner = FakeRunner { status: 0, calls: Mutex::new(Vec::new()) };
        let output = run_checked(&runner, "git", &["status"]).unwrap();
        assert!(output.success());
        assert_eq!(runner.calls.lock().unwrap().as_slice(), ["git status"]);
    }

    #[test]
    fn run_checked_surfaces_failures() {
        let runner = FakeRunner { status: 2, calls: Mutex::new(Vec::new()) };
        let err = run_checked(&runner, "dvc", &["add", "data/raw"]).unwrap_err();
        match err {
            PipelineError::ExternalTool { command, status, stderr } => {
                assert_eq!(command, "dvc add data/raw");
                assert_eq!(status, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
