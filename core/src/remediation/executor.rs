use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Capability for invoking an external remediation process. Injected so the
/// dispatcher can be tested against a fake instead of a real script.
pub trait Executor {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> EngineResult<ExecOutput>;
}

/// Real subprocess executor. A timeout kills the child and surfaces as an
/// executor error; the caller treats that as a remediation error, never a
/// crash of the run.
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> EngineResult<ExecOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Executor(format!("failed to spawn {}: {}", program, e)))?;

        // Drain both pipes while waiting: a child writing more than the pipe
        // buffer would otherwise block on write and never exit.
        let stdout_reader = child.stdout.take().map(spawn_pipe_reader);
        let stderr_reader = child.stderr.take().map(spawn_pipe_reader);

        let started = Instant::now();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if started.elapsed() >= timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EngineError::Executor(format!(
                            "{} timed out after {}s",
                            program,
                            timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        };

        Ok(ExecOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: join_pipe_reader(stdout_reader)?,
            stderr: join_pipe_reader(stderr_reader)?,
        })
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<String>> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        pipe.read_to_string(&mut buf)?;
        Ok(buf)
    })
}

fn join_pipe_reader(reader: Option<JoinHandle<io::Result<String>>>) -> EngineResult<String> {
    match reader {
        Some(handle) => Ok(handle
            .join()
            .map_err(|_| EngineError::Executor("output reader thread panicked".to_string()))??),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_exit_code_and_output() {
        let out = ProcessExecutor
            .run(
                "sh",
                &["-c".to_string(), "echo applied; exit 0".to_string()],
                Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "applied");
    }

    #[test]
    fn nonzero_exit_is_reported_not_an_error() {
        let out = ProcessExecutor
            .run(
                "sh",
                &["-c".to_string(), "echo broken >&2; exit 3".to_string()],
                Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(out.stderr.contains("broken"));
    }

    #[test]
    fn output_larger_than_the_pipe_buffer_is_fully_captured() {
        let out = ProcessExecutor
            .run(
                "sh",
                &[
                    "-c".to_string(),
                    "head -c 262144 /dev/zero | tr '\\0' x; exit 0".to_string(),
                ],
                Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.len(), 262144);
    }

    #[test]
    fn missing_executable_is_an_executor_error() {
        let err = ProcessExecutor
            .run("definitely-not-a-real-binary", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::Executor(_)));
    }

    #[test]
    fn timeout_kills_the_child() {
        let err = ProcessExecutor
            .run(
                "sh",
                &["-c".to_string(), "sleep 30".to_string()],
                Duration::from_millis(300),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Executor(_)));
    }
}
