//! Script execution

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{HookError, Result};
use crate::runbook::Script;

/// Captured outcome of one script
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScriptResult {
    pub stdout: String,
    pub stderr: String,
    pub status_code: i32,
}

/// Results in the same order as the scripts that produced them
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExecutionReport {
    pub results: Vec<ScriptResult>,
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, scripts: &[Script]) -> Result<ExecutionReport>;
}

/// Runs each script as a child process, one after another.
///
/// A non-zero exit is recorded and the next script still runs; a script
/// that cannot be started aborts the remaining ones.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    async fn run_script(script: &Script) -> Result<ScriptResult> {
        // arguments may carry the request body
        info!("Running: {}", script.command);
        debug!("Arguments for {}: {:?}", script.command, script.args);

        let output = Command::new(&script.command)
            .args(&script.args)
            .output()
            .await
            .map_err(|e| {
                error!("{} failed to start: {}", script.command, e);
                HookError::Execution(format!("{} failed to start: {}", script.command, e))
            })?;

        // killed by a signal
        let status_code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            error!(
                "{} exited with {}:\n{}",
                script.command,
                status_code,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(ScriptResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status_code,
        })
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, scripts: &[Script]) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();
        for script in scripts {
            report.results.push(Self::run_script(script).await?);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn arguments_stay_out_of_info_logs() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let scripts = vec![Script::new("echo", vec![r#"{"token": "s3cret"}"#.into()])];
        CommandExecutor.execute(&scripts).await.unwrap();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Running: echo"), "{output}");
        assert!(!output.contains("s3cret"), "{output}");
    }

    #[tokio::test]
    async fn captures_stdout_and_status() {
        let scripts = vec![Script::new("echo", vec!["foo".into()])];
        let report = CommandExecutor.execute(&scripts).await.unwrap();
        assert_eq!(
            report.results,
            vec![ScriptResult {
                stdout: "foo\n".into(),
                stderr: String::new(),
                status_code: 0,
            }]
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let scripts = vec![
            Script::new("false", vec![]),
            Script::new("echo", vec!["after".into()]),
        ];
        let report = CommandExecutor.execute(&scripts).await.unwrap();
        assert_eq!(report.results[0].status_code, 1);
        assert_eq!(report.results[1].stdout, "after\n");
    }

    #[tokio::test]
    async fn missing_command_is_an_execution_error() {
        let scripts = vec![Script::new("definitely-not-a-real-command-xyz", vec![])];
        let err = CommandExecutor.execute(&scripts).await.unwrap_err();
        assert!(matches!(err, HookError::Execution(_)));
    }

    #[test]
    fn report_serializes_with_expected_field_names() {
        let report = ExecutionReport {
            results: vec![ScriptResult {
                stdout: "foo\n".into(),
                stderr: String::new(),
                status_code: 0,
            }],
        };
        let expected = "{\n  \"results\": [\n    {\n      \"stdout\": \"foo\\n\",\n      \"stderr\": \"\",\n      \"status_code\": 0\n    }\n  ]\n}";
        assert_eq!(serde_json::to_string_pretty(&report).unwrap(), expected);
    }
}
