//! External tools - git, pip 같은 외부 명령 실행
//!
//! 출력은 모두 캡처하고, 타임아웃이나 취소 시 프로세스를 종료한다.

use super::error::ToolError;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 설정된 외부 명령 (`python3 -m pip` → program `python3`, args `[-m, pip]`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    program: String,
    args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// argv 전체에서 생성 (빈 argv면 None)
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut iter = argv.into_iter();
        let program = iter.next()?;
        Some(Self::new(program).with_args(iter))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// 설정된 인자 뒤에 `extra`를 붙여 실행하고 끝날 때까지 기다린다
    pub async fn run(
        &self,
        extra: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let executable = which::which(&self.program).map_err(|_| ToolError::Unavailable {
            program: self.program.clone(),
        })?;

        debug!("Running {} {:?} {:?}", self.program, self.args, extra);

        let mut cmd = Command::new(executable);
        cmd.args(&self.args)
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // select!에서 빠져나가면 child가 drop되면서 종료된다
        tokio::select! {
            _ = cancel.cancelled() => Err(ToolError::Cancelled {
                program: self.program.clone(),
            }),
            result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
                Err(_) => Err(ToolError::Timeout {
                    program: self.program.clone(),
                    timeout,
                }),
                Ok(Err(source)) => Err(ToolError::Spawn {
                    program: self.program.clone(),
                    source,
                }),
                Ok(Ok(output)) => {
                    debug!("{} exited with {}", self.program, output.status);
                    Ok(ToolOutput {
                        status: output.status,
                        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    })
                }
            },
        }
    }
}

impl std::fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// 종료된 외부 명령의 결과
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// 에러 메시지로 보여줄 진단 텍스트 (stderr 우선)
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exited with {}", self.status)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalTool {
        ExternalTool::new("sh").with_args(["-c", script, "--"])
    }

    #[tokio::test]
    async fn test_run_captures_output() {
        let tool = sh("echo out; echo err >&2; exit 3");
        let output = tool
            .run(&[], Duration::from_secs(10), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.diagnostic(), "err");
    }

    #[tokio::test]
    async fn test_extra_args_are_appended() {
        let tool = sh("echo \"$1-$2\"");
        let output = tool
            .run(
                &["a".to_string(), "b".to_string()],
                Duration::from_secs(10),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(output.stdout.trim(), "a-b");
    }

    #[tokio::test]
    async fn test_timeout() {
        let tool = sh("sleep 5");
        let result = tool
            .run(&[], Duration::from_millis(100), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let tool = sh("sleep 5");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tool.run(&[], Duration::from_secs(10), &cancel).await;
        assert!(matches!(result, Err(ToolError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_unavailable_program() {
        let tool = ExternalTool::new("onecode-no-such-program");

        let result = tool
            .run(&[], Duration::from_secs(1), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ToolError::Unavailable { .. })));
    }

    #[test]
    fn test_from_argv() {
        let tool = ExternalTool::from_argv(vec!["python3".into(), "-m".into(), "pip".into()]).unwrap();
        assert_eq!(tool.program(), "python3");
        assert_eq!(tool.args(), ["-m", "pip"]);
        assert_eq!(tool.to_string(), "python3 -m pip");
        assert!(ExternalTool::from_argv(vec![]).is_none());
    }
}
