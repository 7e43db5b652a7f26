//! Agent CLI subprocess.
//!
//! Spawns the agent in print mode with `stream-json` output and reads one
//! event per stdout line. Stderr is logged and its tail kept so a crash can
//! be reported with the agent's own message.

use super::{AgentConnector, AgentOptions, AgentSession, RawEvent, RawEventStream};
use crate::error::UpstreamError;
use agentdeck_core::config::AgentConfig;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Opens sessions by spawning the agent CLI.
#[derive(Debug, Clone)]
pub struct CliConnector {
    command: String,
    extra_args: Vec<String>,
    env: HashMap<String, String>,
    model: Option<String>,
}

impl CliConnector {
    /// Create a connector for the given executable.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            extra_args: Vec::new(),
            env: HashMap::new(),
            model: None,
        }
    }

    /// Create a connector from the `agent` config section.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            command: config.command.clone(),
            extra_args: config.extra_args.clone(),
            env: config.env.clone(),
            model: config.model.clone(),
        }
    }

    /// Append extra arguments.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command-line arguments for a turn.
    pub fn args(&self, options: &AgentOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            "--print",
            "--output-format",
            "stream-json",
            "--verbose",
            "--include-partial-messages",
            "--permission-mode",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(options.permission_mode.as_str().to_string());

        if let Some(ref token) = options.resume {
            args.push("--resume".into());
            args.push(token.clone());
        }
        if let Some(max_turns) = options.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }
        if let Some(ref model) = self.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl AgentConnector for CliConnector {
    fn name(&self) -> &str {
        "cli"
    }

    async fn open(&self, options: AgentOptions) -> Result<Box<dyn AgentSession>, UpstreamError> {
        let args = self.args(&options);
        let session = self.spawn(&args, &options.working_dir)?;
        Ok(Box::new(session))
    }
}

impl CliConnector {
    fn spawn(&self, args: &[String], working_dir: &Path) -> Result<CliSession, UpstreamError> {
        debug!("Spawning {} {:?}", self.command, args);

        let mut child = Command::new(&self.command)
            .args(args)
            .current_dir(working_dir)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(UpstreamError::Spawn)?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(stderr_reader_task(stderr, stderr_tail.clone())));

        info!(pid = ?child.id(), "Agent process started");

        Ok(CliSession {
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout,
            stderr_task,
            stderr_tail,
        })
    }
}

/// A running agent process.
struct CliSession {
    child: Arc<Mutex<Child>>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

#[async_trait]
impl AgentSession for CliSession {
    async fn send(&mut self, input: &str) -> Result<(), UpstreamError> {
        let mut stdin = self
            .stdin
            .take()
            .ok_or_else(|| UpstreamError::Protocol("input already sent".into()))?;
        let written = match stdin.write_all(input.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        match written {
            // Dropping stdin closes the pipe; print mode starts on EOF.
            Ok(()) => Ok(()),
            // The agent exited without reading its input. The event stream
            // reports the exit status and stderr.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Agent closed stdin before reading input");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self) -> Result<RawEventStream, UpstreamError> {
        let stdout = self
            .stdout
            .take()
            .ok_or_else(|| UpstreamError::Protocol("event stream already taken".into()))?;
        let child = self.child.clone();
        let stderr_task = self.stderr_task.take();
        let stderr_tail = self.stderr_tail.clone();

        Ok(Box::pin(async_stream::stream! {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match RawEvent::parse_line(line) {
                            Ok(event) => {
                                let terminal = event.is_terminal();
                                yield Ok(event);
                                if terminal {
                                    return;
                                }
                            }
                            Err(e) => warn!("Skipping agent output line: {}", e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(UpstreamError::Io(e));
                        return;
                    }
                }
            }

            // EOF without a result: report how the process ended.
            let status = child.lock().await.wait().await;
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
            match status {
                Ok(status) if status.success() => {
                    yield Err(UpstreamError::Closed);
                }
                Ok(status) => {
                    let message = stderr_tail
                        .lock()
                        .await
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join("\n");
                    yield Err(UpstreamError::Exited { code: status.code(), message });
                }
                Err(e) => {
                    yield Err(UpstreamError::Io(e));
                }
            }
        }))
    }

    async fn close(&mut self) -> Result<(), UpstreamError> {
        self.stdin = None;
        let mut child = self.child.lock().await;
        if child.try_wait()?.is_none() {
            debug!("Killing agent process");
            child.kill().await?;
        }
        Ok(())
    }
}

async fn stderr_reader_task(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        debug!("Agent stderr: {}", line);
        let mut tail = tail.lock().await;
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{ErrorClassifier, HeuristicClassifier};
    use agentdeck_core::types::{ErrorClass, PermissionMode};
    use futures::StreamExt;
    use std::time::Duration;

    #[test]
    fn test_args_minimal() {
        let connector = CliConnector::new("claude");
        let args = connector.args(&AgentOptions::default());
        assert_eq!(
            args,
            vec![
                "--print",
                "--output-format",
                "stream-json",
                "--verbose",
                "--include-partial-messages",
                "--permission-mode",
                "acceptEdits",
            ]
        );
    }

    #[test]
    fn test_args_full() {
        let mut config = AgentConfig::default();
        config.model = Some("sonnet".into());
        config.extra_args = vec!["--debug".into()];
        let connector = CliConnector::from_config(&config);

        let args = connector.args(&AgentOptions {
            working_dir: "/tmp".into(),
            permission_mode: PermissionMode::Plan,
            resume: Some("tok1".into()),
            max_turns: Some(4),
        });
        let joined = args.join(" ");
        assert!(joined.contains("--permission-mode plan"));
        assert!(joined.contains("--resume tok1"));
        assert!(joined.contains("--max-turns 4"));
        assert!(joined.contains("--model sonnet"));
        assert_eq!(args.last().map(String::as_str), Some("--debug"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let connector = CliConnector::new("agentdeck-no-such-binary");
        let result = connector
            .open(AgentOptions {
                working_dir: std::env::temp_dir(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(UpstreamError::Spawn(_))));
    }

    /// Runs a shell script in place of the agent binary.
    fn run_script(script: &str) -> CliSession {
        let args = vec!["-c".to_string(), script.to_string()];
        CliConnector::new("sh")
            .spawn(&args, &std::env::temp_dir())
            .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_events_from_process() {
        let mut session = run_script(
            r#"cat > /dev/null
echo '{"type":"system","subtype":"init","session_id":"tok1"}'
echo 'garbage'
echo ''
echo '{"type":"result","subtype":"success","result":"done"}'"#,
        );
        session.send("hello").await.unwrap();
        let events: Vec<_> = session.receive().unwrap().collect().await;
        session.close().await.unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(RawEvent::System { .. })));
        assert!(matches!(events[1], Ok(RawEvent::Result { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let mut session = run_script(
            "cat > /dev/null; echo 'No conversation found with session ID x' >&2; exit 1",
        );
        session.send("hello").await.unwrap();
        let events: Vec<_> = session.receive().unwrap().collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(UpstreamError::Exited { code, message }) => {
                assert_eq!(*code, Some(1));
                assert!(message.contains("No conversation found"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_before_reading_input_reports_stderr() {
        let mut session =
            run_script("echo 'No conversation found with session ID x' >&2; exit 1");
        tokio::time::sleep(Duration::from_millis(300)).await;

        session.send("hello").await.unwrap();
        let events: Vec<_> = session.receive().unwrap().collect().await;

        assert_eq!(events.len(), 1);
        let error = match &events[0] {
            Err(error @ UpstreamError::Exited { code, message }) => {
                assert_eq!(*code, Some(1));
                assert!(message.contains("No conversation found"));
                error
            }
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            HeuristicClassifier::new().classify(error),
            ErrorClass::SessionInvalidated
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_without_result_is_closed() {
        let mut session = run_script("cat > /dev/null");
        session.send("hello").await.unwrap();
        let events: Vec<_> = session.receive().unwrap().collect().await;
        assert!(matches!(events.as_slice(), [Err(UpstreamError::Closed)]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_kills_running_process() {
        let mut session = run_script("sleep 30");
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(session.receive().is_ok());
        assert!(session.receive().is_err());
    }
}
