// Copyright 2025 Home Team.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Subprocess runner with line-oriented output callbacks.
//!
//! Each attached stream gets its own reader task. [`RunningCommand::wait`]
//! joins those tasks before returning, so every callback invocation has
//! finished by the time the caller sees the exit status.

use crate::shared::error::{HomeError, Result};
use std::collections::VecDeque;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Number of stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// How long output readers may keep draining after a cancelled child is killed.
const CANCEL_DRAIN_GRACE: Duration = Duration::from_millis(500);

pub type LineCallback = Box<dyn FnMut(String) + Send + 'static>;

type StderrTail = Arc<Mutex<VecDeque<String>>>;

pub struct Command {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    stdin: Option<Box<dyn Read + Send + 'static>>,
    on_stdout: Option<LineCallback>,
    on_stderr: Option<LineCallback>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            stdin: None,
            on_stdout: None,
            on_stderr: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin_reader(Cursor::new(bytes.into()))
    }

    /// Feed the child's stdin from a blocking reader.
    pub fn stdin_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    pub fn on_stdout(mut self, callback: impl FnMut(String) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(callback));
        self
    }

    pub fn on_stderr(mut self, callback: impl FnMut(String) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(callback));
        self
    }

    /// Command line as shown in logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn spawn(self, cancel: &CancellationToken) -> Result<RunningCommand> {
        let command_line = self.display();
        if cancel.is_cancelled() {
            return Err(HomeError::Cancelled);
        }
        debug!("exec: {}", command_line);

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if self.on_stdout.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own process group so cancellation reaches anything the child forks
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            HomeError::subprocess(command_line.clone(), "spawn failure", e.to_string())
        })?;

        let stderr_tail: StderrTail = Arc::new(Mutex::new(VecDeque::new()));
        let mut readers = Vec::new();
        if let (Some(stdout), Some(callback)) = (child.stdout.take(), self.on_stdout) {
            readers.push(spawn_line_reader(stdout, Some(callback), None));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(
                stderr,
                self.on_stderr,
                Some(stderr_tail.clone()),
            ));
        }

        let stdin_task = match (child.stdin.take(), self.stdin) {
            (Some(stdin), Some(mut reader)) => {
                let mut bridge = SyncIoBridge::new(stdin);
                Some(tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                    std::io::copy(&mut reader, &mut bridge)?;
                    bridge.flush()?;
                    bridge.shutdown()
                }))
            }
            _ => None,
        };

        Ok(RunningCommand {
            command_line,
            child,
            readers,
            stdin_task,
            stderr_tail,
            cancel: cancel.clone(),
        })
    }

    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        self.spawn(cancel)?.wait().await
    }

    /// Run to completion and return stdout.
    pub async fn output(self, cancel: &CancellationToken) -> Result<String> {
        let collected = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = collected.clone();
        self.on_stdout(move |line| {
            if let Ok(mut lines) = sink.lock() {
                lines.push(line);
            }
        })
        .run(cancel)
        .await?;

        let lines = collected
            .lock()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default();
        Ok(lines)
    }
}

pub struct RunningCommand {
    command_line: String,
    child: tokio::process::Child,
    readers: Vec<JoinHandle<()>>,
    stdin_task: Option<JoinHandle<std::io::Result<()>>>,
    stderr_tail: StderrTail,
    cancel: CancellationToken,
}

impl RunningCommand {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for exit. Output callbacks have all run when this returns.
    pub async fn wait(mut self) -> Result<()> {
        let status = tokio::select! {
            status = self.child.wait() => Some(status),
            _ = self.cancel.cancelled() => None,
        };

        let status = match status {
            Some(status) => status?,
            None => {
                debug!("cancelled, killing: {}", self.command_line);
                self.kill_group();
                if let Err(e) = self.child.kill().await {
                    debug!("kill {} failed: {}", self.command_line, e);
                }
                self.abandon_streams().await;
                return Err(HomeError::Cancelled);
            }
        };

        self.join_streams().await;

        if status.success() {
            Ok(())
        } else {
            let tail = self
                .stderr_tail
                .lock()
                .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
                .unwrap_or_default();
            Err(HomeError::subprocess(
                self.command_line.clone(),
                status.to_string(),
                tail,
            ))
        }
    }

    /// SIGKILL the child's process group. The child leads it, so its pid is
    /// the group id.
    fn kill_group(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            let group = format!("-{}", pid);
            match std::process::Command::new("kill")
                .args(["-s", "KILL", "--", group.as_str()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) if !status.success() => {
                    debug!("kill group of {} exited {}", self.command_line, status)
                }
                Err(e) => debug!("kill group of {} failed: {}", self.command_line, e),
                _ => {}
            }
        }
    }

    /// Give the readers a short grace period to drain, then abort them. The
    /// stdin writer is left to fail on the closed pipe.
    async fn abandon_streams(&mut self) {
        for mut reader in self.readers.drain(..) {
            if tokio::time::timeout(CANCEL_DRAIN_GRACE, &mut reader)
                .await
                .is_err()
            {
                debug!("output of {} still open after kill", self.command_line);
                reader.abort();
            }
        }
        self.stdin_task.take();
    }

    async fn join_streams(&mut self) {
        for reader in self.readers.drain(..) {
            if let Err(e) = reader.await {
                debug!("output reader for {} panicked: {}", self.command_line, e);
            }
        }
        if let Some(task) = self.stdin_task.take() {
            match task.await {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    debug!("writing stdin of {} failed: {}", self.command_line, e);
                }
                Err(e) => debug!("stdin writer for {} panicked: {}", self.command_line, e),
                _ => {}
            }
        }
    }
}

fn spawn_line_reader<R>(
    stream: R,
    mut callback: Option<LineCallback>,
    tail: Option<StderrTail>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(tail) = &tail {
                        if let Ok(mut tail) = tail.lock() {
                            if tail.len() == STDERR_TAIL_LINES {
                                tail.pop_front();
                            }
                            tail.push_back(line.clone());
                        }
                    }
                    if let Some(callback) = callback.as_mut() {
                        callback(line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("stopped reading child output: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_callbacks_drained_before_wait_returns() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        Command::new("sh")
            .args(["-c", "for i in 1 2 3 4 5; do echo line$i; done"])
            .on_stdout(move |line| sink.lock().unwrap().push(line))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["line1", "line2", "line3", "line4", "line5"]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr_tail() {
        let err = Command::new("sh")
            .args(["-c", "echo bad thing >&2; exit 3"])
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            HomeError::Subprocess {
                command,
                status,
                stderr_tail,
            } => {
                assert!(command.starts_with("sh -c"));
                assert!(status.contains('3'));
                assert_eq!(stderr_tail, "bad thing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stdin_is_streamed() {
        let out = Command::new("sh")
            .args(["-s", "-", "world"])
            .stdin_bytes("echo hello $1\n")
            .output(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let cancel = CancellationToken::new();
        let running = Command::new("sleep").arg("30").spawn(&cancel).unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = running.wait().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancel_does_not_wait_for_grandchildren() {
        let cancel = CancellationToken::new();
        let started_line = Arc::new(Mutex::new(false));
        let sink = started_line.clone();
        let running = Command::new("sh")
            .args(["-c", "sleep 8 & echo started; wait"])
            .on_stdout(move |_| *sink.lock().unwrap() = true)
            .spawn(&cancel)
            .unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = running.wait().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_program_is_subprocess_error() {
        let err = Command::new("/nonexistent/homecli-test-binary")
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::Subprocess { .. }));
    }
}
