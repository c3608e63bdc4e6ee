//! Line-oriented UCI conversation with a child process.

use crate::errors::EngineError;
use shakmaty::uci::UciMove;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// A running UCI engine. The process is killed when this is dropped.
pub struct UciProcess {
    path: String,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl UciProcess {
    pub fn spawn(path: &Path, args: &[String]) -> Result<Self, EngineError> {
        let shown = path.display().to_string();
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: shown.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdout unavailable".into()))?;

        tracing::debug!(path = %shown, pid = ?child.id(), "search engine started");

        Ok(Self {
            path: shown,
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    pub async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        tracing::trace!(path = %self.path, command, "uci >");
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Reads lines until one satisfies `done`, which is returned trimmed.
    pub async fn read_until<F>(&mut self, done: F, limit: Duration) -> Result<String, EngineError>
    where
        F: Fn(&str) -> bool,
    {
        let lines = &mut self.stdout;
        let path = &self.path;
        let read = async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        tracing::trace!(path = %path, line, "uci <");
                        if done(line) {
                            return Ok(line.to_string());
                        }
                    }
                    Ok(None) => return Err(EngineError::ProcessExited),
                    Err(err) => return Err(EngineError::Io(err)),
                }
            }
        };

        tokio::time::timeout(limit, read)
            .await
            .map_err(|_| EngineError::Timeout(limit))?
    }

    /// `uci` / `uciok`.
    pub async fn handshake(&mut self, limit: Duration) -> Result<(), EngineError> {
        self.send("uci").await?;
        match self.read_until(|line| line == "uciok", limit).await {
            Ok(_) => Ok(()),
            Err(err @ (EngineError::Timeout(_) | EngineError::ProcessExited)) => {
                Err(EngineError::Handshake(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn set_option(&mut self, name: &str, value: impl fmt::Display) -> Result<(), EngineError> {
        self.send(&format!("setoption name {name} value {value}")).await
    }

    /// `isready` / `readyok`.
    pub async fn ready(&mut self, limit: Duration) -> Result<(), EngineError> {
        self.send("isready").await?;
        self.read_until(|line| line == "readyok", limit).await?;
        Ok(())
    }

    /// Searches the position last sent with `position` to a fixed depth.
    pub async fn best_move(&mut self, depth: u8, limit: Duration) -> Result<Option<UciMove>, EngineError> {
        self.send(&format!("go depth {depth}")).await?;
        let line = self
            .read_until(|line| line.starts_with("bestmove"), limit)
            .await?;
        parse_best_move(&line)
    }

    /// Asks the engine to exit. Dropping the process kills it regardless.
    pub async fn quit(mut self) {
        if let Err(err) = self.send("quit").await {
            tracing::debug!(path = %self.path, error = %err, "quit not delivered");
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

impl fmt::Debug for UciProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UciProcess")
            .field("path", &self.path)
            .field("pid", &self.child.id())
            .finish()
    }
}

impl Drop for UciProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Parses a `bestmove` line. `(none)` and `0000` mean there is no move.
pub fn parse_best_move(line: &str) -> Result<Option<UciMove>, EngineError> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("bestmove") {
        return Err(EngineError::Protocol(format!("expected bestmove, got {line:?}")));
    }

    match tokens.next() {
        None | Some("(none)") | Some("0000") => Ok(None),
        Some(text) => text
            .parse::<UciMove>()
            .map(Some)
            .map_err(|_| EngineError::Protocol(format!("unreadable move {text:?}"))),
    }
}
