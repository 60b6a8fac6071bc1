//! Docker CLI runtime adapter.
//!
//! Drives the `docker` and `docker compose` subcommands as child processes.
//! Output of dumps and restores is piped in fixed-size chunks so archives of
//! any size pass through without being held in memory.

use super::{ContainerHealth, ImageSummary, LogStream, RuntimeAdapter};
use crate::error::{FleetError, Result};
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, instrument};

const PIPE_CHUNK: usize = 64 * 1024;

/// Runtime adapter backed by the Docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    /// Create an adapter invoking `binary` (looked up in `PATH` when relative).
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> FleetError {
        let reason = if e.kind() == std::io::ErrorKind::NotFound {
            format!("{} not found", self.binary)
        } else {
            format!("failed to launch {}: {}", self.binary, e)
        };
        FleetError::RuntimeUnavailable { reason }
    }

    /// Run a command to completion and return its stdout.
    async fn run(&self, operation: &str, subject: &str, args: &[&str]) -> Result<String> {
        debug!(operation, subject, ?args, "Invoking container runtime");

        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(classify(operation, subject, &String::from_utf8_lossy(&output.stderr)))
        }
    }

    async fn compose(&self, operation: &str, stack_path: &Path, project: &str, tail: &[&str]) -> Result<()> {
        let file = stack_path.to_string_lossy();
        let mut args = vec!["compose", "-f", file.as_ref(), "-p", project];
        args.extend_from_slice(tail);
        self.run(operation, project, &args).await.map(|_| ())
    }
}

fn exec_args(container: &str, args: &[String], env: &[(String, String)], interactive: bool) -> Vec<String> {
    let mut argv = vec!["exec".to_string()];
    if interactive {
        argv.push("-i".to_string());
    }
    // Values come from the CLI process environment, keeping them off argv.
    for (key, _) in env {
        argv.push("-e".to_string());
        argv.push(key.clone());
    }
    argv.push(container.to_string());
    argv.extend(args.iter().cloned());
    argv
}

async fn read_all(mut reader: impl AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// Map a failed invocation's stderr onto the error taxonomy.
pub(crate) fn classify(operation: &str, subject: &str, stderr: &str) -> FleetError {
    let reason = stderr.trim();
    let lower = reason.to_lowercase();

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("error during connect")
    {
        FleetError::RuntimeUnavailable { reason: reason.to_string() }
    } else if lower.contains("no such container") || lower.contains("no such object") {
        FleetError::NotFound { name: subject.to_string() }
    } else {
        FleetError::RuntimeFailed {
            operation: format!("{} {}", operation, subject),
            reason: if reason.is_empty() { "exited with non-zero status".to_string() } else { reason.to_string() },
        }
    }
}

/// Parse `docker images` output formatted as tab-separated columns.
pub(crate) fn parse_image_lines(output: &str) -> Vec<ImageSummary> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('\t');
            Some(ImageSummary {
                repository: cols.next()?.to_string(),
                tag: cols.next()?.to_string(),
                id: cols.next()?.to_string(),
                size: cols.next()?.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl RuntimeAdapter for DockerCli {
    #[instrument(skip(self))]
    async fn is_running(&self, container: &str) -> Result<bool> {
        let out = self
            .run("inspect", container, &["inspect", "-f", "{{.State.Running}}", container])
            .await?;
        Ok(out.trim() == "true")
    }

    #[instrument(skip(self))]
    async fn health_status(&self, container: &str) -> Result<ContainerHealth> {
        let out = self
            .run(
                "inspect",
                container,
                &["inspect", "-f", "{{if .State.Health}}{{.State.Health.Status}}{{end}}", container],
            )
            .await?;
        Ok(ContainerHealth::parse(&out))
    }

    #[instrument(skip(self), fields(stack = %stack_path.display()))]
    async fn start_stack(&self, stack_path: &Path, project: &str) -> Result<()> {
        self.compose("compose up", stack_path, project, &["up", "-d"]).await
    }

    #[instrument(skip(self), fields(stack = %stack_path.display()))]
    async fn stop_stack(&self, stack_path: &Path, remove_volumes: bool, project: &str) -> Result<()> {
        let tail: &[&str] = if remove_volumes { &["down", "-v"] } else { &["down"] };
        self.compose("compose down", stack_path, project, tail).await
    }

    #[instrument(skip(self), fields(stack = %stack_path.display()))]
    async fn restart_stack(&self, stack_path: &Path, project: &str) -> Result<()> {
        self.compose("compose restart", stack_path, project, &["restart"]).await
    }

    #[instrument(skip(self))]
    async fn exec(&self, container: &str, args: &[String]) -> Result<String> {
        let argv = exec_args(container, args, &[], false);
        let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
        self.run("exec", container, &argv).await
    }

    #[instrument(skip(self, env, sink))]
    async fn exec_piped_out(
        &self,
        container: &str,
        args: &[String],
        env: &[(String, String)],
        sink: &mut (dyn Write + Send),
    ) -> Result<u64> {
        let mut child = self
            .command()
            .args(exec_args(container, args, env, false))
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| FleetError::Internal("exec stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FleetError::Internal("exec stderr not captured".to_string()))?;
        let stderr_task = tokio::spawn(read_all(stderr));

        let mut buf = vec![0u8; PIPE_CHUNK];
        let mut total = 0u64;
        loop {
            let n = stdout
                .read(&mut buf)
                .await
                .map_err(|e| FleetError::Internal(format!("failed to read exec output: {}", e)))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])
                .map_err(|e| FleetError::Internal(format!("failed to write exec output: {}", e)))?;
            total += n as u64;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FleetError::Internal(format!("failed to wait for exec: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(classify("exec", container, &stderr));
        }

        debug!(bytes = total, "Exec output streamed");
        Ok(total)
    }

    #[instrument(skip(self, env, source))]
    async fn exec_piped_in(
        &self,
        container: &str,
        args: &[String],
        env: &[(String, String)],
        source: &mut (dyn Read + Send),
    ) -> Result<u64> {
        let mut child = self
            .command()
            .args(exec_args(container, args, env, true))
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FleetError::Internal("exec stdin not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FleetError::Internal("exec stderr not captured".to_string()))?;
        let stderr_task = tokio::spawn(read_all(stderr));

        let mut buf = vec![0u8; PIPE_CHUNK];
        let mut total = 0u64;
        let fed: std::io::Result<()> = async {
            loop {
                let n = source.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                stdin.write_all(&buf[..n]).await?;
                total += n as u64;
            }
            stdin.shutdown().await
        }
        .await;
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|e| FleetError::Internal(format!("failed to wait for exec: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(classify("exec", container, &stderr));
        }
        fed.map_err(|e| FleetError::RuntimeFailed {
            operation: format!("exec {}", container),
            reason: format!("failed to stream input: {}", e),
        })?;

        debug!(bytes = total, "Exec input streamed");
        Ok(total)
    }

    #[instrument(skip(self))]
    async fn stream_logs(&self, container: &str, tail: usize) -> Result<LogStream> {
        // Surfaces NotFound before any line is produced.
        self.is_running(container).await?;

        let tail = tail.to_string();
        let mut child = self
            .command()
            .args(["logs", "--tail", tail.as_str(), container])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FleetError::Internal("logs stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FleetError::Internal("logs stderr not captured".to_string()))?;

        // Reap the child once both pipes are drained.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        let lines = LinesStream::new(BufReader::new(stdout).lines())
            .merge(LinesStream::new(BufReader::new(stderr).lines()))
            .map(|line| line.map_err(|e| FleetError::Internal(format!("failed to read logs: {}", e))));

        Ok(Box::pin(lines))
    }

    #[instrument(skip(self))]
    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let out = self
            .run(
                "images",
                "images",
                &["images", "--format", "{{.Repository}}\t{{.Tag}}\t{{.ID}}\t{{.Size}}"],
            )
            .await?;
        Ok(parse_image_lines(&out))
    }

    fn name(&self) -> &str {
        "docker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_daemon_unreachable() {
        let err = classify(
            "inspect",
            "acme-db",
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        );
        assert!(matches!(err, FleetError::RuntimeUnavailable { .. }));
    }

    #[test]
    fn test_classify_missing_container() {
        let err = classify("inspect", "acme-db", "Error: No such object: acme-db\n");
        assert!(matches!(err, FleetError::NotFound { name } if name == "acme-db"));
    }

    #[test]
    fn test_classify_other_failure_keeps_stderr() {
        let err = classify("compose up", "acme", "pull access denied for ghcr.io/acme/app");
        match err {
            FleetError::RuntimeFailed { operation, reason } => {
                assert_eq!(operation, "compose up acme");
                assert!(reason.contains("pull access denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_exec_args_keep_env_values_off_argv() {
        let argv = exec_args(
            "acme-db",
            &["pg_dump".to_string(), "-U".to_string(), "acme".to_string()],
            &[("PGPASSWORD".to_string(), "s3cret".to_string())],
            true,
        );
        assert_eq!(argv, vec!["exec", "-i", "-e", "PGPASSWORD", "acme-db", "pg_dump", "-U", "acme"]);
        assert!(!argv.iter().any(|a| a.contains("s3cret")));
    }

    #[test]
    fn test_parse_image_lines() {
        let images = parse_image_lines("traefik\tv3.1\tabc123\t180MB\nbroken-line\npostgres\t16\tdef456\t432MB\n");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].repository, "traefik");
        assert_eq!(images[1].size, "432MB");
    }

    #[tokio::test]
    async fn test_missing_binary_is_runtime_unavailable() {
        let adapter = DockerCli::new("/nonexistent/fleet-docker-binary");
        let err = adapter.is_running("acme-web").await.unwrap_err();
        assert!(matches!(err, FleetError::RuntimeUnavailable { .. }));
    }
}
