//! Container runtime adapter abstraction.
//!
//! Every interaction with the container runtime goes through the
//! [`RuntimeAdapter`] trait:
//! - [`DockerCli`]: production binding over the `docker` / `docker compose` CLI
//! - [`MemoryRuntime`]: in-memory fake for deterministic tests
//!
//! Every method may fail with `RuntimeUnavailable` (daemon unreachable) or
//! `NotFound` (stack or container absent). Callers treat both as a failed
//! operation, never as "stopped".

use crate::error::{FleetError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::io::{Read, Write};
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;

pub mod docker;
pub mod memory;

pub use docker::DockerCli;
pub use memory::{MemoryRuntime, RuntimeCall};

/// Finite sequence of log lines. Not restartable once consumed.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Health probe result of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContainerHealth {
    Healthy,
    Unhealthy,
    Starting,
    /// No health check configured, or no result yet.
    #[default]
    None,
}

impl ContainerHealth {
    /// Parse the runtime's health string. Empty means no probe.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "healthy" => Self::Healthy,
            "unhealthy" => Self::Unhealthy,
            "starting" => Self::Starting,
            _ => Self::None,
        }
    }
}

/// Image known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub repository: String,
    pub tag: String,
    pub id: String,
    pub size: String,
}

/// Run `fut` under an optional deadline; expiry yields `Cancelled`.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or(Err(FleetError::Cancelled)),
        None => fut.await,
    }
}

/// Narrow interface to the container runtime.
///
/// Implementations carry their own `#[instrument]` spans.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Whether the named container is currently running.
    async fn is_running(&self, container: &str) -> Result<bool>;

    /// Health probe state of the named container.
    async fn health_status(&self, container: &str) -> Result<ContainerHealth>;

    /// Bring a stack up in the background.
    async fn start_stack(&self, stack_path: &Path, project: &str) -> Result<()>;

    /// Take a stack down, optionally removing its volumes.
    async fn stop_stack(&self, stack_path: &Path, remove_volumes: bool, project: &str) -> Result<()>;

    /// Restart the containers of a running stack in place.
    async fn restart_stack(&self, stack_path: &Path, project: &str) -> Result<()>;

    /// Execute a command in a container and return its stdout.
    async fn exec(&self, container: &str, args: &[String]) -> Result<String>;

    /// Execute a command in a container, streaming stdout into `sink`.
    ///
    /// `env` is passed to the command without appearing in any argument list.
    /// Returns the number of bytes written.
    async fn exec_piped_out(
        &self,
        container: &str,
        args: &[String],
        env: &[(String, String)],
        sink: &mut (dyn Write + Send),
    ) -> Result<u64>;

    /// Execute a command in a container, streaming `source` into its stdin.
    ///
    /// Returns the number of bytes fed.
    async fn exec_piped_in(
        &self,
        container: &str,
        args: &[String],
        env: &[(String, String)],
        source: &mut (dyn Read + Send),
    ) -> Result<u64>;

    /// Last `tail` log lines of a container.
    async fn stream_logs(&self, container: &str, tail: usize) -> Result<LogStream>;

    /// Images available to the runtime.
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;

    /// Adapter name (for logging).
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_health_parse() {
        assert_eq!(ContainerHealth::parse("healthy\n"), ContainerHealth::Healthy);
        assert_eq!(ContainerHealth::parse("Unhealthy"), ContainerHealth::Unhealthy);
        assert_eq!(ContainerHealth::parse("starting"), ContainerHealth::Starting);
        assert_eq!(ContainerHealth::parse(""), ContainerHealth::None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_expiry_is_cancelled() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, FleetError>(1)
        };
        let result = with_deadline(Some(Duration::from_secs(1)), slow).await;
        assert!(matches!(result, Err(FleetError::Cancelled)));

        let fast = with_deadline(None, async { Ok::<_, FleetError>(2) }).await;
        assert_eq!(fast.unwrap(), 2);
    }
}
