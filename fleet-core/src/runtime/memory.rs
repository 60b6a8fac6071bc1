//! In-memory runtime adapter for tests.
//!
//! Containers are registered up front with a running flag and a health state.
//! Starting a stack marks the registered `{project}-web` and `{project}-db`
//! containers as running, stopping it marks them stopped. Failures, canned exec output and
//! logs are scripted per stack or container, and every call is recorded.

use super::{ContainerHealth, ImageSummary, LogStream, RuntimeAdapter};
use crate::error::{FleetError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Call recorded by [`MemoryRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    StartStack { project: String },
    StopStack { project: String, remove_volumes: bool },
    RestartStack { project: String },
    Exec { container: String, args: Vec<String> },
}

#[derive(Default)]
struct MemoryState {
    containers: HashMap<String, (bool, ContainerHealth)>,
    failing_stacks: HashMap<String, String>,
    failing_exec: HashMap<String, String>,
    unavailable: bool,
    delay: Option<Duration>,
    exec_output: HashMap<String, Vec<u8>>,
    exec_input: HashMap<String, Vec<u8>>,
    logs: HashMap<String, Vec<String>>,
    images: Vec<ImageSummary>,
    calls: Vec<RuntimeCall>,
}

/// Scriptable fake runtime.
#[derive(Default)]
pub struct MemoryRuntime {
    state: Mutex<MemoryState>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register or update a container.
    pub fn set_container(&self, name: &str, running: bool, health: ContainerHealth) {
        self.state().containers.insert(name.to_string(), (running, health));
    }

    /// Make every stack operation on `project` fail with `reason`.
    pub fn fail_stack(&self, project: &str, reason: &str) {
        self.state().failing_stacks.insert(project.to_string(), reason.to_string());
    }

    /// Make every exec in `container` fail with `reason`.
    pub fn fail_exec(&self, container: &str, reason: &str) {
        self.state().failing_exec.insert(container.to_string(), reason.to_string());
    }

    /// Simulate an unreachable daemon.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Delay every stack operation and every exec.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Bytes produced on stdout by piped execs in `container`.
    pub fn set_exec_output(&self, container: &str, output: impl Into<Vec<u8>>) {
        self.state().exec_output.insert(container.to_string(), output.into());
    }

    /// Bytes received on stdin by piped execs in `container`.
    pub fn exec_input(&self, container: &str) -> Option<Vec<u8>> {
        self.state().exec_input.get(container).cloned()
    }

    pub fn set_logs(&self, container: &str, lines: &[&str]) {
        self.state().logs.insert(container.to_string(), lines.iter().map(|l| l.to_string()).collect());
    }

    pub fn set_images(&self, images: Vec<ImageSummary>) {
        self.state().images = images;
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state().calls.clone()
    }

    /// Whether the container is registered and running.
    pub fn container_running(&self, name: &str) -> bool {
        self.state().containers.get(name).map(|(running, _)| *running).unwrap_or(false)
    }

    fn check_available(&self) -> Result<()> {
        if self.state().unavailable {
            return Err(FleetError::RuntimeUnavailable { reason: "daemon unreachable".to_string() });
        }
        Ok(())
    }

    fn container(&self, name: &str) -> Result<(bool, ContainerHealth)> {
        self.check_available()?;
        self.state()
            .containers
            .get(name)
            .copied()
            .ok_or_else(|| FleetError::NotFound { name: name.to_string() })
    }

    async fn pause(&self) {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn stack_op(&self, call: RuntimeCall, project: &str, running: Option<bool>) -> Result<()> {
        self.check_available()?;
        self.pause().await;

        let mut state = self.state();
        state.calls.push(call);
        if let Some(reason) = state.failing_stacks.get(project) {
            return Err(FleetError::RuntimeFailed {
                operation: format!("stack {}", project),
                reason: reason.clone(),
            });
        }
        if let Some(running) = running {
            for name in [format!("{}-web", project), format!("{}-db", project)] {
                if let Some((is_running, _)) = state.containers.get_mut(&name) {
                    *is_running = running;
                }
            }
        }
        Ok(())
    }

    async fn exec_check(&self, container: &str, args: &[String]) -> Result<()> {
        let (running, _) = self.container(container)?;
        self.pause().await;
        let mut state = self.state();
        state.calls.push(RuntimeCall::Exec { container: container.to_string(), args: args.to_vec() });
        if !running {
            return Err(FleetError::RuntimeFailed {
                operation: format!("exec {}", container),
                reason: "container is not running".to_string(),
            });
        }
        if let Some(reason) = state.failing_exec.get(container) {
            return Err(FleetError::RuntimeFailed {
                operation: format!("exec {}", container),
                reason: reason.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RuntimeAdapter for MemoryRuntime {
    async fn is_running(&self, container: &str) -> Result<bool> {
        Ok(self.container(container)?.0)
    }

    async fn health_status(&self, container: &str) -> Result<ContainerHealth> {
        Ok(self.container(container)?.1)
    }

    async fn start_stack(&self, _stack_path: &Path, project: &str) -> Result<()> {
        self.stack_op(RuntimeCall::StartStack { project: project.to_string() }, project, Some(true))
            .await
    }

    async fn stop_stack(&self, _stack_path: &Path, remove_volumes: bool, project: &str) -> Result<()> {
        self.stack_op(
            RuntimeCall::StopStack { project: project.to_string(), remove_volumes },
            project,
            Some(false),
        )
        .await
    }

    async fn restart_stack(&self, _stack_path: &Path, project: &str) -> Result<()> {
        self.stack_op(RuntimeCall::RestartStack { project: project.to_string() }, project, Some(true))
            .await
    }

    async fn exec(&self, container: &str, args: &[String]) -> Result<String> {
        self.exec_check(container, args).await?;
        let output = self.state().exec_output.get(container).cloned().unwrap_or_default();
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn exec_piped_out(
        &self,
        container: &str,
        args: &[String],
        _env: &[(String, String)],
        sink: &mut (dyn Write + Send),
    ) -> Result<u64> {
        self.exec_check(container, args).await?;
        let output = self.state().exec_output.get(container).cloned().unwrap_or_default();
        sink.write_all(&output).map_err(FleetError::internal)?;
        Ok(output.len() as u64)
    }

    async fn exec_piped_in(
        &self,
        container: &str,
        args: &[String],
        _env: &[(String, String)],
        source: &mut (dyn Read + Send),
    ) -> Result<u64> {
        self.exec_check(container, args).await?;
        let mut input = Vec::new();
        source.read_to_end(&mut input).map_err(|e| FleetError::RuntimeFailed {
            operation: format!("exec {}", container),
            reason: format!("failed to stream input: {}", e),
        })?;
        let len = input.len() as u64;
        self.state().exec_input.insert(container.to_string(), input);
        Ok(len)
    }

    async fn stream_logs(&self, container: &str, tail: usize) -> Result<LogStream> {
        self.container(container)?;
        let lines = self.state().logs.get(container).cloned().unwrap_or_default();
        let skip = lines.len().saturating_sub(tail);
        let lines: Vec<Result<String>> = lines.into_iter().skip(skip).map(Ok).collect();
        Ok(Box::pin(tokio_stream::iter(lines)))
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.check_available()?;
        Ok(self.state().images.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
