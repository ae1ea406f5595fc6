use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tonic::Request;
use tracing::{debug, info, warn};

use crate::capability::Capability;
use crate::config::PluginConfig;
use crate::error::PluginError;
use crate::launcher;
use crate::proto::ValidateTokenRequest;
use crate::registry::PluginRegistry;

/// Spawns, registers, and tears down plugin subprocesses.
///
/// The registry is shared (handed to the HTTP layer for fan-out); the child
/// process handles stay here so shutdown has something to signal.
pub struct PluginSupervisor {
    config: PluginConfig,
    registry: Arc<PluginRegistry>,
    children: Mutex<Vec<Child>>,
}

impl PluginSupervisor {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            registry: Arc::new(PluginRegistry::new()),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> Arc<PluginRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Walk the plugins directory and load every candidate. Per-plugin
    /// failures are logged and skipped; the count of loaded plugins is
    /// returned.
    pub async fn load_all(&self) -> Result<usize, PluginError> {
        let dir = self.config.plugins_dir.clone();
        if !dir.exists() {
            info!(dir = %dir.display(), "Plugins directory does not exist, creating it");
            std::fs::create_dir_all(&dir)?;
            return Ok(0);
        }

        let candidates = discover(&dir)?;
        let mut loaded = 0;

        for path in candidates {
            match self.load_plugin(&path).await {
                Ok(()) => loaded += 1,
                Err(e) => {
                    warn!(plugin = %path.display(), error = %e, "Failed to load plugin");
                }
            }
        }

        info!(loaded, "Plugin loading finished");
        Ok(loaded)
    }

    /// Run one binary through the launch protocol and register it.
    pub async fn load_plugin(&self, path: &Path) -> Result<(), PluginError> {
        let (handle, child) = launcher::launch(path, &self.config).await?;
        self.children.lock().await.push(child);
        self.registry.insert(handle);
        Ok(())
    }

    /// Fan-out token validation: ask each registered plugin that advertises
    /// `ValidateToken`, with a per-call deadline, stopping at the first that
    /// accepts. Individual plugin failures are logged and skipped.
    pub async fn validate_token(&self, token: &str) -> Option<String> {
        let call_timeout = self.config.call_timeout;
        let token = token.to_string();

        struct Accepted(String);

        let outcome = self
            .registry
            .for_each(|handle| {
                let token = token.clone();
                async move {
                    if !handle.capabilities.supports(Capability::ValidateToken) {
                        return Ok(());
                    }

                    let mut client = handle.client.clone();
                    let request = Request::new(ValidateTokenRequest { token });

                    match timeout(call_timeout, client.validate_token(request)).await {
                        Ok(Ok(response)) => {
                            let response = response.into_inner();
                            if response.ok {
                                return Err(Accepted(response.user_id));
                            }
                            if !response.error.is_empty() {
                                debug!(plugin = %handle.name, error = %response.error, "Token rejected");
                            }
                        }
                        Ok(Err(status)) => {
                            warn!(plugin = %handle.name, %status, "ValidateToken call failed");
                        }
                        Err(_) => {
                            warn!(plugin = %handle.name, "ValidateToken call timed out");
                        }
                    }
                    Ok(())
                }
            })
            .await;

        match outcome {
            Err(Accepted(user_id)) => Some(user_id),
            Ok(()) => None,
        }
    }

    /// Signal every child to terminate, wait out the grace period, then kill
    /// survivors. Clears the registry.
    pub async fn shutdown(&self) {
        let mut children = self.children.lock().await;
        if children.is_empty() {
            return;
        }

        info!(count = children.len(), "Shutting down plugins");

        for child in children.iter() {
            if let Some(pid) = child.id() {
                // SAFETY: pid belongs to a child we spawned and still own.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
        }

        for child in children.iter_mut() {
            match timeout(self.config.shutdown_grace, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("Plugin did not exit in time, killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }

        children.clear();
        self.registry.clear();
    }
}

/// Find plugin candidates: every file under `dir` with any execute bit set.
/// `node_modules` subtrees are pruned; non-executables are ignored silently.
/// The walk is lexical so registration order is deterministic.
fn discover(dir: &Path) -> Result<Vec<PathBuf>, PluginError> {
    let mut candidates = Vec::new();
    walk(dir, &mut candidates)?;
    Ok(candidates)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PluginError> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if entry.file_name() == "node_modules" {
                continue;
            }
            walk(&path, out)?;
        } else if file_type.is_file() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.permissions().mode() & 0o111 != 0 {
                out.push(path);
            }
        }
    }
    Ok(())
}
