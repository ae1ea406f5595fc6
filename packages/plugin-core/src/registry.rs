use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use tonic::transport::Channel;

use crate::capability::CapabilitySet;
use crate::proto::photo_plugin_client::PhotoPluginClient;

/// A successfully launched, health-checked plugin.
///
/// Cloning is cheap: the client shares one HTTP/2 channel.
#[derive(Debug, Clone)]
pub struct PluginHandle {
    /// File name of the plugin binary, used for logs and listings.
    pub name: String,
    /// Full path the binary was launched from.
    pub path: PathBuf,
    /// Endpoint the supervisor dialled, e.g. `localhost:43211`.
    pub endpoint: String,
    /// Methods the plugin advertised at registration.
    pub capabilities: CapabilitySet,
    pub client: PhotoPluginClient<Channel>,
}

/// Public information about a plugin, suitable for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub endpoint: String,
    pub capabilities: Vec<&'static str>,
}

impl From<&PluginHandle> for PluginInfo {
    fn from(handle: &PluginHandle) -> Self {
        Self {
            name: handle.name.clone(),
            endpoint: handle.endpoint.clone(),
            capabilities: handle.capabilities.names(),
        }
    }
}

/// Ordered, concurrency-safe collection of loaded plugins.
///
/// Mutated only during startup and shutdown; reads dominate. Iteration works
/// on a snapshot so the lock is never held across a plugin call.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Mutex<Vec<PluginHandle>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: PluginHandle) {
        self.plugins.lock().unwrap().push(handle);
    }

    pub fn len(&self) -> usize {
        self.plugins.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.plugins.lock().unwrap().clear();
    }

    pub fn infos(&self) -> Vec<PluginInfo> {
        self.plugins.lock().unwrap().iter().map(Into::into).collect()
    }

    /// Clone the current registration order.
    pub fn snapshot(&self) -> Vec<PluginHandle> {
        self.plugins.lock().unwrap().clone()
    }

    /// Apply `f` to every plugin in registration order, stopping at the first
    /// error. The basis for fan-out authorisation and processing pipelines.
    pub async fn for_each<F, Fut, E>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(PluginHandle) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        for handle in self.snapshot() {
            f(handle).await?;
        }
        Ok(())
    }
}
