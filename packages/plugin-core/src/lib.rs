pub mod capability;
pub mod config;
pub mod error;
pub mod launcher;
pub mod registry;
pub mod supervisor;

/// Generated gRPC contract (`pixie.plugin.v1`).
pub mod proto {
    tonic::include_proto!("pixie.plugin.v1");
}

pub use capability::{Capability, CapabilitySet};
pub use config::PluginConfig;
pub use error::PluginError;
pub use registry::{PluginHandle, PluginInfo, PluginRegistry};
pub use supervisor::PluginSupervisor;
