use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to spawn plugin: {0}")]
    Spawn(String),

    #[error("plugin failed to report a port within the launch deadline")]
    PortTimeout,

    #[error("plugin reported an invalid port: {0}")]
    PortParse(String),

    #[error("plugin exited before reporting a port")]
    ExitedEarly,

    #[error("failed to connect to plugin: {0}")]
    Connect(String),

    #[error("plugin health check failed: {0}")]
    Health(String),

    #[error("plugin is not serving (health status {0})")]
    Unhealthy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
