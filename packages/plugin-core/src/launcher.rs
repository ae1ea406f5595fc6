use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tracing::{debug, info, warn};

use crate::capability::{Capability, CapabilitySet};
use crate::config::PluginConfig;
use crate::error::PluginError;
use crate::proto::photo_plugin_client::PhotoPluginClient;
use crate::proto::{Photo, SearchRequest, ValidateTokenRequest};
use crate::registry::PluginHandle;

static PORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PORT=(\d+)").unwrap());

/// Launch one plugin binary and take it through the full handshake:
/// spawn with `--port=0`, scan stdout for `PORT=<n>`, dial plaintext gRPC,
/// require a SERVING health check, then probe capabilities.
///
/// On any failure the child is killed before the error is returned.
pub async fn launch(
    path: &Path,
    config: &PluginConfig,
) -> Result<(PluginHandle, Child), PluginError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    info!(plugin = %name, path = %path.display(), "Loading plugin");

    let mut child = Command::new(path)
        .arg("--port=0")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PluginError::Spawn(e.to_string()))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PluginError::Spawn("no stdout pipe".into()))?;

    if let Some(stderr) = child.stderr.take() {
        let log_name = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(plugin = %log_name, "{line}");
            }
        });
    }

    let port = match timeout(config.launch_timeout, scan_for_port(stdout, &name)).await {
        Ok(Ok((port, rest))) => {
            drain_stdout(rest, name.clone());
            port
        }
        Ok(Err(e)) => {
            let _ = child.start_kill();
            return Err(e);
        }
        Err(_) => {
            let _ = child.start_kill();
            return Err(PluginError::PortTimeout);
        }
    };

    let endpoint = format!("localhost:{port}");
    debug!(plugin = %name, %endpoint, "Plugin reported its port");

    let channel = match connect(port, config.health_timeout).await {
        Ok(channel) => channel,
        Err(e) => {
            let _ = child.start_kill();
            return Err(e);
        }
    };

    if let Err(e) = check_health(channel.clone(), config.health_timeout).await {
        let _ = child.start_kill();
        return Err(e);
    }

    let client = PhotoPluginClient::new(channel);
    let capabilities = probe_capabilities(&client, config.call_timeout).await;

    info!(plugin = %name, %endpoint, %capabilities, "Plugin loaded");

    Ok((
        PluginHandle {
            name,
            path: path.to_path_buf(),
            endpoint,
            capabilities,
            client,
        },
        child,
    ))
}

/// Read stdout lines until one matches `PORT=(\d+)`. Returns the port plus
/// the reader so the remaining output can keep being drained.
async fn scan_for_port(
    stdout: ChildStdout,
    name: &str,
) -> Result<(u16, BufReader<ChildStdout>), PluginError> {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(PluginError::Io)?;
        if n == 0 {
            return Err(PluginError::ExitedEarly);
        }

        let trimmed = line.trim_end();
        debug!(plugin = %name, "plugin output: {trimmed}");

        if let Some(captures) = PORT_RE.captures(trimmed) {
            let port = captures[1]
                .parse::<u16>()
                .map_err(|_| PluginError::PortParse(captures[1].to_string()))?;
            return Ok((port, reader));
        }
    }
}

/// Keep the stdout pipe from filling up after the handshake.
fn drain_stdout(reader: BufReader<ChildStdout>, name: String) {
    tokio::spawn(async move {
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(plugin = %name, "{line}");
        }
    });
}

async fn connect(port: u16, deadline: Duration) -> Result<Channel, PluginError> {
    let endpoint = Endpoint::from_shared(format!("http://localhost:{port}"))
        .map_err(|e| PluginError::Connect(e.to_string()))?
        .connect_timeout(deadline);

    timeout(deadline, endpoint.connect())
        .await
        .map_err(|_| PluginError::Connect("connect timed out".into()))?
        .map_err(|e| PluginError::Connect(e.to_string()))
}

async fn check_health(channel: Channel, deadline: Duration) -> Result<(), PluginError> {
    let mut health = HealthClient::new(channel);
    let request = HealthCheckRequest {
        service: String::new(),
    };

    let response = timeout(deadline, health.check(Request::new(request)))
        .await
        .map_err(|_| PluginError::Health("health check timed out".into()))?
        .map_err(|e| PluginError::Health(e.to_string()))?
        .into_inner();

    if response.status() != ServingStatus::Serving {
        return Err(PluginError::Unhealthy(format!("{:?}", response.status())));
    }
    Ok(())
}

/// Probe each optional RPC with a zero-value request. `UNIMPLEMENTED` marks
/// the capability absent; anything else (including a deadline: implemented
/// but slow) marks it present. Probe requests are no-ops for conforming
/// plugins.
async fn probe_capabilities(
    client: &PhotoPluginClient<Channel>,
    per_call: Duration,
) -> CapabilitySet {
    let mut caps = CapabilitySet::empty();

    let mut c = client.clone();
    if implemented(timeout(per_call, c.process_photo(Request::new(Photo::default()))).await) {
        caps.insert(Capability::ProcessPhoto);
    }

    let mut c = client.clone();
    if implemented(timeout(per_call, c.search(Request::new(SearchRequest::default()))).await) {
        caps.insert(Capability::Search);
    }

    let mut c = client.clone();
    if implemented(
        timeout(
            per_call,
            c.validate_token(Request::new(ValidateTokenRequest::default())),
        )
        .await,
    ) {
        caps.insert(Capability::ValidateToken);
    }

    caps
}

fn implemented<T>(
    outcome: Result<Result<T, tonic::Status>, tokio::time::error::Elapsed>,
) -> bool {
    !matches!(outcome, Ok(Err(ref status)) if status.code() == Code::Unimplemented)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_regex_accepts_the_handshake_line() {
        let captures = PORT_RE.captures("PORT=43211").unwrap();
        assert_eq!(&captures[1], "43211");
    }

    #[test]
    fn port_regex_matches_within_a_line() {
        // Plugins may prefix their own log formatting.
        let captures = PORT_RE.captures("2026-01-01 listening PORT=8080 ok").unwrap();
        assert_eq!(&captures[1], "8080");
    }

    #[test]
    fn port_regex_ignores_unrelated_lines() {
        assert!(PORT_RE.captures("starting up...").is_none());
        assert!(PORT_RE.captures("PORT=").is_none());
    }

    #[test]
    fn unimplemented_status_clears_capability() {
        let unimpl: Result<Result<(), tonic::Status>, tokio::time::error::Elapsed> =
            Ok(Err(tonic::Status::unimplemented("no")));
        assert!(!implemented(unimpl));

        let ok: Result<Result<(), tonic::Status>, tokio::time::error::Elapsed> = Ok(Ok(()));
        assert!(implemented(ok));

        let failed: Result<Result<(), tonic::Status>, tokio::time::error::Elapsed> =
            Ok(Err(tonic::Status::internal("boom")));
        assert!(implemented(failed));
    }
}
