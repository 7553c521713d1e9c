//! `p4` command-line client.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use streamwatch_types::models::ProbeConfig;
use streamwatch_types::{EngineError, Measurement, Server};

use super::fstat::{normalize_stream_path, parse_fstat_sizes};
use super::DepotClient;

/// Runs the Perforce CLI with per-server `P4PORT`/`P4USER` and a shared
/// tickets file. Child processes are killed when their future is dropped, so
/// a deadline applied by the caller never leaves a `p4` running.
#[derive(Debug, Clone)]
pub struct P4CliClient {
    binary: String,
    tickets_file: PathBuf,
    client_root: PathBuf,
}

struct P4Output {
    success: bool,
    stdout: String,
    stderr: String,
}

impl P4CliClient {
    pub fn new(
        binary: impl Into<String>,
        tickets_file: impl Into<PathBuf>,
        client_root: impl Into<PathBuf>,
    ) -> Self {
        Self { binary: binary.into(), tickets_file: tickets_file.into(), client_root: client_root.into() }
    }

    /// Build from config, defaulting tickets and client root into `data_dir`.
    pub fn from_config(probe: &ProbeConfig, data_dir: &Path) -> Self {
        let tickets_file =
            probe.tickets_file.clone().unwrap_or_else(|| data_dir.join(".p4tickets"));
        let client_root = probe.client_root.clone().unwrap_or_else(|| data_dir.join("clients"));
        Self::new(probe.p4_binary.clone(), tickets_file, client_root)
    }

    pub fn tickets_file(&self) -> &Path {
        &self.tickets_file
    }

    /// Whether the tickets file exists; warns when it does not, since every
    /// depot call will then fail authentication.
    pub fn has_tickets(&self) -> bool {
        let exists = self.tickets_file.exists();
        if !exists {
            tracing::warn!(
                "[P4] Tickets file {} not found; run `streamwatch login` first",
                self.tickets_file.display()
            );
        }
        exists
    }

    async fn run(
        &self,
        server: &Server,
        args: &[&str],
        input: Option<&str>,
    ) -> Result<P4Output, EngineError> {
        tracing::debug!("[P4] {} {}", server.p4port, args.join(" "));

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .env("P4PORT", &server.p4port)
            .env("P4USER", &server.p4user)
            .env("P4TICKETS", &self.tickets_file)
            .env_remove("P4CLIENT")
            .env_remove("P4CONFIG")
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| EngineError::UpstreamUnavailable {
            server: server.p4port.clone(),
            message: format!("failed to start {}: {}", self.binary, e),
        })?;

        if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(data.as_bytes()).await.map_err(|e| {
                EngineError::UpstreamUnavailable {
                    server: server.p4port.clone(),
                    message: format!("failed to write to p4 stdin: {}", e),
                }
            })?;
        }

        let output = child.wait_with_output().await.map_err(|e| {
            EngineError::UpstreamUnavailable {
                server: server.p4port.clone(),
                message: format!("p4 did not complete: {}", e),
            }
        })?;

        let result = P4Output {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success {
            tracing::warn!(
                "[P4] {} {} exited with {}: {}",
                server.p4port,
                args.first().copied().unwrap_or_default(),
                output.status,
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    async fn delete_client(&self, server: &Server, client: &str) {
        match self.run(server, &["client", "-df", client], None).await {
            Ok(out) if out.success || out.stderr.contains("doesn't exist") => {
                tracing::debug!("[P4] Temporary client {} deleted", client);
            },
            Ok(out) => {
                tracing::warn!("[P4] Failed to delete client {}: {}", client, out.stderr.trim());
            },
            Err(e) => tracing::warn!("[P4] Failed to delete client {}: {}", client, e),
        }
    }

    fn client_spec(&self, client: &str, owner: &str, stream: &str) -> String {
        let root = self.client_root.join(client);
        format!(
            "Client: {client}\n\nOwner: {owner}\n\nRoot: {root}\n\n\
             Options: noallwrite noclobber compress unlocked nomodtime rmdir\n\n\
             SubmitOptions: submitunchanged\n\nLineEnd: local\n\nStream: {stream}\n\n\
             View:\n\t{stream}/... //{client}/...\n",
            root = root.display(),
        )
    }
}

/// Deletes a temporary client even when the measuring future is dropped by
/// a deadline.
struct ClientCleanup {
    client: Option<(P4CliClient, Server, String)>,
}

impl ClientCleanup {
    async fn finish(mut self) {
        if let Some((p4, server, name)) = self.client.take() {
            p4.delete_client(&server, &name).await;
        }
    }
}

impl Drop for ClientCleanup {
    fn drop(&mut self) {
        let Some((p4, server, name)) = self.client.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { p4.delete_client(&server, &name).await });
            },
            Err(_) => tracing::warn!("[P4] No runtime to delete abandoned client {}", name),
        }
    }
}

/// Map a failed command's stderr onto the engine taxonomy.
fn classify_failure(server: &Server, stream: Option<&str>, stderr: &str) -> EngineError {
    let message = stderr.trim().to_string();
    let lower = message.to_lowercase();

    if lower.contains("p4passwd")
        || lower.contains("password invalid")
        || lower.contains("session has expired")
        || lower.contains("please login")
        || lower.contains("ticket")
    {
        return EngineError::AuthError { server: server.p4port.clone(), message };
    }

    if let Some(stream) = stream {
        if lower.contains("doesn't exist")
            || lower.contains("no such stream")
            || lower.contains("unknown stream")
        {
            return EngineError::stream_not_found(stream);
        }
    }

    EngineError::UpstreamUnavailable { server: server.p4port.clone(), message }
}

fn is_empty_result(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such file") || lower.contains("not in client view")
}

#[async_trait]
impl DepotClient for P4CliClient {
    async fn list_streams(&self, server: &Server) -> Result<Vec<String>, EngineError> {
        let filter = format!("Name={}", server.stream_mask);
        let out =
            self.run(server, &["-ztag", "-F", "%Stream%", "streams", "-F", &filter], None).await?;

        if !out.success {
            if out.stderr.to_lowercase().contains("no such stream") {
                return Ok(Vec::new());
            }
            return Err(classify_failure(server, None, &out.stderr));
        }

        let streams: Vec<String> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        tracing::debug!(
            "[P4] {} streams on {} (mask {})",
            streams.len(),
            server.p4port,
            server.stream_mask
        );
        Ok(streams)
    }

    async fn measure_stream(
        &self,
        server: &Server,
        stream: &str,
    ) -> Result<Measurement, EngineError> {
        let stream_path = normalize_stream_path(stream);
        let user: String =
            server.p4user.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
        let client = format!("tmp_calc_{}_{}", user, uuid::Uuid::new_v4().simple());

        let spec = self.client_spec(&client, &server.p4user, &stream_path);
        let created = self.run(server, &["client", "-i"], Some(&spec)).await?;
        if !created.success {
            return Err(classify_failure(server, Some(&stream_path), &created.stderr));
        }

        let cleanup =
            ClientCleanup { client: Some((self.clone(), server.clone(), client.clone())) };

        let depot_path = format!("//{}/...", client);
        let result = self
            .run(
                server,
                &[
                    "-c",
                    &client,
                    "-F",
                    "%headAction% %fileSize%",
                    "fstat",
                    "-Ol",
                    "-T",
                    "headAction,fileSize",
                    &depot_path,
                ],
                None,
            )
            .await;

        cleanup.finish().await;

        let out = result?;
        if !out.success && !is_empty_result(&out.stderr) {
            return Err(classify_failure(server, Some(&stream_path), &out.stderr));
        }

        let measurement = parse_fstat_sizes(&out.stdout);
        if measurement.file_count == 0 {
            tracing::info!("[P4] Stream {} has no files", stream_path);
        }
        Ok(measurement)
    }

    async fn check_auth(&self, server: &Server) -> Result<bool, EngineError> {
        if !self.has_tickets() {
            return Ok(false);
        }
        let out = self.run(server, &["login", "-s"], None).await?;
        if out.success {
            return Ok(out.stdout.contains("ticket expires"));
        }
        match classify_failure(server, None, &out.stderr) {
            EngineError::AuthError { .. } => Ok(false),
            other => Err(other),
        }
    }

    async fn login(&self, server: &Server, password: &str) -> Result<(), EngineError> {
        if let Some(parent) = self.tickets_file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| EngineError::Validation {
                field: "probe.tickets_file".to_string(),
                message: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }

        let input = format!("{password}\n");
        let out = self.run(server, &["login"], Some(&input)).await?;
        if !out.success {
            return Err(match classify_failure(server, None, &out.stderr) {
                EngineError::UpstreamUnavailable { message, .. }
                    if message.to_lowercase().contains("password") =>
                {
                    EngineError::AuthError { server: server.p4port.clone(), message }
                },
                other => other,
            });
        }
        tracing::info!("[P4] Logged in as {} on {}", server.p4user, server.p4port);

        let info = self.run(server, &["info"], None).await?;
        if !info.success {
            return Err(classify_failure(server, None, &info.stderr));
        }
        Ok(())
    }
}
