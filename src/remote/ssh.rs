//! SSH transport for the SFTP adapter

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use russh::client::{self, KeyboardInteractiveAuthResponse};
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::RemoteError;
use super::params::ConnectionParams;
use super::DialOptions;

/// Prompt rounds answered before keyboard-interactive auth is abandoned.
const MAX_KBI_ROUNDS: usize = 4;

/// Client handler for russh callbacks
///
/// Host keys are accepted; the fingerprint is logged so it can be checked
/// after the fact.
pub struct SshHandler {
    host: String,
    port: u16,
}

impl SshHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl client::Handler for SshHandler {
    type Error = RemoteError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        info!(
            "Accepting host key for {}:{} (fingerprint: {})",
            self.host,
            self.port,
            fingerprint(server_public_key)
        );
        Ok(true)
    }
}

/// Compute SHA256 fingerprint of public key
pub fn fingerprint(key: &PublicKey) -> String {
    let key_bytes = key.public_key_bytes();
    let mut hasher = Sha256::new();
    hasher.update(&key_bytes);
    let hash = hasher.finalize();
    format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
}

/// Handshake and authenticate.
///
/// Password auth is tried first; servers that only offer
/// keyboard-interactive get the password as the answer to every prompt.
pub async fn connect(
    params: &ConnectionParams,
    options: &DialOptions,
) -> Result<client::Handle<SshHandler>, RemoteError> {
    let addr = params.address();
    info!("Connecting to SSH server at {}", addr);

    let ssh_config = client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(options.ssh_keepalive),
        keepalive_max: 3,
        ..Default::default()
    };
    let handler = SshHandler::new(params.host.clone(), params.port);

    let mut handle = tokio::time::timeout(
        options.ssh_timeout,
        client::connect(
            Arc::new(ssh_config),
            (params.host.as_str(), params.port),
            handler,
        ),
    )
    .await
    .map_err(|_| RemoteError::Timeout(format!("SSH handshake with {} timed out", addr)))?
    .map_err(|e| RemoteError::Connect(e.to_string()))?;

    debug!("SSH handshake completed");

    let authenticated = handle
        .authenticate_password(params.username.as_str(), params.password.as_str())
        .await
        .map_err(|e| RemoteError::Connect(format!("Authentication failed: {}", e)))?;

    if !authenticated.success() {
        debug!("Password auth rejected, trying keyboard-interactive");
        if !keyboard_interactive(&mut handle, &params.username, &params.password).await? {
            return Err(RemoteError::Connect(
                "Authentication rejected by server".to_string(),
            ));
        }
    }

    info!("SSH authentication successful");
    Ok(handle)
}

async fn keyboard_interactive(
    handle: &mut client::Handle<SshHandler>,
    username: &str,
    password: &str,
) -> Result<bool, RemoteError> {
    let mut response = handle
        .authenticate_keyboard_interactive_start(username, None::<String>)
        .await
        .map_err(|e| RemoteError::Connect(format!("KBI start failed: {}", e)))?;

    for _ in 0..MAX_KBI_ROUNDS {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                debug!("KBI InfoRequest with {} prompts", prompts.len());
                let answers = prompts.iter().map(|_| password.to_string()).collect();
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await
                    .map_err(|e| RemoteError::Connect(format!("KBI respond failed: {}", e)))?;
            }
        }
    }

    warn!("Keyboard-interactive auth gave up after {} rounds", MAX_KBI_ROUNDS);
    Ok(false)
}
