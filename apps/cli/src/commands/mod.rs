//! CLI command implementations.

mod auth;
mod guest;

pub use auth::{login, logout, profile_update, register, status, RegisterArgs};
pub use guest::{escalate, guest_fingerprint, guest_status, guest_track};

use anyhow::Result;
use auth_session::{AuthError, CampusClient};
use client_config_and_utils::{Config, Paths};
use std::io::{self, Write};

/// Build a client over the persisted credential store and resolve the
/// stored session.
pub async fn connect(paths: &Paths, config: &Config) -> Result<CampusClient> {
    paths.ensure_dirs()?;
    let store = credential_storage::create_credential_store(paths)?;
    let client = CampusClient::new(config, store)?;
    client.initialize().await;
    Ok(client)
}

/// Read one trimmed line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// User-facing text for a failed operation, with a hint when retrying may help.
fn describe(error: &AuthError) -> String {
    let message = error.user_message();
    match error {
        AuthError::Network(_) => message,
        _ if error.is_transient() => format!("{} (server problem, try again later)", message),
        _ => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_session::TransportError;

    fn api(status: u16) -> AuthError {
        AuthError::Api {
            status,
            code: None,
            message: "Service unavailable".to_string(),
        }
    }

    #[test]
    fn test_describe_hints_on_server_errors() {
        assert_eq!(
            describe(&api(503)),
            "Service unavailable (server problem, try again later)"
        );
        assert_eq!(describe(&api(404)), "Service unavailable");
    }

    #[test]
    fn test_describe_keeps_network_and_credential_messages() {
        let network = describe(&AuthError::Network(TransportError::Timeout));
        assert!(network.contains("try again"));
        assert!(!network.contains("server problem"));
        assert_eq!(
            describe(&AuthError::Authentication("Invalid credentials".into())),
            "Invalid credentials"
        );
    }
}
