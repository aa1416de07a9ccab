//! Guest usage commands.

use super::{connect, describe};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_session::{EscalationDecision, EscalationTrigger};
use client_config_and_utils::{Config, Paths};

/// Report a content view for the guest session.
pub async fn guest_track(
    paths: &Paths,
    config: &Config,
    content_type: &str,
    content_id: &str,
    format: &OutputFormat,
) -> Result<()> {
    let client = connect(paths, config).await?;

    match client.track_access(content_type, content_id).await {
        Ok(access) => match format {
            OutputFormat::Text => {
                output::print_row("Views", &access.outcome.content_accessed_count.to_string());
                output::print_row("Login needed", &access.outcome.requires_login.to_string());
                print_decision(&access.decision);
            }
            OutputFormat::Json => output::print_json(&access),
        },
        Err(e) => output::print_error(&describe(&e), format),
    }

    client.teardown();
    Ok(())
}

/// Server view of the stored guest session.
pub async fn guest_status(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let client = connect(paths, config).await?;

    match client.guest().status().await {
        Ok(status) => match format {
            OutputFormat::Text if !status.exists => println!("No guest session"),
            OutputFormat::Text => {
                output::print_row("Views", &status.content_accessed_count.to_string());
                output::print_row("Login needed", &status.requires_login.to_string());
            }
            OutputFormat::Json => output::print_json(&status),
        },
        Err(e) => output::print_error(&describe(&e), format),
    }

    client.teardown();
    Ok(())
}

/// Print the device fingerprint used for guest sessions.
pub async fn guest_fingerprint(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let client = connect(paths, config).await?;
    let fingerprint = client.guest().fingerprint();

    match format {
        OutputFormat::Text => println!("{}", fingerprint),
        OutputFormat::Json => output::print_json(&serde_json::json!({ "fingerprint": fingerprint })),
    }

    client.teardown();
    Ok(())
}

/// Evaluate whether a sign-in prompt would be shown for `trigger`.
pub async fn escalate(
    paths: &Paths,
    config: &Config,
    trigger: &str,
    format: &OutputFormat,
) -> Result<()> {
    let trigger: EscalationTrigger = match trigger.parse() {
        Ok(trigger) => trigger,
        Err(message) => {
            output::print_error(&message, format);
            return Ok(());
        }
    };

    let client = connect(paths, config).await?;
    match client.request_escalation(trigger).await {
        Ok(decision) => match format {
            OutputFormat::Text => print_decision(&decision),
            OutputFormat::Json => output::print_json(&decision),
        },
        Err(e) => output::print_error(&describe(&e), format),
    }

    client.teardown();
    Ok(())
}

fn print_decision(decision: &EscalationDecision) {
    let text = match decision {
        EscalationDecision::NotRequired => "no prompt".to_string(),
        EscalationDecision::Suppressed => "prompt dismissed earlier".to_string(),
        EscalationDecision::Opened(prompt) | EscalationDecision::AlreadyOpen(prompt) => format!(
            "sign-in prompt ({:?}{})",
            prompt.trigger,
            if prompt.dismissible { "" } else { ", required" }
        ),
    };
    output::print_row("Prompt", &text);
}
