//! Authentication commands.

use super::{connect, describe, prompt};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_session::{ProfilePatch, RegistrationRequest, Role, SessionState};
use client_config_and_utils::{Config, Paths};

/// Options collected by `campus register`.
pub struct RegisterArgs {
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Login with email or phone and password.
pub async fn login(
    paths: &Paths,
    config: &Config,
    identifier: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let client = connect(paths, config).await?;

    if let Some(user) = client.state().user {
        output::print_success(&format!("Already logged in as {}", user.display_name()), format);
        return Ok(());
    }

    let identifier = match identifier {
        Some(identifier) => identifier,
        None => prompt("Email or phone: ")?,
    };
    if identifier.is_empty() {
        output::print_error("Email or phone is required", format);
        return Ok(());
    }

    // Prompt for password (hidden)
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    match client.login(&identifier, &password).await {
        Ok(state) => print_signed_in("Logged in", &state, format),
        Err(e) => output::print_error(&format!("Login failed: {}", describe(&e)), format),
    }

    client.teardown();
    Ok(())
}

/// Create an account and sign in with it.
pub async fn register(
    paths: &Paths,
    config: &Config,
    args: RegisterArgs,
    format: &OutputFormat,
) -> Result<()> {
    let client = connect(paths, config).await?;

    if client.state().is_authenticated() {
        output::print_error("Already logged in. Run 'campus logout' first", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password.is_empty() || password != confirm {
        output::print_error("Passwords are empty or do not match", format);
        return Ok(());
    }

    let mut request = RegistrationRequest::new(password, args.role);
    if let Some(email) = args.email {
        request = request.email(email);
    }
    if let Some(phone) = args.phone {
        request = request.phone(phone);
    }
    if let Some(first_name) = args.first_name {
        request = request.first_name(first_name);
    }
    if let Some(last_name) = args.last_name {
        request = request.last_name(last_name);
    }
    if !request.has_identifier() {
        output::print_error("Either --email or --phone is required", format);
        return Ok(());
    }

    match client.register(&request).await {
        Ok(state) => print_signed_in("Registered", &state, format),
        Err(e) => output::print_error(&format!("Registration failed: {}", describe(&e)), format),
    }

    client.teardown();
    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let client = connect(paths, config).await?;

    let was_logged_in = client.state().is_authenticated();
    client.logout().await;

    if was_logged_in {
        output::print_success("Logged out successfully", format);
    } else {
        output::print_success("Not logged in", format);
    }
    Ok(())
}

/// Show the restored session.
pub async fn status(paths: &Paths, config: &Config, format: &OutputFormat) -> Result<()> {
    let client = connect(paths, config).await?;
    let state = client.state();
    let guest_token = client.guest().session_token();

    match format {
        OutputFormat::Text => match &state.user {
            Some(user) => {
                println!("Auth:     logged in");
                println!("User:     {}", user.display_name());
                println!("User ID:  {}", user.id);
                println!("Role:     {:?}", user.role);
            }
            None => {
                println!("Auth:     not logged in");
                println!(
                    "Guest:    {}",
                    if guest_token.is_some() { "active session" } else { "none" }
                );
                if let Some(error) = &state.last_error {
                    println!("Last error: {}", error);
                }
            }
        },
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({
                "logged_in": state.is_authenticated(),
                "phase": state.phase,
                "user": state.user,
                "guest_session": guest_token.is_some(),
                "last_error": state.last_error,
            }));
        }
    }

    client.teardown();
    Ok(())
}

/// Update profile fields of the signed-in user.
pub async fn profile_update(
    paths: &Paths,
    config: &Config,
    patch: ProfilePatch,
    format: &OutputFormat,
) -> Result<()> {
    if patch.is_empty() {
        output::print_error("Nothing to update", format);
        return Ok(());
    }

    let client = connect(paths, config).await?;
    match client.update_profile(&patch).await {
        Ok(user) => match format {
            OutputFormat::Text => {
                output::print_success("Profile updated", format);
                output::print_row("Name", &user.display_name());
                if let Some(email) = &user.email {
                    output::print_row("Email", email);
                }
                if let Some(phone) = &user.phone {
                    output::print_row("Phone", phone);
                }
            }
            OutputFormat::Json => output::print_json(&user),
        },
        Err(e) => output::print_error(&describe(&e), format),
    }

    client.teardown();
    Ok(())
}

fn print_signed_in(verb: &str, state: &SessionState, format: &OutputFormat) {
    match (format, &state.user) {
        (OutputFormat::Json, _) => output::print_json(state),
        (OutputFormat::Text, Some(user)) => {
            output::print_success(&format!("{} as {}", verb, user.display_name()), format)
        }
        (OutputFormat::Text, None) => output::print_success(verb, format),
    }
}
