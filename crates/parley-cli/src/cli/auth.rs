//! Account commands: sign up, sign in, sign out.
//!
//! Email is taken from `--email` or prompted for; passwords are always read
//! from a hidden prompt.

use anyhow::Result;
use console::style;
use dialoguer::{Input, Password};

use parley_core::identity::provider::IdentityProvider;
use parley_types::identity::Identity;

use crate::state::AppState;

/// Create an account and sign in.
pub async fn sign_up(state: &AppState, email: Option<String>, json: bool) -> Result<()> {
    let email = prompt_email(email)?;
    let password = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let identity = state.identity_provider.sign_up(&email, &password).await?;
    print_signed_in(&identity, "Account created. Signed in as", json)
}

/// Sign in to an existing account.
pub async fn sign_in(state: &AppState, email: Option<String>, json: bool) -> Result<()> {
    let identity = login(state, email).await?;
    print_signed_in(&identity, "Signed in as", json)
}

/// Sign out of the current account.
pub async fn sign_out(state: &AppState, json: bool) -> Result<()> {
    state.identity_provider.sign_out().await?;

    if json {
        println!("{}", serde_json::json!({"signed_in": false}));
    } else {
        println!("  {} Signed out.", style("*").cyan().bold());
    }
    Ok(())
}

/// Prompt for credentials and sign in, returning the identity.
pub async fn login(state: &AppState, email: Option<String>) -> Result<Identity> {
    let email = prompt_email(email)?;
    let password = Password::new().with_prompt("Password").interact()?;
    Ok(state.identity_provider.sign_in(&email, &password).await?)
}

fn prompt_email(email: Option<String>) -> Result<String> {
    match email {
        Some(email) => Ok(email),
        None => Ok(Input::<String>::new().with_prompt("Email").interact_text()?),
    }
}

fn print_signed_in(identity: &Identity, message: &str, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "signed_in": true,
                "user_id": identity.id.to_string(),
                "email": identity.email,
            })
        );
    } else {
        println!(
            "  {} {message} {}",
            style("*").green().bold(),
            style(&identity.email).cyan()
        );
    }
    Ok(())
}
