//! API key commands: set, status, delete.
//!
//! The key lives in the OS keychain. An environment variable, when set,
//! still takes precedence over it.

use anyhow::Result;
use console::style;
use dialoguer::Password;
use secrecy::ExposeSecret;

use parley_infra::credentials::{delete_api_key, mask_api_key, store_api_key};

use crate::state::AppState;

/// Validate and save an API key, prompting with hidden input when `key` is `None`.
///
/// ```bash
/// # Secure prompt (recommended)
/// parley key set
///
/// # Script/automation mode
/// parley key set --key sk-...
/// ```
pub fn set_key(state: &AppState, key: Option<String>, json: bool) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => Password::new()
            .with_prompt("API key")
            .allow_empty_password(true)
            .interact()?,
    };

    store_api_key(&state.keychain, &key)?;

    if json {
        println!(
            "{}",
            serde_json::json!({"saved": true, "masked": mask_api_key(key.trim())})
        );
    } else {
        println!(
            "  {} Settings saved successfully ({})",
            style("*").green().bold(),
            mask_api_key(key.trim())
        );
        if std::env::var_os(&state.config.completion.api_key_env).is_some() {
            println!(
                "  {} {} is set and takes precedence over the stored key.",
                style("i").blue().bold(),
                style(&state.config.completion.api_key_env).yellow()
            );
        }
    }
    Ok(())
}

/// Report which source supplies the API key, masked.
pub fn key_status(state: &AppState, json: bool) -> Result<()> {
    let resolved = state.api_keys.resolve();

    if json {
        let value = match &resolved {
            Some(r) => serde_json::json!({
                "configured": true,
                "source": r.source,
                "masked": mask_api_key(r.key.expose_secret()),
            }),
            None => serde_json::json!({"configured": false}),
        };
        println!("{value}");
        return Ok(());
    }

    match resolved {
        Some(r) => println!(
            "  {} API key from {} ({})",
            style("*").green().bold(),
            style(&r.source).cyan(),
            mask_api_key(r.key.expose_secret())
        ),
        None => println!(
            "  {} No API key configured. Add one with: {}",
            style("i").blue().bold(),
            style("parley key set").yellow()
        ),
    }
    Ok(())
}

/// Remove the stored API key.
pub fn delete_key(state: &AppState, json: bool) -> Result<()> {
    let deleted = delete_api_key(&state.keychain)?;

    if json {
        println!("{}", serde_json::json!({"deleted": deleted}));
    } else if deleted {
        println!("  {} Stored API key removed.", style("*").cyan().bold());
    } else {
        println!("  {}", style("No stored API key.").dim());
    }
    Ok(())
}
