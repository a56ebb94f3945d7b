//! Settings command handler.

use anyhow::Result;

use localgate_core::{Settings, SettingsRepository, SettingsUpdate, validate_settings};

use crate::bootstrap::CliContext;
use crate::config_commands::SettingsCommand;
use crate::utils::input::prompt_confirmation;

/// Execute a settings subcommand.
pub async fn execute(ctx: &CliContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let settings = ctx.settings.load().await?;
            println!("Current settings ({}):", ctx.settings_path.display());
            print!("{}", format_settings(&settings));
            Ok(())
        }
        SettingsCommand::Set {
            port,
            host,
            memory_mode,
            context_limit,
            response_reserve,
            max_concurrent,
            upstream_url,
            model_name,
        } => {
            let update = SettingsUpdate {
                server_port: port.map(Some),
                bind_host: host.map(Some),
                memory_mode: memory_mode.map(Some),
                context_limit: context_limit.map(Some),
                response_reserve: response_reserve.map(Some),
                max_concurrent_generations: max_concurrent.map(Some),
                upstream_url: upstream_url.map(Some),
                model_name: model_name.map(Some),
            };

            if update.is_empty() {
                println!("No settings provided. Use --help to see available options.");
                return Ok(());
            }

            let updated = apply_update(ctx.settings.as_ref(), &update).await?;
            println!("✓ Settings updated successfully:");
            print!("{}", format_settings(&updated));
            Ok(())
        }
        SettingsCommand::Reset { force } => {
            if !force
                && !prompt_confirmation("Are you sure you want to reset all settings to defaults?")?
            {
                println!("Reset cancelled.");
                return Ok(());
            }

            ctx.settings.save(&Settings::with_defaults()).await?;
            println!("✓ All settings have been reset to defaults.");
            Ok(())
        }
    }
}

/// Merge `update` into the stored settings, validate, and persist.
///
/// Nothing is written when validation fails.
pub async fn apply_update(
    repo: &dyn SettingsRepository,
    update: &SettingsUpdate,
) -> Result<Settings> {
    let mut settings = repo.load().await?;
    settings.merge(update);
    validate_settings(&settings)?;
    repo.save(&settings).await?;
    Ok(settings)
}

/// One `key: value` line per setting, effective values in brackets when unset.
fn format_settings(settings: &Settings) -> String {
    let port = settings.server_port.map_or_else(
        || format!("None [{}]", settings.effective_server_port()),
        |p| {
            if p == settings.effective_server_port() {
                p.to_string()
            } else {
                format!("{p} [falls back to {}]", settings.effective_server_port())
            }
        },
    );

    let lines = [
        ("server_port", port),
        ("bind_host", settings.effective_bind_host().to_string()),
        (
            "memory_mode",
            settings.memory_mode.unwrap_or(false).to_string(),
        ),
        ("context_limit", format!("{:?}", settings.context_limit)),
        ("response_reserve", format!("{:?}", settings.response_reserve)),
        (
            "max_concurrent",
            settings.effective_max_concurrent_generations().to_string(),
        ),
        ("upstream_url", settings.effective_upstream_url().to_string()),
        ("model_name", settings.effective_model_name().to_string()),
    ];

    lines
        .iter()
        .map(|(key, value)| format!("  {key:<17} {value}\n"))
        .collect()
}
