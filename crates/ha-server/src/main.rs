//! AI Assistant server
//!
//! Runs the host with the assistant integration loaded from
//! `configuration.yaml` and answers questions typed on stdin.

use ai_assistant::constants::{DOMAIN, SERVICE_ASK_QUESTION, SERVICE_RESET};
use ai_assistant::{AssistantIntegration, ConfigFlow, FlowInput, FlowResult, Host};
use anyhow::{bail, Context as _, Result};
use ha_config::CONFIG_FILE;
use ha_config_entries::{ConfigEntries, ConfigEntrySource};
use ha_core::events::StateChangedData;
use ha_core::Context;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the config directory
const CONFIG_DIR_ENV: &str = "AI_ASSISTANT_CONFIG_DIR";

/// The central host instance
pub struct HomeAssistant {
    /// Event bus, state machine and service registry shared with integrations
    pub host: Host,
    pub config_entries: Arc<ConfigEntries>,
}

impl HomeAssistant {
    pub fn new() -> Self {
        Self {
            host: Host::new(),
            config_entries: Arc::new(ConfigEntries::new()),
        }
    }
}

impl Default for HomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn the `ai_assistant:` section into a config entry; `false` when one already exists
fn import_configuration(config_dir: &Path, entries: &Arc<ConfigEntries>) -> Result<bool> {
    let config = ha_config::load_yaml(config_dir)
        .with_context(|| format!("loading {}", config_dir.join(CONFIG_FILE).display()))?;
    let Some(section) = ha_config::section::<FlowInput>(&config, DOMAIN)? else {
        bail!("no `{DOMAIN}:` section in {CONFIG_FILE}");
    };

    let result = ConfigFlow::new(entries.clone())
        .step_import(section)
        .context("invalid ai_assistant configuration")?;

    if let FlowResult::Abort { reason } = &result {
        info!(reason = %reason, "Configuration not imported");
        return Ok(false);
    }
    if let Some(entry) = result.into_config_entry(ConfigEntrySource::Import) {
        let entry = entries.add(entry)?;
        info!(entry_id = %entry.entry_id, title = %entry.title, "Imported configuration");
    }
    Ok(true)
}

async fn handle_line(hass: &HomeAssistant, line: &str) -> Result<()> {
    if line == "reset" {
        hass.host
            .services
            .call(DOMAIN, SERVICE_RESET, json!({}), Context::new(), false)
            .await?;
        println!("Conversation reset");
        return Ok(());
    }

    let response = hass
        .host
        .services
        .call(
            DOMAIN,
            SERVICE_ASK_QUESTION,
            json!({ "question": line }),
            Context::new(),
            true,
        )
        .await?;

    match response.as_ref().and_then(|r| r["response"].as_str()) {
        Some(text) => println!("{text}"),
        None => warn!("Service returned no response"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting AI Assistant server");

    let config_dir = std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let hass = HomeAssistant::new();
    let integration = Arc::new(AssistantIntegration::new(hass.host.clone()));
    hass.config_entries.register_integration(DOMAIN, integration);

    import_configuration(&config_dir, &hass.config_entries)?;
    for (entry_id, result) in hass.config_entries.setup_all().await {
        if let Err(err) = result {
            warn!(entry_id = %entry_id, error = %err, "Entry setup failed");
        }
    }
    if hass.config_entries.get_loaded_by_domain(DOMAIN).is_empty() {
        bail!("no {DOMAIN} entry could be set up");
    }

    let mut state_changes = hass.host.bus.subscribe_typed::<StateChangedData>();
    tokio::spawn(async move {
        while let Ok(event) = state_changes.recv().await {
            if let Some(new_state) = event.data.new_state {
                debug!(entity_id = %new_state.entity_id, state = %new_state.state, "State changed");
            }
        }
    });

    info!("Ready. Type a question, `reset`, or `quit`");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line {
                    "" => continue,
                    "quit" | "exit" => break,
                    _ => {
                        if let Err(err) = handle_line(&hass, line).await {
                            warn!(error = %err, "Request failed");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down...");
    for (entry_id, result) in hass.config_entries.unload_all().await {
        if let Err(err) = result {
            warn!(entry_id = %entry_id, error = %err, "Entry unload failed");
        }
    }

    Ok(())
}
