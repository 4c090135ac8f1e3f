// Commands module
/// Serve command implementation
pub mod serve;

use crate::cli::{output::*, Commands};
use crate::relay::HEALTH_MESSAGE;
use crate::types::SubscriptionBinding;
use anyhow::Context;

/// Execute a CLI command
pub async fn execute_command(
    command: Commands,
    log_level: &str,
    log_format: &str,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve(args) => {
            let config = args
                .into_config(log_level, log_format)
                .context("Invalid configuration")?;
            serve::execute(config).await
        }
        Commands::Publish { message, relay_url } => execute_publish(message, relay_url).await,
        Commands::Health { relay_url } => execute_health(relay_url).await,
        Commands::Subscriptions { relay_url } => execute_subscriptions(relay_url).await,
        Commands::Config(args) => {
            let config = args
                .into_config(log_level, log_format)
                .context("Invalid configuration")?;
            print_json(&config)
        }
    }
}

async fn execute_publish(message: String, relay_url: String) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/publish", relay_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .body(message.clone())
        .send()
        .await
        .context("Failed to connect to relay")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Relay error ({}): {}", status, error_text);
    }

    print_success(&format!("Published '{}'", message));
    Ok(())
}

async fn execute_health(relay_url: String) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", relay_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .send()
        .await
        .context("Failed to connect to relay")?;

    let status = response.status();
    let body = response.text().await.context("Failed to read response")?;

    if status.is_success() && body == HEALTH_MESSAGE {
        print_success("Relay is healthy");
        Ok(())
    } else if status.is_success() {
        print_warning(&format!("Relay answered with unexpected body: {}", body));
        Ok(())
    } else {
        print_error(&format!("Relay is unhealthy ({})", status));
        anyhow::bail!("Health check failed with status {}", status)
    }
}

async fn execute_subscriptions(relay_url: String) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/dapr/subscribe", relay_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .send()
        .await
        .context("Failed to connect to relay")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Relay error ({}): {}", status, error_text);
    }

    let bindings: Vec<SubscriptionBinding> = response
        .json()
        .await
        .context("Failed to parse response")?;

    if bindings.is_empty() {
        print_warning("No subscriptions registered");
    }
    for binding in &bindings {
        print_info(&format!(
            "{}/{} -> {}",
            binding.bus_name, binding.topic, binding.route
        ));
    }
    Ok(())
}
