//! Authenticates a bot and prints the signals it can see.
//!
//! Run with: cargo run -p signal-bot -- config.json
//!
//! The bot authenticates with its RSA key when `bot.privateKeyPath` is set,
//! with its client certificate otherwise.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use bdk_auth::{BotAuthenticator, BotAuthenticatorService, Credential, JwtSigner};
use bdk_core::{ApiClient, BdkConfig};
use bdk_http::ReqwestApiClient;
use bdk_retry::{RetryPolicy, StreamPaginationAttribute};
use bdk_service::SignalService;
use futures::TryStreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn client(
    base_url: &str,
    config: &BdkConfig,
    identity: Option<&PathBuf>,
) -> anyhow::Result<Arc<dyn ApiClient>> {
    let client = match identity {
        Some(path) => ReqwestApiClient::with_identity_file(base_url, config.request_timeout(), path)?,
        None => ReqwestApiClient::new(base_url, config.request_timeout())?,
    };
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: signal-bot <config.json>");
    };
    let config = BdkConfig::from_file(&path).with_context(|| format!("loading {path}"))?;
    let bot = config.bot()?;
    let policy = Arc::new(RetryPolicy::new(config.retry.clone()));

    let authenticator = if let Some(key_path) = &bot.private_key_path {
        let signer = JwtSigner::from_file(key_path)?;
        BotAuthenticatorService::new(
            Credential::rsa(&bot.username, signer),
            client(&config.pod_url, &config, None)?,
            client(config.key_manager_url(), &config, None)?,
            Arc::clone(&policy),
        )
    } else {
        let certificate = bot.certificate_path.as_ref();
        if certificate.is_none() {
            bail!("bot needs either privateKeyPath or certificatePath");
        }
        BotAuthenticatorService::new(
            Credential::Certificate,
            client(config.session_auth_url(), &config, certificate)?,
            client(config.key_manager_url(), &config, certificate)?,
            Arc::clone(&policy),
        )
    };

    let session = authenticator
        .authenticate_bot()
        .await
        .context("bot authentication failed")?;
    tracing::info!(username = %bot.username, "bot authenticated");

    let signals = SignalService::new(client(config.agent_url(), &config, None)?, session, policy);
    let mut stream = signals.list_all_signals(StreamPaginationAttribute::default());
    while let Some(signal) = stream.try_next().await? {
        println!(
            "{}\t{}\t{}",
            signal.id,
            signal.name.as_deref().unwrap_or("-"),
            signal.query.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
