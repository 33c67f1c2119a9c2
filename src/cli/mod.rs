use crate::bus::MessageBus;
use crate::channels::{BaseChannel, WeChatChannel};
use crate::config::{load_config, Config};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wxbridge")]
#[command(version = crate::VERSION)]
#[command(about = "WeChat message gateway over a UI-automation bridge")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize wxbridge configuration
    Onboard,
    /// Run the gateway (bridge connection + message pipeline)
    Gateway {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show wxbridge status
    Status,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            onboard()?;
        }
        Commands::Gateway { config } => {
            gateway(config).await?;
        }
        Commands::Status => {
            status_command()?;
        }
    }

    Ok(())
}

fn onboard() -> Result<()> {
    println!("Initializing wxbridge...");

    let config_path = crate::config::get_config_path()?;
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Overwrite? (y/N): ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    let config = Config::default();
    crate::config::save_config(&config, Some(config_path.as_path()))?;
    println!("✓ Created config at {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Start the WeChat automation bridge on the desktop machine");
    println!("  2. Edit {} and set channels.wechat.enabled = true", config_path.display());
    println!("  3. Run: wxbridge gateway");

    Ok(())
}

async fn gateway(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Loading configuration...");
    let config = load_config(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;

    if !config.channels.wechat.enabled {
        println!("WeChat channel is disabled. Enable it in the config and retry.");
        return Ok(());
    }

    let mut bus = MessageBus::new();
    let mut inbound_rx = bus
        .take_inbound_rx()
        .ok_or_else(|| anyhow::anyhow!("Inbound receiver already taken"))?;
    let mut outbound_rx = bus
        .take_outbound_rx()
        .ok_or_else(|| anyhow::anyhow!("Outbound receiver already taken"))?;

    let mut channel = WeChatChannel::new(config.channels.wechat.clone(), bus.inbound_tx.clone());
    channel.start().await?;

    println!("wxbridge gateway is running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
            Some(msg) = inbound_rx.recv() => {
                tracing::info!(
                    "Inbound [{}] {}: {}",
                    msg.conversation_id,
                    msg.sender_id,
                    msg.content
                );
            }
            Some(msg) = outbound_rx.recv() => {
                if let Err(e) = channel.send(&msg).await {
                    tracing::error!("Failed to send outbound message: {}", e);
                }
            }
        }
    }

    channel.stop().await?;
    Ok(())
}

fn status_command() -> Result<()> {
    let config_path = crate::config::get_config_path()?;
    let config = load_config(None)?;
    let wechat = &config.channels.wechat;

    println!("wxbridge Status\n");
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "✗" }
    );
    println!("Channel: {}", if wechat.enabled { "enabled" } else { "disabled" });
    println!("Bridge URL: {}", wechat.bridge_url);
    println!("Group policy: {:?}", wechat.group_policy);
    println!(
        "Bot name: {}",
        wechat.bot_name.as_deref().unwrap_or("not set")
    );
    if wechat.listen_conversations.is_empty() {
        println!("Listen conversations: none");
    } else {
        println!("Listen conversations: {}", wechat.listen_conversations.join(", "));
    }

    Ok(())
}
