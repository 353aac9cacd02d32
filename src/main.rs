use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use supla_core::config::SuplaConfig;
use supla_core::ratelimit::{Clock, Identity, RateLimitRule, RateLimiter, SystemClock};
use supla_core::server::{ChannelRef, SuplaServer, ValueKind};

/// Talk to the SUPLA server control socket.
#[derive(Debug, Parser)]
#[command(name = "supla-core", version, about)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the control socket path
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Log as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List which of the given devices are connected
    Connected {
        #[arg(long)]
        user: u64,
        #[arg(long = "id", required = true)]
        ids: Vec<u64>,
    },
    /// Check whether a client app is connected
    ClientConnected {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        client: u64,
    },
    /// Reconnect all devices and apps of a user
    Reconnect {
        #[arg(long)]
        user: u64,
    },
    /// Reconnect one client app
    ReconnectClient {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        client: u64,
    },
    /// Validate an OAuth access token
    Oauth {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        token: String,
    },
    /// Read a channel value
    Read {
        /// char, temperature, humidity, distance or rgbw
        #[arg(long)]
        kind: ValueKind,
        #[arg(long)]
        user: u64,
        #[arg(long)]
        device: u64,
        #[arg(long)]
        channel: u64,
    },
    /// Write a char value to a channel or channel group
    SetChar {
        #[arg(long)]
        user: u64,
        #[arg(long, required_unless_present = "group")]
        device: Option<u64>,
        #[arg(long, required_unless_present = "group")]
        channel: Option<u64>,
        #[arg(long, conflicts_with_all = ["device", "channel"])]
        group: Option<u64>,
        #[arg(long, allow_negative_numbers = true)]
        value: i64,
    },
    /// Write an RGBW value to a channel or channel group
    SetRgbw {
        #[arg(long)]
        user: u64,
        #[arg(long, required_unless_present = "group")]
        device: Option<u64>,
        #[arg(long, required_unless_present = "group")]
        channel: Option<u64>,
        #[arg(long, conflicts_with_all = ["device", "channel"])]
        group: Option<u64>,
        #[arg(long, allow_negative_numbers = true)]
        color: i64,
        #[arg(long, allow_negative_numbers = true)]
        color_brightness: i64,
        #[arg(long, allow_negative_numbers = true)]
        brightness: i64,
    },
    /// Show how a rule would account a burst of requests
    Limit {
        /// Rule as "<requests>/<seconds>"
        #[arg(long)]
        rule: RateLimitRule,
        /// Number of requests in the burst
        #[arg(long, default_value_t = 1)]
        hits: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config =
        SuplaConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(socket) = cli.socket {
        config.server.socket_path = socket;
    }
    info!(socket = %config.server.socket_path.display(), "Configuration loaded");

    let mut server = SuplaServer::from_config(&config.server);

    let output = match cli.command {
        Command::Connected { user, ids } => {
            json!({ "connected": server.check_devices_connected(user, &ids).await })
        }
        Command::ClientConnected { user, client } => {
            json!({ "connected": server.is_client_app_connected(user, client).await })
        }
        Command::Reconnect { user } => json!({ "ok": server.reconnect_user(user).await }),
        Command::ReconnectClient { user, client } => {
            json!({ "ok": server.reconnect_client(user, client).await })
        }
        Command::Oauth { user, token } => {
            json!({ "authorized": server.oauth_authorize(user, &token).await })
        }
        Command::Read {
            kind,
            user,
            device,
            channel,
        } => {
            server
                .connect()
                .await
                .context("Cannot reach the SUPLA server")?;
            let value = server
                .read_value(kind, &ChannelRef::new(user, device, channel))
                .await?;
            json!({ "kind": kind, "value": value })
        }
        Command::SetChar {
            user,
            device,
            channel,
            group,
            value,
        } => {
            let ok = match group {
                Some(group) => server.set_channel_group_char_value(user, group, value).await,
                None => {
                    let channel = ChannelRef::new(user, device.unwrap_or(0), channel.unwrap_or(0));
                    server.set_char_value(&channel, value).await
                }
            };
            json!({ "ok": ok })
        }
        Command::SetRgbw {
            user,
            device,
            channel,
            group,
            color,
            color_brightness,
            brightness,
        } => {
            let ok = match group {
                Some(group) => {
                    server
                        .set_channel_group_rgbw_value(
                            user,
                            group,
                            color,
                            color_brightness,
                            brightness,
                        )
                        .await
                }
                None => {
                    let channel = ChannelRef::new(user, device.unwrap_or(0), channel.unwrap_or(0));
                    server
                        .set_rgbw_value(&channel, color, color_brightness, brightness)
                        .await
                }
            };
            json!({ "ok": ok })
        }
        Command::Limit { rule, hits } => {
            let limiter = RateLimiter::new();
            let now = SystemClock.now();
            let decisions: Vec<_> = (0..hits)
                .map(|_| limiter.check_and_record(&Identity::Global, &rule, now))
                .collect();
            json!({ "rule": rule, "decisions": decisions })
        }
    };

    server.disconnect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_thread_ids(true).init();
    }
}
