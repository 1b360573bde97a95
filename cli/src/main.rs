mod render;

use std::time::Duration;

use clap::{Parser, Subcommand};
use frames::{HyperVisMode, Outbound, PowerMode};
use iris::state::SessionUpdate;
use iris::token::TokenSources;
use iris::{ClientConfig, ConnectionState, DashboardSession};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing auth token; pass --token or set IRIS_TOKEN or IRIS_COOKIE")]
    MissingToken,
    #[error(transparent)]
    Config(#[from] iris::ConfigError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("server rejected the token")]
    AuthFailed,
    #[error("timed out waiting for the websocket to open")]
    Timeout,
    #[error("transport stopped")]
    TransportStopped,
    #[error("command was not sent: websocket not open")]
    NotSent,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] frames::CodecError),
}

#[derive(Parser, Debug)]
#[command(name = "iris-cli", about = "IRIS dashboard monitor and admin console")]
struct Cli {
    #[arg(long, env = "IRIS_BASE_URL", default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// Auth token. Falls back to `IRIS_TOKEN`, then the `access_token`
    /// cookie in `IRIS_COOKIE`.
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the slot to agent table for a shift.
    Route {
        #[arg(long, allow_negative_numbers = true)]
        shift: Option<i64>,
    },
    /// Print the admin control-state snapshot.
    Controls,
    /// Live session monitor.
    Monitor,
    /// Advance the shift by one.
    Shift,
    SetShift {
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    Temperature {
        value: f64,
    },
    /// One of `normal`, `low_power`, `overclock`.
    PowerMode {
        mode: PowerMode,
    },
    /// One of `normal`, `blackbox`, `forensic`.
    HyperVis {
        mode: HyperVisMode,
    },
    Reset,
    Broadcast {
        content: String,
    },
    ViewSync {
        view: String,
    },
    TestMode {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Clone)]
struct CliContext {
    config: ClientConfig,
    token: Option<String>,
}

impl CliContext {
    fn token(&self) -> Result<&str, CliError> {
        self.token.as_deref().ok_or(CliError::MissingToken)
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    config.base_url = cli.base_url.trim_end_matches('/').to_owned();
    let ctx = CliContext {
        config,
        token: TokenSources::from_env(cli.token).resolve(),
    };

    match cli.command {
        Command::Route { shift } => run_route(&ctx, shift).await,
        Command::Controls => {
            let json = fetch_controls(&ctx).await?;
            print_json(&json)
        }
        Command::Monitor => run_monitor(&ctx).await,
        Command::Shift => send_command(&ctx, Outbound::ShiftCommand).await,
        Command::SetShift { value } => send_command(&ctx, Outbound::SetShiftCommand { value }).await,
        Command::Temperature { value } => {
            send_command(&ctx, Outbound::TemperatureCommand { value }).await
        }
        Command::PowerMode { mode } => send_command(&ctx, Outbound::ChernobylModeCommand { mode }).await,
        Command::HyperVis { mode } => send_command(&ctx, Outbound::HyperVisCommand { mode }).await,
        Command::Reset => send_command(&ctx, Outbound::ResetGame).await,
        Command::Broadcast { content } => {
            send_command(&ctx, Outbound::AdminBroadcast { content }).await
        }
        Command::ViewSync { view } => send_command(&ctx, Outbound::AdminViewSync { view }).await,
        Command::TestMode { enabled } => {
            send_command(&ctx, Outbound::TestModeToggle { enabled }).await
        }
    }
}

/// Without `--shift`, routes at the server's current shift.
async fn run_route(ctx: &CliContext, shift: Option<i64>) -> Result<(), CliError> {
    let shift = match shift {
        Some(shift) => shift,
        None => current_shift(ctx).await?,
    };
    print!("{}", render::routing_table(ctx.config.router(), shift));
    Ok(())
}

async fn run_monitor(ctx: &CliContext) -> Result<(), CliError> {
    let token = ctx.token()?.to_owned();
    let mut session = DashboardSession::open(&ctx.config)?;

    match current_shift(ctx).await {
        Ok(shift) => {
            session.state_mut().seed_shift(shift);
        }
        Err(error) => warn!(%error, "control snapshot unavailable, waiting for first push"),
    }

    session.connect(token);
    println!("{}", render::monitor(session.state()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let updates = tokio::select! {
            updates = session.next_updates() => updates.ok_or(CliError::TransportStopped)?,
            _ = &mut ctrl_c => break,
        };
        if updates.is_empty() {
            continue;
        }
        for update in &updates {
            if let SessionUpdate::Forward { kind, .. } = update {
                info!(%kind, "unhandled push");
            }
        }
        println!("{}", render::monitor(session.state()));
        if session.state().connection() == ConnectionState::AuthFailed {
            return Err(CliError::AuthFailed);
        }
    }

    session.shutdown().await;
    Ok(())
}

/// Open a connection, send one command, close.
async fn send_command(ctx: &CliContext, msg: Outbound) -> Result<(), CliError> {
    let token = ctx.token()?.to_owned();
    let mut session = DashboardSession::open(&ctx.config)?;
    session.connect(token);

    let wait = ctx.config.transport.connect_timeout + Duration::from_secs(5);
    tokio::time::timeout(wait, wait_connected(&mut session))
        .await
        .map_err(|_| CliError::Timeout)??;

    let encoded = frames::encode_outbound(&msg)?;
    if !session.send(msg) {
        return Err(CliError::NotSent);
    }
    // Shutdown is queued behind the send, so the frame goes out first.
    session.shutdown().await;
    println!("sent {encoded}");
    Ok(())
}

async fn wait_connected(session: &mut DashboardSession) -> Result<(), CliError> {
    loop {
        let updates = session.next_updates().await.ok_or(CliError::TransportStopped)?;
        for update in updates {
            match update {
                SessionUpdate::Connection(ConnectionState::Connected) => return Ok(()),
                SessionUpdate::Connection(ConnectionState::AuthFailed) => {
                    return Err(CliError::AuthFailed);
                }
                SessionUpdate::Connection(state) => info!(%state, "waiting for websocket"),
                _ => {}
            }
        }
    }
}

async fn fetch_controls(ctx: &CliContext) -> Result<Value, CliError> {
    let token = ctx.token()?;
    let url = format!("{}/api/admin/controls/state", ctx.config.base_url);
    let response = reqwest::Client::new()
        .get(url)
        .header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?)
        .send()
        .await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: value.to_string() });
    }
    Ok(value)
}

async fn current_shift(ctx: &CliContext) -> Result<i64, CliError> {
    let json = fetch_controls(ctx).await?;
    json.get("shift_offset")
        .or_else(|| json.get("shift"))
        .and_then(Value::as_i64)
        .ok_or(CliError::MissingField("shift_offset"))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
