//! cdp-tap - inspect and tap a target over its remote debugging endpoint.
//!
//! Subcommands:
//! - `cdp-tap alert <message>` - Open an alert dialog in the page
//! - `cdp-tap devices` - List media devices and host information
//! - `cdp-tap storage` - Dump web storage and cookies
//! - `cdp-tap network` - Log network traffic with response bodies
//! - `cdp-tap prompts` - Log prompts sent to completion endpoints

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Display;
use std::process::ExitCode;
use std::time::Duration;

use cdp_tap::options::{DEFAULT_EXCHANGE_CAPACITY, DEFAULT_HOST, DEFAULT_PORT};
use cdp_tap::{
    BodyState, ConnectionState, NetworkOptions, NetworkUpdate, Page, PromptOptions, Result,
    SessionOptions,
};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command Line
// ============================================================================

#[derive(Parser)]
#[command(name = "cdp-tap")]
#[command(about = "Inspect and tap an application over its remote debugging endpoint")]
#[command(version)]
struct Cli {
    /// Host serving the debugging endpoint
    #[arg(long, env = "CDP_TAP_HOST", default_value = DEFAULT_HOST, global = true)]
    host: String,

    /// Port serving the debugging endpoint
    #[arg(long, env = "CDP_TAP_PORT", default_value_t = DEFAULT_PORT, global = true)]
    port: u16,

    /// Debugger WebSocket URL; skips discovery
    #[arg(long, env = "CDP_TAP_WS_URL", global = true)]
    ws_url: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an alert dialog in the page
    Alert {
        /// Dialog text
        message: String,
    },

    /// List media devices and host information
    Devices,

    /// Dump localStorage, sessionStorage and cookies
    Storage,

    /// Log network traffic until interrupted or the target closes
    Network {
        /// Maximum exchanges tracked at once
        #[arg(long, default_value_t = DEFAULT_EXCHANGE_CAPACITY)]
        capacity: usize,

        /// Longest request body, in bytes, inlined in events
        #[arg(long)]
        max_post_data_size: Option<u64>,
    },

    /// Log prompts sent to completion endpoints
    Prompts {
        /// URL path suffix of completion requests
        #[arg(long, default_value = "/completion")]
        url_suffix: String,

        /// Request body field to print
        #[arg(long, default_value = "prompt")]
        field: String,
    },
}

fn network_options(capacity: usize, max_post_data_size: Option<u64>) -> NetworkOptions {
    let options = NetworkOptions::new().with_capacity(capacity);
    match max_post_data_size {
        Some(bytes) => options.with_max_post_data_size(bytes),
        None => options,
    }
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions::new()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_command_timeout(Duration::from_secs(self.timeout_secs))
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let options = cli.session_options();
    let opened = match &cli.ws_url {
        Some(ws_url) => Page::attach(ws_url, options).await,
        None => Page::connect(options).await,
    };

    let page = match opened {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "Could not attach to target");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&page, cli.command).await;

    if let Err(e) = page.close().await {
        error!(error = %e, "Close failed");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes tracing on stderr.
///
/// `RUST_LOG` overrides the default filter unless `--debug` is given.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("cdp_tap=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cdp_tap=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run(page: &Page, command: Commands) -> Result<()> {
    match command {
        Commands::Alert { message } => {
            page.show_alert(&message).await?;
            println!("Alert triggered successfully");
        }

        Commands::Devices => {
            print_devices(page).await?;
            print_system_info(page).await?;
        }

        Commands::Storage => print_storage(page).await?,

        Commands::Network {
            capacity,
            max_post_data_size,
        } => log_network(page, network_options(capacity, max_post_data_size)).await?,

        Commands::Prompts { url_suffix, field } => {
            let options = PromptOptions::new()
                .with_url_suffix(url_suffix)
                .with_field(field);
            log_prompts(page, options).await?;
        }
    }

    Ok(())
}

async fn print_devices(page: &Page) -> Result<()> {
    let devices = page.media_devices().await?;

    println!("\n--- Media Devices ---");
    for (index, device) in devices.iter().enumerate() {
        println!("Device #{}:", index + 1);
        println!("  Kind: {}", device.kind);
        println!("  Label: {}", or_na(&device.label));
        println!("  Device ID: {}", device.device_id);
        println!("  Group ID: {}", device.group_id);
        println!("---------------------------");
    }
    Ok(())
}

async fn print_system_info(page: &Page) -> Result<()> {
    let info = page.system_info().await?;

    println!("\n--- System Information ---");
    println!("Device Memory: {} GB", opt(info.device_memory));
    println!("CPU Cores: {}", opt(info.hardware_concurrency));
    println!("User Agent: {}", info.user_agent);

    if let Some(network) = info.network {
        println!("\nNetwork Info:");
        println!("  Downlink: {} Mbps", opt(network.downlink));
        println!("  Effective Type: {}", opt(network.effective_type));
        println!("  Round Trip Time: {} ms", opt(network.rtt));
        println!("  Save Data: {}", opt(network.save_data));
    }

    if let Some(battery) = info.battery {
        println!("\nBattery Info:");
        println!("  Charging: {}", battery.charging);
        println!("  Charging Time: {} seconds", opt(battery.charging_time));
        println!("  Discharging Time: {} seconds", opt(battery.discharging_time));
        println!("  Battery Level: {}%", battery.level * 100.0);
    }
    Ok(())
}

async fn print_storage(page: &Page) -> Result<()> {
    let snapshot = page.storage().await?;

    let sections = [
        ("Local Storage", &snapshot.local_storage),
        ("Session Storage", &snapshot.session_storage),
        ("Cookies", &snapshot.cookies),
    ];
    for (title, entries) in sections {
        println!("\n--- {title} ---");
        for (key, value) in entries {
            println!("{key}: {value}");
        }
    }
    Ok(())
}

async fn log_network(page: &Page, options: NetworkOptions) -> Result<()> {
    let mut monitor = page.monitor_network(options).await?;
    println!("Listening for network traffic...");

    loop {
        tokio::select! {
            update = monitor.recv() => match update {
                Some(update) => print_update(&update),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    report_end(page);
    Ok(())
}

async fn log_prompts(page: &Page, options: PromptOptions) -> Result<()> {
    let mut prompts = page.capture_prompts(options).await?;
    println!("Listening for prompts...");

    loop {
        tokio::select! {
            capture = prompts.recv() => match capture {
                Some(capture) => println!("Prompt: {:?}", capture.text()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    report_end(page);
    Ok(())
}

// ============================================================================
// Formatting
// ============================================================================

fn print_update(update: &NetworkUpdate) {
    match update {
        NetworkUpdate::Request { request, .. } => {
            println!("\n[REQUEST] {} {}", request.method, request.url);
            println!("Headers: {}", pretty(&request.headers));
            if let Some(post_data) = &request.post_data {
                println!("Post Data: {post_data}");
            }
        }

        NetworkUpdate::Response { response, .. } => {
            println!("\n[RESPONSE] {} {}", response.status, response.url);
            println!("Headers: {}", pretty(&response.headers));
        }

        NetworkUpdate::Completed(exchange) => {
            let url = exchange
                .response
                .as_ref()
                .map_or(exchange.request.url.as_str(), |r| r.url.as_str());
            match &exchange.body {
                BodyState::Available(body) => {
                    println!("\n[BODY] {url}");
                    println!("Response Body: {body}");
                }
                BodyState::Unavailable(reason) => {
                    println!("\n[BODY] {url}");
                    println!("Response Body: <unavailable: {reason}>");
                }
                BodyState::Skipped | BodyState::Pending => {}
            }
        }

        NetworkUpdate::Failed {
            request_id,
            error_text,
            canceled,
        } => {
            let suffix = if *canceled { " (canceled)" } else { "" };
            println!("\n[FAILED] {request_id} {error_text}{suffix}");
        }
    }
}

fn report_end(page: &Page) {
    match page.state() {
        ConnectionState::Failed => println!("WebSocket connection failed"),
        state if state.is_terminal() => println!("WebSocket closed"),
        _ => {}
    }
}

fn pretty(headers: &Map<String, Value>) -> String {
    serde_json::to_string_pretty(headers).unwrap_or_else(|_| format!("{headers:?}"))
}

fn opt<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "Not available".to_string(), |v| v.to_string())
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

// ============================================================================
// Tests
// ============================================================================
