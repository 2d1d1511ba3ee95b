use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use wealthdash_adapters::{configuration, telemetry};
use wealthdash_adapters::{CsvWorkbookExporter, JsonCredentialStore, KiteConnectBroker};
use wealthdash_core::config::{parse_time_of_day, Settings};
use wealthdash_core::entities::AccountId;
use wealthdash_core::portfolio::{AccountFetch, PortfolioSummary};
use wealthdash_core::service::{DashboardData, DashboardService};
use wealthdash_core::use_cases::{AuthenticateAccountUseCase, SyncPortfolioUseCase};

type Service =
    DashboardService<JsonCredentialStore, KiteConnectBroker, KiteConnectBroker, CsvWorkbookExporter>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured accounts
    Accounts,

    /// Print the broker login URL that issues a request token
    LoginUrl {
        /// Account id (broker client id)
        account: String,
    },

    /// Authenticate one account
    Connect {
        /// Account id (broker client id)
        account: String,

        /// Request token from the broker login redirect
        #[arg(short, long)]
        token: Option<String>,

        /// Ignore the cached access token
        #[arg(long, default_value = "false")]
        fresh: bool,
    },

    /// Reconnect cached sessions and show holdings
    Holdings {
        /// Show each account separately
        #[arg(long, default_value = "false")]
        per_account: bool,

        /// Print JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Reconnect cached sessions and export holdings and trades once
    Sync,

    /// Interactive dashboard
    Dashboard {
        /// Daily export time (HH:MM), overrides the configured one
        #[arg(long)]
        at: Option<String>,

        /// Start the daily export right away
        #[arg(long, default_value = "false")]
        schedule: bool,
    },
}

fn build_service(settings: &Settings) -> anyhow::Result<Service> {
    let store = Arc::new(JsonCredentialStore::new(configuration::accounts_path(settings)));
    let broker = Arc::new(KiteConnectBroker::new(&settings.broker)?);
    let exporter = Arc::new(CsvWorkbookExporter::new(configuration::export_dir(settings)));

    let authenticate = AuthenticateAccountUseCase::new(store.clone(), broker.clone())
        .with_timeout(settings.auth.timeout());
    let sync = SyncPortfolioUseCase::new(broker, exporter);

    Ok(DashboardService::new(store, authenticate, sync))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn reconnect(service: &Service) {
    let pb = spinner("Reconnecting cached sessions...");
    let outcomes = service.auto_reconnect().await;
    pb.finish_and_clear();

    for (id, outcome) in outcomes {
        match outcome {
            Ok(success) => println!("  {}", success.status),
            Err(e) => println!("  {}: {}", id, e),
        }
    }
}

fn print_summary(label: &str, summary: &PortfolioSummary) {
    println!(
        "{}: invested {:.2} | current {:.2} | P&L {:+.2} ({:+.2}%)",
        label, summary.invested, summary.current_value, summary.pnl, summary.pnl_percent
    );
}

fn print_account(fetch: &AccountFetch) {
    match &fetch.result {
        Ok(snapshot) => {
            print_summary(
                fetch.account_id.as_str(),
                &PortfolioSummary::from_holdings(&snapshot.holdings),
            );
            for h in &snapshot.holdings {
                println!(
                    "  {:<20} {:>8} @ {:>10.2} -> {:>10.2}  {:+.2}",
                    h.tradingsymbol, h.quantity, h.average_price, h.last_price, h.pnl
                );
            }
            if let Some(e) = &fetch.mf_error {
                println!("  mutual funds unavailable: {}", e);
            } else if !snapshot.mf_holdings.is_empty() {
                println!("  {} mutual fund holdings", snapshot.mf_holdings.len());
            }
        }
        Err(e) => println!("{}: fetch failed: {}", fetch.account_id, e),
    }
}

fn print_dashboard(data: &DashboardData, per_account: bool) {
    if data.accounts.is_empty() {
        println!("No connected accounts.");
        return;
    }

    if per_account {
        for fetch in &data.accounts {
            print_account(fetch);
        }
        return;
    }

    print_summary("All accounts", &data.aggregated.summary);
    for row in &data.aggregated.holdings {
        println!(
            "  [{}] {:<20} {:>8} @ {:>10.2} -> {:>10.2}  {:+.2}",
            row.account_id,
            row.row.tradingsymbol,
            row.row.quantity,
            row.row.average_price,
            row.row.last_price,
            row.row.pnl
        );
    }
    println!("{} trades today", data.aggregated.trades.len());
    for fetch in data.accounts.iter().filter(|f| f.error().is_some()) {
        println!("  skipped {}", fetch.account_id);
    }
}

async fn print_activity(service: &Service) {
    let entries = service.activity().await;
    if entries.is_empty() {
        println!("No activity yet.");
    }
    for entry in entries {
        println!("{}", entry);
    }
}

async fn connect_interactive(service: &Service, prefer_cached: bool) -> anyhow::Result<()> {
    let accounts = service.load_accounts().await;
    if accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }

    let mut labels = Vec::with_capacity(accounts.len());
    for account in &accounts {
        let state = if service.is_connected(&account.account_id).await {
            "connected"
        } else {
            "disconnected"
        };
        labels.push(format!("{} ({})", account.account_id, state));
    }

    let choice = Select::new()
        .with_prompt("Account")
        .items(&labels)
        .default(0)
        .interact()?;
    let id = accounts[choice].account_id.clone();

    let token: String = Input::new()
        .with_prompt("Request token (leave empty to use the cached session)")
        .allow_empty(true)
        .interact_text()?;

    let pb = spinner("Authenticating...");
    let result = service.connect(&id, Some(token.as_str()), prefer_cached).await;
    pb.finish_and_clear();

    match result {
        Ok(success) => println!("{}", success.status),
        Err(e) => println!("Login failed: {}", e),
    }
    Ok(())
}

async fn disconnect_interactive(service: &Service) -> anyhow::Result<()> {
    let connected = service.connected_accounts().await;
    if connected.is_empty() {
        println!("No connected accounts.");
        return Ok(());
    }

    let choice = Select::new()
        .with_prompt("Disconnect")
        .items(&connected)
        .default(0)
        .interact()?;
    service.disconnect(&connected[choice]).await;
    println!("Disconnected {}", connected[choice]);
    Ok(())
}

async fn run_dashboard(
    service: &Service,
    settings: &Settings,
    at: Option<&str>,
    schedule: bool,
) -> anyhow::Result<()> {
    let run_at = match at {
        Some(value) => parse_time_of_day(value)?,
        None => settings.export.schedule_time()?,
    };

    reconnect(service).await;
    if (schedule || settings.export.enabled) && !service.start_scheduler(run_at).await {
        println!("Connect at least one account to start the daily export.");
    }

    const ITEMS: [&str; 7] = [
        "Connect account",
        "Disconnect account",
        "View portfolio",
        "Sync now",
        "Toggle daily export",
        "Activity log",
        "Quit",
    ];

    loop {
        let scheduler = if service.is_scheduler_running() {
            format!("on, {}", run_at.format("%H:%M"))
        } else {
            "off".to_string()
        };
        println!();
        println!(
            "Connected: {} | Daily export: {}",
            service.connected_accounts().await.len(),
            scheduler
        );

        let choice = Select::new()
            .with_prompt("wealthdash")
            .items(&ITEMS)
            .default(2)
            .interact()?;

        match choice {
            0 => connect_interactive(service, settings.auth.prefer_cached_session).await?,
            1 => disconnect_interactive(service).await?,
            2 => {
                let pb = spinner("Fetching portfolio...");
                let data = service.fetch_dashboard().await;
                pb.finish_and_clear();
                print_dashboard(&data, false);
            }
            3 => {
                let pb = spinner("Syncing...");
                let report = service.sync_now().await;
                pb.finish_and_clear();
                for note in &report.notes {
                    println!("{}", note);
                }
            }
            4 => {
                if service.is_scheduler_running() {
                    service.stop_scheduler().await;
                    println!("Daily export stopped.");
                } else if service.start_scheduler(run_at).await {
                    println!("Daily export at {}.", run_at.format("%H:%M"));
                } else {
                    println!("Connect at least one account to start the daily export.");
                }
            }
            5 => print_activity(service).await,
            _ => {
                if service.is_scheduler_running()
                    && !Confirm::new()
                        .with_prompt("Daily export is running. Quit anyway?")
                        .default(false)
                        .interact()?
                {
                    continue;
                }
                service.stop_scheduler().await;
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = match configuration::get_configuration() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("configuration loading failed"));
        }
    };

    let _guard = telemetry::init_subscriber("wealthdash_cli", &settings.log_level)?;
    let cli = Cli::parse();
    let service = build_service(&settings)?;

    match &cli.command {
        Commands::Accounts => {
            let accounts = service.load_accounts().await;
            if accounts.is_empty() {
                println!(
                    "No accounts configured. Add them to {}",
                    configuration::accounts_path(&settings).display()
                );
            } else {
                println!("Configured accounts:");
                for account in accounts {
                    println!(
                        "- {} [cached session: {}, request token: {}]",
                        account.account_id,
                        if account.cached_session_token().is_some() { "yes" } else { "no" },
                        if account.stored_login_token().is_some() { "yes" } else { "no" },
                    );
                }
            }
        }
        Commands::LoginUrl { account } => {
            let id = AccountId::new(account);
            let credential = service
                .load_accounts()
                .await
                .into_iter()
                .find(|c| c.account_id == id)
                .ok_or_else(|| anyhow::anyhow!("account '{}' not found", id))?;
            let broker = KiteConnectBroker::new(&settings.broker)?;
            println!("{}", broker.login_url(&credential.api_key)?);
        }
        Commands::Connect {
            account,
            token,
            fresh,
        } => {
            let id = AccountId::new(account);
            let prefer_cached = settings.auth.prefer_cached_session && !fresh;

            let pb = spinner("Authenticating...");
            let result = service.connect(&id, token.as_deref(), prefer_cached).await;
            pb.finish_and_clear();

            match result {
                Ok(success) => {
                    info!(account_id = %id, path = %success.path, "connected");
                    println!("{}", success.status);
                    println!(
                        "Logged in as {} ({})",
                        success.handle.profile().user_name,
                        success.handle.profile().user_id
                    );
                    println!(
                        "Session established at {}",
                        success.handle.established_at().format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                Err(e) => {
                    error!(account_id = %id, error = %e, "connect failed");
                    println!("Login failed: {}", e);
                }
            }
        }
        Commands::Holdings { per_account, json } => {
            reconnect(&service).await;
            let pb = spinner("Fetching portfolio...");
            let data = service.fetch_dashboard().await;
            pb.finish_and_clear();

            if *json {
                println!("{}", serde_json::to_string_pretty(&data.aggregated)?);
            } else {
                print_dashboard(&data, *per_account);
            }
        }
        Commands::Sync => {
            reconnect(&service).await;
            let pb = spinner("Syncing...");
            let report = service.sync_now().await;
            pb.finish_and_clear();

            println!(
                "Workbook: {}",
                configuration::export_dir(&settings).display()
            );
            print_activity(&service).await;
            if !report.success {
                return Err(anyhow::anyhow!("sync did not complete"));
            }
        }
        Commands::Dashboard { at, schedule } => {
            run_dashboard(&service, &settings, at.as_deref(), *schedule).await?;
        }
    }

    Ok(())
}
