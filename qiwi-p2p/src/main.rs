use clap::{CommandFactory, Parser};
use qiwi_p2p::config::{Args, Command};
use qiwi_p2p::{BillResponse, Client, Config, Error, telemetry};
use tracing::info;

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

async fn receive_webhooks(client: &Client, config: &Config) -> qiwi_p2p::errors::Result<()> {
    let mut updates = client.start_webhook_with(&config.webhook).await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = updates.recv() => {
                let Some(update) = update else { break };
                info!(
                    bill_id = %update.bill.bill_id,
                    status = %update.bill.status.value,
                    amount = %update.bill.amount.value,
                    currency = %update.bill.amount.currency,
                    version = %update.version,
                    "Payment update"
                );
            }
        }
    }

    updates.shutdown().await;
    Ok(())
}

fn print_bill(bill: &BillResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(bill)?);
    Ok(())
}

async fn run(command: Command, client: &Client, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Webhook => receive_webhooks(client, config).await?,
        Command::Create(create) => print_bill(&client.create_bill(create.to_bill()?).await?)?,
        Command::Get { bill_id } => print_bill(&client.get_bill(&bill_id).await?)?,
        Command::Reject { bill_id } => print_bill(&client.reject_bill(&bill_id).await?)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before anything else that might build a TLS client
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    let Some(command) = args.command else {
        Args::command().print_help()?;
        std::process::exit(2);
    };

    telemetry::init_telemetry()?;
    tracing::debug!(?command, config = %args.config, "Starting");

    let client = Client::from_config(&config)?;

    match run(command, &client, &config).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::Vendor(error)) => {
                eprintln!("error: {error}");
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}
