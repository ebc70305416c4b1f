use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use storefront_cart::pricing::{CartSummary, format_eur};
use storefront_cart::{
    BillingCycle, CheckoutOutcome, CheckoutRequest, ItemKind, Storefront, StorefrontConfig,
    StorefrontError,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Manage the local hosting cart and sync it with the storefront API")]
struct Cli {
    /// Storefront API base URL (overrides STOREFRONT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory for the saved cart and session (overrides STOREFRONT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add one unit of a plan (or an add-on with --addon)
    Add {
        id: String,
        #[arg(long)]
        addon: bool,
    },
    /// Set the quantity of a cart line; zero or less removes it
    SetQty {
        id: String,
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    Remove {
        id: String,
    },
    /// Switch between monthly and yearly billing
    Cycle {
        cycle: BillingCycle,
    },
    /// Replace whatever plan is in the cart with this one
    SelectPlan {
        id: String,
    },
    Show,
    Clear,
    /// Push the local cart to the server without checking out
    Sync,
    Checkout {
        /// Saved billing address id
        #[arg(long)]
        address: Option<String>,
    },
    /// Mark payment as finished and start a fresh cart
    Complete,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<StorefrontError>() {
                Some(storefront_err) => eprintln!("error: {}", storefront_err.user_message()),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_cart=info,storefront=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<StorefrontConfig> {
    let mut config = StorefrontConfig::from_env().context("invalid storefront configuration")?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.validate().context("invalid storefront configuration")?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!(data_dir = %config.data_dir.display(), api = %config.api_base_url, "opening storefront");
    let storefront = Storefront::open(config)?;
    let store = storefront.store();

    match cli.command {
        Command::Add { id, addon } => {
            let kind = if addon { ItemKind::Addon } else { ItemKind::Plan };
            if storefront.catalog().lookup(&id, kind).is_none() {
                eprintln!("warning: '{}' is not in the catalog and will be priced at €0.00", id);
            }
            store.add_item(&id, kind);
        }
        Command::SetQty { id, quantity } => {
            if store.get_item(&id).is_none() {
                eprintln!("warning: '{}' is not in the cart", id);
            }
            store.set_quantity(&id, quantity);
        }
        Command::Remove { id } => store.remove_item(&id),
        Command::Cycle { cycle } => store.set_billing_cycle(cycle),
        Command::SelectPlan { id } => store.select_plan(&id),
        Command::Show => {}
        Command::Clear => store.clear(),
        Command::Sync => {
            let report = storefront.sync().await?;
            println!(
                "Cart synced ({} item changes)",
                report.item_mutation_count()
            );
        }
        Command::Checkout { address } => {
            let request = CheckoutRequest {
                address_id: address,
            };
            match storefront.checkout(request).await? {
                CheckoutOutcome::Redirect { url } => {
                    println!("Continue to payment: {}", url);
                    return Ok(());
                }
                CheckoutOutcome::AddressRequired => {
                    println!("A billing address is required; rerun with --address <id>");
                    return Ok(());
                }
            }
        }
        Command::Complete => {
            storefront.complete_checkout()?;
            println!("Thank you for your purchase. Your cart has been cleared.");
            return Ok(());
        }
    }

    print_summary(&storefront.summary());
    Ok(())
}

fn print_summary(summary: &CartSummary) {
    if summary.is_empty() {
        println!("Your cart is empty");
        return;
    }

    println!("Billing: {}", summary.billing_cycle);
    for line in &summary.lines {
        let price = match summary.billing_cycle {
            BillingCycle::Monthly => line.monthly,
            BillingCycle::Yearly => line.yearly,
        };
        println!(
            "  {:<24} {:>8} x{:<3} {:>10}",
            line.name,
            line.kind.as_str(),
            line.quantity,
            format_eur(price)
        );
    }

    match summary.billing_cycle {
        BillingCycle::Monthly => println!("Total: {} / month", format_eur(summary.total())),
        BillingCycle::Yearly => {
            println!("Total: {} / year", format_eur(summary.total()));
            println!("You save {}", format_eur(summary.yearly_savings));
        }
    }
}
