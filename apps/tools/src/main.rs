use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{MemberId, SocietyId};
use society_api::evaluate_setup;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Operator commands that talk to the society database directly.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/society.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the database and apply pending migrations.
    Migrate,
    ListSocieties,
    SetupStatus {
        secretary_id: i64,
    },
    ListApplicants {
        society_id: i64,
    },
    PaymentHistory {
        resident_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;

    match cli.command {
        Command::Migrate => {
            storage.health_check().await?;
            info!(database_url = %cli.database_url, "migrations applied");
            println!("database ready: {}", cli.database_url);
        }
        Command::ListSocieties => {
            for society in storage.list_societies().await? {
                println!(
                    "{}\t{}\t{}\tsecretary={}",
                    society.society_id,
                    society.name.as_deref().unwrap_or("-"),
                    society.city.as_deref().unwrap_or("-"),
                    society.secretary_id
                );
            }
        }
        Command::SetupStatus { secretary_id } => {
            let snapshot = storage.setup_snapshot(MemberId(secretary_id)).await?;
            let status = evaluate_setup(snapshot.as_ref());
            println!(
                "complete={} society_details={} maintenance={} amenities={}",
                status.is_setup_complete,
                status.details.has_society_details,
                status.details.has_maintenance_settings,
                status.details.has_amenities
            );
        }
        Command::ListApplicants { society_id } => {
            for applicant in storage.list_applicants(SocietyId(society_id)).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    applicant.member_id,
                    applicant.full_name,
                    applicant.mobile_number,
                    applicant.flat_number,
                    applicant.role,
                    applicant.created_at.to_rfc3339()
                );
            }
        }
        Command::PaymentHistory { resident_id } => {
            for payment in storage.payment_history(MemberId(resident_id)).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    payment.payment_id,
                    payment.billing_period,
                    payment.amount,
                    payment.status,
                    payment.updated_at.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}
