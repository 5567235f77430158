use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use provisioning::{MetadataStore, Orchestrator, ProvisionOutcome};
use shared::protocol::{CreateFormRequest, FormDefinitionResponse};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/forms.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and provision a form from a JSON create-form request.
    CreateForm {
        #[arg(long)]
        file: PathBuf,
    },
    ShowForm {
        name: String,
    },
    ListForms,
    /// Create the data table for an existing form if it is missing.
    Reprovision {
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url)
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;

    match cli.command {
        Command::CreateForm { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let request: CreateFormRequest = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a create-form request", file.display()))?;
            let orchestrator = Orchestrator::new(storage.clone(), storage);
            let schema = orchestrator.create_form(&request).await?;
            println!(
                "created form {} ({}) with table {}",
                schema.name, schema.id, schema.user_data_table_name
            );
        }
        Command::ShowForm { name } => {
            let Some(schema) = storage.get_form_by_name(&name).await? else {
                bail!("form '{name}' not found");
            };
            let response = FormDefinitionResponse::from(schema);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::ListForms => {
            for form in storage.list_forms().await? {
                println!(
                    "{}\t{}\t{} fields\t{}",
                    form.name, form.display_name, form.field_count, form.user_data_table_name
                );
            }
        }
        Command::Reprovision { name } => {
            let orchestrator = Orchestrator::new(storage.clone(), storage);
            match orchestrator.reprovision(&name).await? {
                ProvisionOutcome::Created => println!("created table for '{name}'"),
                ProvisionOutcome::AlreadyProvisioned => {
                    println!("'{name}' is already provisioned")
                }
            }
        }
    }

    Ok(())
}
