//! CampusID command-line interface
//!
//! Thin exerciser of the core library: registration, day views, manual
//! overrides, import/export, and explicit saves. Screens and the camera
//! pipeline live elsewhere.

use std::path::PathBuf;

use anyhow::Context;
use campus_core::domain::{DayStatus, Identity};
use campus_core::Core;
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "campus", about = "CampusID attendance ledger", version)]
struct Cli {
    /// Data directory for config and ledger storage
    #[arg(long, env = "CAMPUS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new identity
    Register {
        name: String,
        role: String,
        department: String,
        /// File holding the reference image as a base64 text payload
        #[arg(long)]
        image: PathBuf,
    },

    /// List the roster
    List,

    /// Show one day's attendance
    Day {
        /// Date to show (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Reconcile a probe image against the roster
    CheckIn {
        /// File holding the probe image payload
        #[arg(long)]
        probe: PathBuf,
    },

    /// Manually override a status (Present, Late or Absent)
    Mark {
        user: Uuid,
        status: DayStatus,
        /// Date to override (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete an identity; its history stays visible
    Delete { user: Uuid },

    /// Replace the roster from a file
    ImportRoster { file: PathBuf },

    /// Replace the attendance log from a file
    ImportLog { file: PathBuf },

    /// Export the roster in the persisted format
    ExportRoster { file: PathBuf },

    /// Export the attendance log in the persisted format
    ExportLog { file: PathBuf },

    /// Export the simplified member list
    ExportMembers { file: PathBuf },

    /// Export the human-oriented attendance report
    ExportReport { file: PathBuf },

    /// Change the time-of-day cut-off after which check-ins count as Late
    SetThreshold {
        /// New cut-off, as HH:MM or HH:MM:SS
        #[arg(value_parser = parse_threshold)]
        threshold: NaiveTime,
    },

    /// Write pending changes to storage now
    Save,
}

fn parse_threshold(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("'{raw}' is not a valid HH:MM time"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => campus_core::config::default_data_dir()?,
    };

    let core = Core::new_with_config(data_dir).await?;
    let ledger_dir = core.config().read().await.ledger_dir();
    core.connect(ledger_dir).await?;

    run_command(&core, cli.command).await?;

    core.shutdown().await
}

async fn run_command(core: &Core, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Register {
            name,
            role,
            department,
            image,
        } => {
            let payload = std::fs::read_to_string(&image)
                .with_context(|| format!("reading image payload {}", image.display()))?;
            let identity = core
                .register(name, role, department, payload.trim().to_string())
                .await?;
            println!("✅ Registered {} ({})", identity.name, identity.id);
        }

        Commands::List => {
            let roster = core.roster().await;
            println!("{}", roster_table(&roster));
            println!("{} registered", roster.len());
        }

        Commands::Day { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let view = core.day_view(date).await;
            let stats = view.stats();

            let mut table = Table::new();
            table.set_header(vec!["Name", "Role", "Status", "Checked in", "Confidence"]);
            for row in &view.rows {
                let (time, confidence) = match &row.record {
                    Some(record) => (
                        record.timestamp.format("%H:%M:%S").to_string(),
                        format!("{:.2}", record.confidence),
                    ),
                    None => ("-".to_string(), "-".to_string()),
                };
                let name = if row.orphaned {
                    format!("{} (deleted)", row.name)
                } else {
                    row.name.clone()
                };
                table.add_row(vec![
                    name,
                    row.role.clone(),
                    row.status.to_string(),
                    time,
                    confidence,
                ]);
            }
            println!("Attendance for {date}");
            println!("{table}");
            println!(
                "{} total · {} present · {} late · {} absent",
                stats.total, stats.present, stats.late, stats.absent
            );
        }

        Commands::CheckIn { probe } => {
            let bytes = std::fs::read(&probe)
                .with_context(|| format!("reading probe {}", probe.display()))?;
            let outcome = core.check_in(&bytes).await?;
            if !outcome.new_records.is_empty() {
                let names: Vec<&str> = outcome
                    .new_records
                    .iter()
                    .map(|r| r.user_name.as_str())
                    .collect();
                print!("✅ Present: {}", names.join(", "));
                if outcome.already_present > 0 {
                    print!(" (skipped {} already marked)", outcome.already_present);
                }
                println!();
            } else if outcome.already_present > 0 {
                println!(
                    "⚠️ All identified people ({}) are already marked for today",
                    outcome.already_present
                );
            } else if outcome.low_confidence_rejected {
                println!("⚠️ Low confidence match; try a closer, better-lit probe");
            } else {
                println!("❌ No registered faces detected");
            }
        }

        Commands::Mark { user, status, date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            if core.set_status(user, status, date).await? {
                println!("✅ Marked {user} as {status} on {date}");
            } else {
                println!("Nothing to do for {user} on {date}");
            }
        }

        Commands::Delete { user } => {
            if core.delete_identity(user).await {
                println!("✅ Deleted {user}; past records remain visible");
            } else {
                println!("❌ Unknown identity {user}");
            }
        }

        Commands::ImportRoster { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let count = core.import_roster(bytes).await?;
            println!("✅ Roster replaced: {count} identities");
        }

        Commands::ImportLog { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let count = core.import_log(bytes).await?;
            println!("✅ Attendance log replaced: {count} records");
        }

        Commands::ExportRoster { file } => {
            std::fs::write(&file, core.export_roster().await)?;
            println!("✅ Wrote {}", file.display());
        }

        Commands::ExportLog { file } => {
            std::fs::write(&file, core.export_log().await)?;
            println!("✅ Wrote {}", file.display());
        }

        Commands::ExportMembers { file } => {
            std::fs::write(&file, core.export_member_list().await)?;
            println!("✅ Wrote {}", file.display());
        }

        Commands::ExportReport { file } => {
            std::fs::write(&file, core.export_report().await)?;
            println!("✅ Wrote {}", file.display());
        }

        Commands::SetThreshold { threshold } => {
            let config = core.config();
            let mut config = config.write().await;
            config.late_threshold = threshold;
            config.save()?;
            println!("✅ Late threshold set to {threshold}");
        }

        Commands::Save => {
            if core.save().await? {
                println!("✅ Saved");
            } else {
                println!("Nothing to save");
            }
        }
    }
    Ok(())
}

fn roster_table(roster: &[Identity]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Id", "Name", "Role", "Department", "Registered"]);
    for identity in roster {
        table.add_row(vec![
            identity.id.to_string(),
            identity.name.clone(),
            identity.role.clone(),
            identity.department.clone(),
            identity.registered_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    table
}
