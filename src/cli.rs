use clap::{Parser, Subcommand};
use leadflow::config::Config;
use leadflow::error::{Error, Result};
use leadflow::gateway::{CallbackPayload, OfflineGateway};
use leadflow::hook::LoggingHook;
use leadflow::state::{Contact, LineItem, Measurement, State};
use leadflow::storage::{EventRecord, FileStorage, Storage};
use leadflow::workflow::{
    CallOutcome, DesignDecision, InstallerInfo, IntakeRequest, QualifyDetails, Workflow,
};
use leadflow::current_timestamp_ms;
use std::fs;
use std::io::{self, Read};

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(about = "Leadflow CLI - Lead-to-order pipeline for custom door sales")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long, default_value = "human")]
    pub format: String,

    /// Data directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Create a lead from a web-form enquiry
    Intake {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        pin: String,
        #[arg(long, default_value = "Main Door")]
        category: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        session: Option<String>,
    },

    /// Log a call attempt without an outcome
    Call {
        lead_id: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Record a qualification call outcome
    Qualify {
        lead_id: String,
        /// Outcome code, e.g. INTERESTED, BUSY, NOT_INTERESTED
        outcome: String,
        /// Next call time (epoch milliseconds)
        #[arg(long)]
        next_call_at: Option<i64>,
        #[arg(long)]
        corrected_phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Measurement visit operations
    Measure {
        #[command(subcommand)]
        command: MeasureCommands,
    },

    /// Quotation operations
    Quote {
        #[command(subcommand)]
        command: QuoteCommands,
    },

    /// Send the proposal with its 50% advance payment link
    Proposal {
        lead_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },

    /// Process a payment gateway callback (JSON from arg, file or stdin)
    Callback {
        /// Callback JSON
        #[arg(short, long)]
        payload: Option<String>,
        /// Callback JSON file path
        #[arg(long)]
        file: Option<String>,
    },

    /// Design revision operations
    Design {
        #[command(subcommand)]
        command: DesignCommands,
    },

    /// Production operations
    Production {
        #[command(subcommand)]
        command: ProductionCommands,
    },

    /// Installation operations
    Install {
        #[command(subcommand)]
        command: InstallCommands,
    },

    /// Public tracking view by token
    Track { token: String },

    /// Billing totals for a lead
    Totals { lead_id: String },

    /// Notify overdue follow-ups
    Sweep,

    /// Round-robin assignment of fresh leads
    Assign,

    /// Show the audit log
    Log {
        /// Only events for this lead
        #[arg(long)]
        lead_id: Option<String>,
    },

    /// List all leads
    List,

    /// Show one lead in full
    Show { lead_id: String },
}

#[derive(Subcommand)]
pub enum MeasureCommands {
    /// Book the site visit
    Schedule {
        lead_id: String,
        #[arg(long)]
        technician: String,
        /// Appointment time (epoch milliseconds)
        #[arg(long)]
        at: i64,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Record the measurements taken (JSON array from arg, file or stdin)
    Complete {
        lead_id: String,
        #[arg(short, long)]
        items: Option<String>,
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

#[derive(Subcommand)]
pub enum QuoteCommands {
    /// Record a quotation (line items as JSON array)
    Record {
        lead_id: String,
        #[arg(long)]
        number: String,
        #[arg(short, long)]
        items: Option<String>,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        file_name: Option<String>,
        /// Validity (epoch milliseconds)
        #[arg(long)]
        valid_until: Option<i64>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Mark the latest quotation as shared
    Send {
        lead_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

#[derive(Subcommand)]
pub enum DesignCommands {
    /// Store a new draft revision
    Upload {
        lead_id: String,
        /// Design file names
        #[arg(long, required = true, num_args = 1..)]
        files: Vec<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Send the latest revision for client review
    Request {
        lead_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Show the public review page data for a token
    Review { token: String },
    /// Apply the client's decision for a token
    Decide {
        token: String,
        /// "approve" or "changes"
        decision: String,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ProductionCommands {
    /// Kick off manufacturing (requires frozen design)
    Start {
        lead_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Mark manufacturing finished
    Complete {
        lead_id: String,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

#[derive(Subcommand)]
pub enum InstallCommands {
    /// Schedule the installation
    Schedule {
        lead_id: String,
        /// Desired time (epoch milliseconds); defaults to two days out
        #[arg(long)]
        at: Option<i64>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
    /// Record the finished installation
    Complete {
        lead_id: String,
        #[arg(long)]
        installer: Option<String>,
        #[arg(long)]
        installer_phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

/// Load state from storage or start empty
pub fn load_or_create_state(storage: &FileStorage) -> Result<(State, u64)> {
    match storage.load_state()? {
        Some((state, last_event_id)) => Ok((state, last_event_id)),
        None => Ok((State::new(), 0)),
    }
}

/// Read a JSON document from an inline arg, a file, or stdin
fn read_json(inline: Option<String>, file: Option<&str>) -> Result<String> {
    if let Some(json) = inline {
        return Ok(json);
    }
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| Error::Validation(format!("Failed to read file {}: {}", path, e))),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| Error::Validation(format!("Failed to read from stdin: {}", e)))?;
            Ok(buffer)
        }
    }
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::StateError(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

/// Append the audit event and persist the snapshot after a committed
/// mutation.
fn commit(
    storage: &mut FileStorage,
    state: &State,
    last_event_id: u64,
    event: EventRecord,
) -> Result<u64> {
    storage.append_event(&event)?;
    let next = last_event_id + 1;
    storage.persist_state(state, next)?;
    Ok(next)
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.set_data_dir(std::path::PathBuf::from(dir));
    }
    if cli.format == "json" {
        config.set_output_format("json".to_string());
    }

    let mut storage = FileStorage::new(&config);
    let mut wf = Workflow::new(config.clone(), OfflineGateway, LoggingHook);
    let now = current_timestamp_ms();

    match cli.command {
        Commands::Init => {
            fs::create_dir_all(config.get_data_dir())
                .map_err(|e| Error::StateError(format!("Failed to create data directory: {}", e)))?;
            println!(
                "Initialized data directory at: {}",
                config.get_data_dir().display()
            );
            Ok(())
        }

        Commands::Intake {
            name,
            phone,
            email,
            pin,
            category,
            quantity,
            city,
            message,
            session,
        } => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let req = IntakeRequest {
                session_id: session.unwrap_or_default(),
                category,
                quantity,
                contact: Contact {
                    name,
                    phone,
                    email,
                    pin,
                    notes: String::new(),
                },
                city,
                message,
            };
            let out = wf.intake(&mut state, req, now)?;
            commit(
                &mut storage,
                &state,
                last_event_id,
                EventRecord::new(now, &out.lead_id, "intake", "{}".to_string()),
            )?;
            println!("{}", format_output(&out, &cli.format)?);
            Ok(())
        }

        Commands::Call { lead_id, notes, actor } => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let out = wf.place_call(&mut state, &lead_id, notes, &actor, now)?;
            commit(
                &mut storage,
                &state,
                last_event_id,
                EventRecord::new(now, &lead_id, "call", "{}".to_string()),
            )?;
            println!("{}", format_output(&out, &cli.format)?);
            Ok(())
        }

        Commands::Qualify {
            lead_id,
            outcome,
            next_call_at,
            corrected_phone,
            notes,
            actor,
        } => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let outcome = CallOutcome::parse(&outcome)?;
            let details = QualifyDetails {
                next_call_at,
                corrected_phone,
                notes,
            };
            let out = wf.qualify(&mut state, &lead_id, outcome, details, &actor, now)?;
            commit(
                &mut storage,
                &state,
                last_event_id,
                EventRecord::new(
                    now,
                    &lead_id,
                    "qualify",
                    serde_json::json!({ "outcome": outcome.code() }).to_string(),
                ),
            )?;
            println!("{}", format_output(&out, &cli.format)?);
            Ok(())
        }

        Commands::Measure { command } => match command {
            MeasureCommands::Schedule {
                lead_id,
                technician,
                at,
                actor,
            } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let out = wf.schedule_measurement(&mut state, &lead_id, &technician, at, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        &lead_id,
                        "measure-schedule",
                        serde_json::json!({ "technician": technician, "at": at }).to_string(),
                    ),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
            MeasureCommands::Complete {
                lead_id,
                items,
                file,
                actor,
            } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let json = read_json(items, file.as_deref())?;
                let parsed: Vec<Measurement> = serde_json::from_str(&json)
                    .map_err(|e| Error::Validation(format!("Invalid measurement JSON: {}", e)))?;
                let out = wf.complete_measurement(&mut state, &lead_id, parsed, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(now, &lead_id, "measure-complete", "{}".to_string()),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
        },

        Commands::Quote { command } => match command {
            QuoteCommands::Record {
                lead_id,
                number,
                items,
                file,
                file_name,
                valid_until,
                actor,
            } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let json = read_json(items, file.as_deref())?;
                let parsed: Vec<LineItem> = serde_json::from_str(&json)
                    .map_err(|e| Error::Validation(format!("Invalid line item JSON: {}", e)))?;
                let out = wf.record_quotation(
                    &mut state,
                    &lead_id,
                    &number,
                    parsed,
                    file_name,
                    valid_until,
                    &actor,
                    now,
                )?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        &lead_id,
                        "quote-record",
                        serde_json::json!({ "number": number }).to_string(),
                    ),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
            QuoteCommands::Send { lead_id, actor } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let out = wf.send_quotation(&mut state, &lead_id, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(now, &lead_id, "quote-send", "{}".to_string()),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
        },

        Commands::Proposal { lead_id, actor } => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let out = wf.send_proposal(&mut state, &lead_id, &actor, now)?;
            commit(
                &mut storage,
                &state,
                last_event_id,
                EventRecord::new(
                    now,
                    &lead_id,
                    "proposal",
                    serde_json::json!({ "reference": out.reference_id, "amount": out.amount })
                        .to_string(),
                ),
            )?;
            println!("{}", format_output(&out, &cli.format)?);
            Ok(())
        }

        Commands::Callback { payload, file } => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let json = read_json(payload, file.as_deref())?;
            let raw: serde_json::Value = serde_json::from_str(&json)
                .map_err(|e| Error::Validation(format!("Invalid callback JSON: {}", e)))?;
            let parsed = CallbackPayload::from_json(raw)?;
            let out = wf.payment_callback(&mut state, parsed, now)?;
            commit(
                &mut storage,
                &state,
                last_event_id,
                EventRecord::new(
                    now,
                    &out.lead_id,
                    "payment-callback",
                    serde_json::json!({ "reference": out.reference }).to_string(),
                ),
            )?;
            println!("{}", format_output(&out, &cli.format)?);
            Ok(())
        }

        Commands::Design { command } => match command {
            DesignCommands::Upload {
                lead_id,
                files,
                notes,
                actor,
            } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let version = wf.upload_design(&mut state, &lead_id, files, notes, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        &lead_id,
                        "design-upload",
                        serde_json::json!({ "version": version }).to_string(),
                    ),
                )?;
                println!("Stored design revision v{}", version);
                Ok(())
            }
            DesignCommands::Request { lead_id, actor } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let (version, url) = wf.request_design_approval(&mut state, &lead_id, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        &lead_id,
                        "design-request",
                        serde_json::json!({ "version": version }).to_string(),
                    ),
                )?;
                println!("Design v{} sent for review: {}", version, url);
                Ok(())
            }
            DesignCommands::Review { token } => {
                let (state, _) = load_or_create_state(&storage)?;
                let view = wf.design_review(&state, &token)?;
                println!("{}", format_output(&view, &cli.format)?);
                Ok(())
            }
            DesignCommands::Decide {
                token,
                decision,
                notes,
            } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let decision = match decision.as_str() {
                    "approve" => DesignDecision::Approve,
                    "changes" => DesignDecision::RequestChanges,
                    other => {
                        return Err(Error::Validation(format!(
                            "unknown decision '{}' (expected approve|changes)",
                            other
                        )))
                    }
                };
                let out = wf.decide_design(&mut state, &token, decision, notes, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        &out.lead_id,
                        "design-decide",
                        serde_json::json!({ "version": out.version }).to_string(),
                    ),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
        },

        Commands::Production { command } => match command {
            ProductionCommands::Start { lead_id, actor } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let out = wf.start_production(&mut state, &lead_id, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(now, &lead_id, "production-start", "{}".to_string()),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
            ProductionCommands::Complete { lead_id, actor } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let out = wf.complete_production(&mut state, &lead_id, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(now, &lead_id, "production-complete", "{}".to_string()),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
        },

        Commands::Install { command } => match command {
            InstallCommands::Schedule { lead_id, at, actor } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let out = wf.schedule_installation(&mut state, &lead_id, at, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(now, &lead_id, "install-schedule", "{}".to_string()),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
            InstallCommands::Complete {
                lead_id,
                installer,
                installer_phone,
                notes,
                actor,
            } => {
                let (mut state, last_event_id) = load_or_create_state(&storage)?;
                let info = InstallerInfo {
                    installer_name: installer,
                    installer_phone,
                    notes,
                };
                let out = wf.complete_installation(&mut state, &lead_id, info, &actor, now)?;
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(now, &lead_id, "install-complete", "{}".to_string()),
                )?;
                println!("{}", format_output(&out, &cli.format)?);
                Ok(())
            }
        },

        Commands::Track { token } => {
            let (state, _) = load_or_create_state(&storage)?;
            let view = wf.track(&state, &token)?;
            println!("{}", format_output(&view, &cli.format)?);
            Ok(())
        }

        Commands::Totals { lead_id } => {
            let (state, _) = load_or_create_state(&storage)?;
            let lead = state.lead(&lead_id)?;
            let totals = leadflow::workflow::compute_totals(lead, &config);
            println!("{}", format_output(&totals, &cli.format)?);
            Ok(())
        }

        Commands::Sweep => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let notified = wf.follow_up_sweep(&mut state, now)?;
            if !notified.is_empty() {
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        "",
                        "follow-up-sweep",
                        serde_json::json!({ "notified": notified }).to_string(),
                    ),
                )?;
            }
            println!("Notified {} lead(s)", notified.len());
            Ok(())
        }

        Commands::Assign => {
            let (mut state, last_event_id) = load_or_create_state(&storage)?;
            let made = wf.auto_assign(&mut state, now)?;
            if !made.is_empty() {
                commit(
                    &mut storage,
                    &state,
                    last_event_id,
                    EventRecord::new(
                        now,
                        "",
                        "auto-assign",
                        serde_json::json!({ "assigned": made.len() }).to_string(),
                    ),
                )?;
            }
            for (lead_id, assignee) in &made {
                println!("{} -> {}", lead_id, assignee);
            }
            println!("Assigned {} lead(s)", made.len());
            Ok(())
        }

        Commands::Log { lead_id } => {
            let events = storage.load_events_from(0)?;
            let filtered: Vec<EventRecord> = events
                .into_iter()
                .filter(|e| lead_id.as_deref().map(|id| e.lead_id == id).unwrap_or(true))
                .collect();
            println!("{}", format_output(&filtered, &cli.format)?);
            Ok(())
        }

        Commands::List => {
            let (state, _) = load_or_create_state(&storage)?;
            let leads: Vec<LeadSummaryOutput> = state
                .leads_sorted()
                .into_iter()
                .map(|l| LeadSummaryOutput {
                    id: l.id.clone(),
                    name: l.contact.name.clone(),
                    category: l.category.clone(),
                    status: l.status.code().to_string(),
                    assignee: l.assignee.clone(),
                    updated_at: l.updated_at,
                })
                .collect();
            let output = LeadListOutput { leads };
            println!("{}", format_output(&output, &cli.format)?);
            Ok(())
        }

        Commands::Show { lead_id } => {
            let (state, _) = load_or_create_state(&storage)?;
            let lead = state.lead(&lead_id)?;
            println!("{}", format_output(lead, &cli.format)?);
            Ok(())
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct LeadSummaryOutput {
    id: String,
    name: String,
    category: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<String>,
    updated_at: i64,
}

#[derive(Debug, serde::Serialize)]
struct LeadListOutput {
    leads: Vec<LeadSummaryOutput>,
}
