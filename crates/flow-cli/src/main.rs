use clap::{Parser, Subcommand};
use flow_core::display::{or_unassigned, NO_EMAIL};
use flow_core::{
    sync_interval_from_env_value, FlowConfig, FlowPatient, FlowStore, PatientId, Stage,
    DEFAULT_FLOW_DATA_DIR, DEFAULT_SLOT_NAME,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Patient flow tracker CLI")]
struct Cli {
    /// Directory holding the flow slot (overrides FLOW_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List patients, newest registration first
    List {
        /// Only show patients at this stage
        #[arg(long)]
        stage: Option<Stage>,
    },
    /// Show one patient with full history
    Show {
        /// Patient id
        id: PatientId,
    },
    /// Register a new patient at reception
    Register {
        /// Patient name
        name: String,
        /// Contact email (optional)
        #[arg(long)]
        email: Option<String>,
    },
    /// Move a patient to another stage
    Move {
        /// Patient id
        id: PatientId,
        /// Target stage
        stage: Stage,
        /// Action to record in the history
        action: String,
        /// Free-text notes (optional)
        #[arg(long)]
        notes: Option<String>,
    },
    /// Route a patient to a consultation department
    Department {
        /// Patient id
        id: PatientId,
        /// Department name
        department: String,
    },
    /// Assign a doctor
    Doctor {
        /// Patient id
        id: PatientId,
        /// Doctor name
        doctor: String,
    },
    /// Record a test result
    Test {
        /// Patient id
        id: PatientId,
        /// Result text
        result: String,
    },
    /// Record a prescription
    Prescribe {
        /// Patient id
        id: PatientId,
        /// Prescription text
        prescription: String,
    },
    /// List the stage vocabulary
    Stages,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'flow --help' for commands");
        return Ok(());
    };

    if let Commands::Stages = command {
        for stage in Stage::ALL {
            let marker = if stage.is_terminal() { " (terminal)" } else { "" };
            println!("{:<14} {}{}", stage.as_str(), stage.label(), marker);
        }
        return Ok(());
    }

    let store = FlowStore::open(&config_from_env(cli.data_dir)?)?;

    match command {
        Commands::List { stage } => {
            let patients = match stage {
                Some(stage) => store.by_stage(stage)?,
                None => store.get_all()?,
            };
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in &patients {
                    print_summary(patient);
                }
            }
        }
        Commands::Show { id } => match store.get(&id)? {
            Some(patient) => print_detail(&patient),
            None => eprintln!("No patient with ID: {}", id),
        },
        Commands::Register { name, email } => {
            let patient = store.register_at_reception(&name, email.as_deref())?;
            println!("Registered patient with ID: {}", patient.id());
        }
        Commands::Move {
            id,
            stage,
            action,
            notes,
        } => report(id, store.move_stage(&id, stage, &action, notes.as_deref())?),
        Commands::Department { id, department } => report(
            id,
            store.assign_consultation_department(&id, &department)?,
        ),
        Commands::Doctor { id, doctor } => report(id, store.assign_doctor(&id, &doctor)?),
        Commands::Test { id, result } => report(id, store.add_test_result(&id, &result)?),
        Commands::Prescribe { id, prescription } => {
            report(id, store.add_prescription(&id, &prescription)?)
        }
        Commands::Stages => {}
    }

    Ok(())
}

fn config_from_env(data_dir: Option<PathBuf>) -> Result<FlowConfig, Box<dyn std::error::Error>> {
    let data_dir = data_dir
        .or_else(|| std::env::var("FLOW_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FLOW_DATA_DIR));
    let slot_name = std::env::var("FLOW_SLOT_NAME").unwrap_or_else(|_| DEFAULT_SLOT_NAME.into());
    let sync_interval = sync_interval_from_env_value(std::env::var("FLOW_SYNC_INTERVAL_MS").ok())?;

    Ok(FlowConfig::new(data_dir, slot_name, sync_interval)?)
}

fn report(id: PatientId, updated: Option<FlowPatient>) {
    match updated {
        Some(patient) => print_summary(&patient),
        None => eprintln!("No patient with ID: {}; nothing changed", id),
    }
}

fn print_summary(patient: &FlowPatient) {
    println!(
        "ID: {}, Name: {}, Stage: {}, Department: {}, Doctor: {}",
        patient.id(),
        patient.name(),
        patient.current_stage().label(),
        or_unassigned(patient.consultation_department()),
        or_unassigned(patient.assigned_doctor()),
    );
}

fn print_detail(patient: &FlowPatient) {
    print_summary(patient);

    let email = patient
        .email()
        .map(|e| e.to_string())
        .unwrap_or_else(|| NO_EMAIL.into());
    println!("Email: {}", email);

    if patient.tests().len() > 0 {
        println!("Tests:");
        for test in patient.tests() {
            println!("  - {}", test);
        }
    }
    if patient.prescriptions().len() > 0 {
        println!("Prescriptions:");
        for prescription in patient.prescriptions() {
            println!("  - {}", prescription);
        }
    }

    println!("History:");
    for event in patient.history() {
        match event.notes() {
            Some(notes) => println!(
                "  {} [{}] {} ({})",
                event.timestamp().to_rfc3339(),
                event.stage().label(),
                event.action(),
                notes
            ),
            None => println!(
                "  {} [{}] {}",
                event.timestamp().to_rfc3339(),
                event.stage().label(),
                event.action()
            ),
        }
    }
}
