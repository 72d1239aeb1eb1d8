//! `dentalscope` command-line front end.
//!
//! Every subcommand maps to one service call (or a poll) and prints JSON on
//! stdout. Logs go to stderr so output stays pipeable.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use time::Date;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dentalscope::config::ConfigError;
use dentalscope::models::auth::{PasswordResetConfirm, RegisterRequest};
use dentalscope::models::{
    DiagnosisId, PatientCreate, PatientId, PatientUpdate, ProfileUpdate, RecordCreate, RecordId, RecordUpdate,
    high_risk_count, parse_date, today,
};
use dentalscope::overlay::{Size, map_boxes, to_percent};
use dentalscope::poll::{PollState, spawn_poll};
use dentalscope::services::records::RecordQuery;
use dentalscope::services::storage::AvatarStorage;
use dentalscope::session::{FileSessionStore, SessionError};
use dentalscope::table::{PatientFilter, PatientRow, Pagination, SortKey, SortOrder};
use dentalscope::{ApiClient, ApiError, AuthContext, ClientConfig};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Poll(String),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not read from stdin: {0}")]
    Stdin(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "dentalscope", about = "Patient records and AI caries diagnosis from the command line")]
struct Cli {
    /// Backend base URL; overrides DENTALSCOPE_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Auth(AuthCommand),
    #[command(subcommand)]
    Patient(PatientCommand),
    #[command(subcommand)]
    Record(RecordCommand),
    /// Upload a radiograph for analysis.
    Scan(ScanArgs),
    #[command(subcommand)]
    Diagnosis(DiagnosisCommand),
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Dashboard(DashboardCommand),
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Subcommand, Debug)]
enum AuthCommand {
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "DENTALSCOPE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        password2: String,
    },
    /// Email a password-reset link.
    ResetRequest {
        #[arg(long)]
        email: String,
    },
    /// Set a new password using the token from the reset link.
    ResetConfirm {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        password2: String,
    },
    Logout,
    Status,
}

#[derive(Subcommand, Debug)]
enum PatientCommand {
    List(PatientListArgs),
    Get { id: PatientId },
    Create(PatientFields),
    /// Change only the given fields.
    Update {
        id: PatientId,
        #[command(flatten)]
        fields: PatientPatch,
    },
    /// Replace every field.
    Replace {
        id: PatientId,
        #[command(flatten)]
        fields: PatientFields,
    },
    Delete { id: PatientId },
    Records {
        id: PatientId,
        #[arg(long)]
        record_type: Option<String>,
    },
}

#[derive(Args, Debug)]
struct PatientListArgs {
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    min_age: Option<u32>,
    #[arg(long)]
    max_age: Option<u32>,
    /// first_name, last_name, date_of_birth or last_visit.
    #[arg(long)]
    sort_by: Option<SortKey>,
    #[arg(long)]
    order: Option<SortOrder>,
    /// Render a paginated text table instead of JSON.
    #[arg(long)]
    table: bool,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = dentalscope::table::DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

#[derive(Args, Debug)]
struct PatientFields {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long, value_parser = parse_day)]
    dob: Date,
    #[arg(long)]
    gender: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

impl PatientFields {
    fn into_create(self) -> PatientCreate {
        let mut create = PatientCreate::new(&self.first_name, &self.last_name, self.dob, &self.gender);
        create.email = self.email;
        create.phone = self.phone;
        create.address = self.address;
        create
    }
}

#[derive(Args, Debug)]
struct PatientPatch {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long, value_parser = parse_day)]
    dob: Option<Date>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
}

impl From<PatientPatch> for PatientUpdate {
    fn from(p: PatientPatch) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            date_of_birth: p.dob,
            gender: p.gender,
            email: p.email,
            phone: p.phone,
            address: p.address,
            ..Self::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum RecordCommand {
    List {
        #[arg(long)]
        patient: Option<PatientId>,
        #[arg(long)]
        record_type: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        order: Option<SortOrder>,
    },
    Get { id: RecordId },
    Create(RecordFields),
    Update {
        id: RecordId,
        #[command(flatten)]
        fields: RecordPatch,
    },
    Replace {
        id: RecordId,
        #[command(flatten)]
        fields: RecordFields,
    },
    Delete { id: RecordId },
}

#[derive(Args, Debug)]
struct RecordFields {
    #[arg(long)]
    patient: PatientId,
    #[arg(long, default_value = "general")]
    record_type: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    prescription: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, value_parser = parse_day)]
    visit_date: Option<Date>,
    #[arg(long, value_parser = parse_day)]
    follow_up_date: Option<Date>,
}

impl RecordFields {
    fn into_create(self) -> RecordCreate {
        let mut create = RecordCreate::new(self.patient, &self.record_type, &self.title);
        create.description = self.description;
        create.diagnosis = self.diagnosis;
        create.prescription = self.prescription;
        create.notes = self.notes;
        create.visit_date = self.visit_date;
        create.follow_up_date = self.follow_up_date;
        create
    }
}

#[derive(Args, Debug)]
struct RecordPatch {
    #[arg(long)]
    record_type: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    prescription: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, value_parser = parse_day)]
    visit_date: Option<Date>,
    #[arg(long, value_parser = parse_day)]
    follow_up_date: Option<Date>,
}

impl From<RecordPatch> for RecordUpdate {
    fn from(p: RecordPatch) -> Self {
        Self {
            record_type: p.record_type,
            title: p.title,
            description: p.description,
            diagnosis: p.diagnosis,
            prescription: p.prescription,
            notes: p.notes,
            visit_date: p.visit_date,
            follow_up_date: p.follow_up_date,
        }
    }
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[arg(long)]
    patient: PatientId,
    image: PathBuf,
    /// Keep polling until the analysis finishes.
    #[arg(long)]
    watch: bool,
}

#[derive(Subcommand, Debug)]
enum DiagnosisCommand {
    Get { id: DiagnosisId },
    List,
    Delete { id: DiagnosisId },
    /// Poll until the analysis completes or fails.
    Watch { id: DiagnosisId },
    /// Explainability heat-map.
    Explain {
        id: DiagnosisId,
        #[arg(long)]
        quick: bool,
    },
    /// Lesion boxes mapped onto a displayed image size.
    Overlay {
        id: DiagnosisId,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        /// Natural image size, when the backend does not report it.
        #[arg(long, requires = "natural_height")]
        natural_width: Option<f64>,
        #[arg(long, requires = "natural_width")]
        natural_height: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    Update(ProfilePatch),
    /// Upload a new avatar image.
    Avatar { image: PathBuf },
}

#[derive(Args, Debug)]
struct ProfilePatch {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    office_location: Option<String>,
    #[arg(long)]
    role: Option<String>,
    #[arg(long)]
    education: Option<String>,
    #[arg(long)]
    bio: Option<String>,
}

impl From<ProfilePatch> for ProfileUpdate {
    fn from(p: ProfilePatch) -> Self {
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            phone: p.phone,
            office_location: p.office_location,
            role: p.role,
            education: p.education,
            bio: p.bio,
            avatar_url: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum DashboardCommand {
    Stats,
    Activity {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

fn parse_day(raw: &str) -> Result<Date, String> {
    parse_date(raw)
}

// =============================================================================
// ENTRY
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Api(e)) if e.is_session_expired() => {
            eprintln!("{} Run `dentalscope auth login --email <email>`.", e.user_message());
            ExitCode::from(2)
        }
        Err(CliError::Api(e)) => {
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let override_url = cli.api_url;
    let config = ClientConfig::from_lookup(|key| match (key, &override_url) {
        ("DENTALSCOPE_API_URL", Some(url)) => Some(url.clone()),
        _ => std::env::var(key).ok(),
    })?;
    let store = FileSessionStore::new(config.session_path()?);
    let auth = AuthContext::load(store)?.on_invalidate(|| info!("session cleared; sign in again to continue"));
    let client = ApiClient::new(&config, Arc::new(auth))?;

    match cli.command {
        Command::Auth(cmd) => run_auth(&client, cmd).await,
        Command::Patient(cmd) => run_patient(&client, cmd).await,
        Command::Record(cmd) => run_record(&client, cmd).await,
        Command::Scan(args) => run_scan(&client, &config, args).await,
        Command::Diagnosis(cmd) => run_diagnosis(&client, &config, cmd).await,
        Command::Profile(cmd) => run_profile(&client, &config, cmd).await,
        Command::Dashboard(cmd) => run_dashboard(&client, cmd).await,
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn run_auth(client: &ApiClient, cmd: AuthCommand) -> Result<(), CliError> {
    match cmd {
        AuthCommand::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => read_stdin_line()?,
            };
            client.login(&email, &password).await?;
            print_json(&serde_json::json!({ "signed_in": true }))
        }
        AuthCommand::Register { username, email, password, password2 } => {
            let notice = client.register(&RegisterRequest { username, email, password, password2 }).await?;
            print_json(&serde_json::json!({ "registered": true, "message": notice.message }))
        }
        AuthCommand::ResetRequest { email } => {
            let notice = client.request_password_reset(&email).await?;
            print_json(&serde_json::json!({ "requested": true, "message": notice.message }))
        }
        AuthCommand::ResetConfirm { token, password, password2 } => {
            let notice = client.confirm_password_reset(&token, &PasswordResetConfirm { password, password2 }).await?;
            print_json(&serde_json::json!({ "reset": true, "message": notice.message }))
        }
        AuthCommand::Logout => {
            client.logout().await;
            print_json(&serde_json::json!({ "signed_in": false }))
        }
        AuthCommand::Status => print_json(&serde_json::json!({ "signed_in": client.auth().is_authenticated() })),
    }
}

async fn run_patient(client: &ApiClient, cmd: PatientCommand) -> Result<(), CliError> {
    match cmd {
        PatientCommand::List(args) => list_patients(client, args).await,
        PatientCommand::Get { id } => print_json(&client.get_patient(id).await?),
        PatientCommand::Create(fields) => print_json(&client.create_patient(&fields.into_create()).await?),
        PatientCommand::Update { id, fields } => print_json(&client.update_patient(id, &fields.into()).await?),
        PatientCommand::Replace { id, fields } => {
            print_json(&client.replace_patient(id, &fields.into_create()).await?)
        }
        PatientCommand::Delete { id } => {
            client.delete_patient(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        PatientCommand::Records { id, record_type } => {
            print_json(&client.patient_records(id, record_type.as_deref()).await?)
        }
    }
}

async fn list_patients(client: &ApiClient, args: PatientListArgs) -> Result<(), CliError> {
    let filter = PatientFilter {
        search: args.search,
        min_age: args.min_age,
        max_age: args.max_age,
        sort_by: args.sort_by,
        order: args.order,
    };
    filter.validate()?;
    let patients = client.list_patients(&filter.to_query()).await?;
    if !args.table {
        return print_json(&patients);
    }

    // The backend may ignore some filters; apply them again locally.
    let today = today();
    let rows: Vec<PatientRow> =
        filter.apply(&patients, today).into_iter().map(|p| PatientRow::from_patient(p, today)).collect();
    let mut pages = Pagination::new(args.page_size)?;
    pages.set_page(args.page, rows.len());

    println!("{:<7} {:<24} {:>4}  {:<8} {:<11} {}", "ID", "NAME", "AGE", "GENDER", "LAST VISIT", "RISK");
    for row in pages.slice(&rows) {
        println!(
            "{:<7} {:<24} {:>4}  {:<8} {:<11} {}",
            row.id,
            row.name,
            row.age,
            row.gender,
            row.last_visit.as_deref().unwrap_or("-"),
            row.risk
        );
    }
    println!("{}  page {}/{}", pages.range_label(rows.len()), pages.page(), pages.total_pages(rows.len()));
    Ok(())
}

async fn run_record(client: &ApiClient, cmd: RecordCommand) -> Result<(), CliError> {
    match cmd {
        RecordCommand::List { patient, record_type, search, sort_by, order } => {
            let query = RecordQuery { patient, record_type, search, sort_by, order };
            print_json(&client.list_records(&query).await?)
        }
        RecordCommand::Get { id } => print_json(&client.get_record(id).await?),
        RecordCommand::Create(fields) => print_json(&client.create_record(&fields.into_create()).await?),
        RecordCommand::Update { id, fields } => print_json(&client.update_record(id, &fields.into()).await?),
        RecordCommand::Replace { id, fields } => print_json(&client.replace_record(id, &fields.into_create()).await?),
        RecordCommand::Delete { id } => {
            client.delete_record(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

async fn run_scan(client: &ApiClient, config: &ClientConfig, args: ScanArgs) -> Result<(), CliError> {
    let diagnosis = client.upload_scan(args.patient, &args.image).await?;
    if args.watch && !diagnosis.is_terminal() {
        return watch(client, config, diagnosis.id).await;
    }
    print_json(&diagnosis)
}

async fn run_diagnosis(client: &ApiClient, config: &ClientConfig, cmd: DiagnosisCommand) -> Result<(), CliError> {
    match cmd {
        DiagnosisCommand::Get { id } => print_json(&client.get_diagnosis(id).await?),
        DiagnosisCommand::List => print_json(&client.list_diagnoses().await?),
        DiagnosisCommand::Delete { id } => {
            client.delete_diagnosis(id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        DiagnosisCommand::Watch { id } => watch(client, config, id).await,
        DiagnosisCommand::Explain { id, quick } => {
            let explanation = if quick { client.quick_explain(id).await? } else { client.explain(id).await? };
            print_json(&explanation)
        }
        DiagnosisCommand::Overlay { id, width, height, natural_width, natural_height } => {
            let diagnosis = client.get_diagnosis(id).await?;
            let natural = match (natural_width, natural_height) {
                (Some(w), Some(h)) => Some(Size::new(w, h)),
                _ => Size::of_diagnosis(&diagnosis),
            };
            let lesions = diagnosis.visible_lesions();
            let percent: Vec<_> = natural
                .map(|n| lesions.iter().filter_map(|l| to_percent(l, n)).collect())
                .unwrap_or_default();
            print_json(&serde_json::json!({
                "diagnosis": id,
                "status": diagnosis.status,
                "natural": natural,
                "displayed": Size::new(width, height),
                "boxes": map_boxes(lesions, natural, Some(Size::new(width, height))),
                "percent": percent,
            }))
        }
    }
}

/// Poll until finished or Ctrl-C, logging each observed state.
async fn watch(client: &ApiClient, config: &ClientConfig, id: DiagnosisId) -> Result<(), CliError> {
    let handle = spawn_poll(Arc::new(client.clone()), id, config.poll);
    let mut updates = handle.subscribe();
    let outcome = loop {
        let state = updates.borrow_and_update().clone();
        if state.is_finished() {
            break state;
        }
        if !matches!(state, PollState::Starting) {
            info!(%id, state = state.label(), "diagnosis update");
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break handle.state();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break handle.state();
            }
        }
    };

    match outcome {
        PollState::Completed(d) | PollState::Failed(d) => print_json(&d),
        PollState::Error { message, session_expired: true, .. } => Err(ApiError::Unauthorized { message }.into()),
        PollState::Error { message, .. } => Err(CliError::Poll(message)),
        other => print_json(&serde_json::json!({ "diagnosis": id, "state": other.label() })),
    }
}

async fn run_profile(client: &ApiClient, config: &ClientConfig, cmd: ProfileCommand) -> Result<(), CliError> {
    match cmd {
        ProfileCommand::Show => print_json(&client.get_profile().await?),
        ProfileCommand::Update(patch) => print_json(&client.update_profile(&patch.into()).await?),
        ProfileCommand::Avatar { image } => {
            let storage = AvatarStorage::from_config(config)?;
            let profile = client.get_profile().await?;
            let user = profile
                .id
                .ok_or_else(|| ApiError::Decode("profile response carries no user id".to_owned()))?;
            print_json(&client.set_avatar(&storage, user, &image).await?)
        }
    }
}

async fn run_dashboard(client: &ApiClient, cmd: DashboardCommand) -> Result<(), CliError> {
    match cmd {
        DashboardCommand::Stats => {
            let stats = client.dashboard_stats().await?;
            let high_risk = high_risk_count(&stats.recent_patients, today());
            print_json(&serde_json::json!({ "stats": stats, "recent_high_risk": high_risk }))
        }
        DashboardCommand::Activity { days } => print_json(&client.scans_activity(days).await?),
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn read_stdin_line() -> Result<String, CliError> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
