use clap::{Args, Parser, Subcommand, ValueEnum};
use recall_core::Calendar;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreKind {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CalendarKind {
    Utc,
    Local,
}

impl From<CalendarKind> for Calendar {
    fn from(k: CalendarKind) -> Self {
        match k {
            CalendarKind::Utc => Calendar::Utc,
            CalendarKind::Local => Calendar::Local,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(name = "recall", version, about = "Recall spaced-repetition CLI/TUI/API")]
pub struct Cli {
    /// Storage backend (applies to CLI/TUI/API)
    #[arg(long, value_enum, default_value_t = StoreKind::Json)]
    pub store: StoreKind,

    /// SQLite DB path when --store sqlite (defaults to app data dir)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Calendar used when adding whole days to due dates
    #[arg(long, value_enum, default_value_t = CalendarKind::Local)]
    pub calendar: CalendarKind,

    /// Debug-level logging (RUST_LOG still applies)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Subject operations
    #[command(subcommand)]
    Subject(SubjectCmd),
    /// Card operations
    #[command(subcommand)]
    Card(CardCmd),
    /// List cards due now
    Due(DueCmd),
    /// Interactive review session
    Review(ReviewCmd),
    /// Export data
    #[command(subcommand)]
    Export(ExportCmd),
    /// Import data
    #[command(subcommand)]
    Import(ImportCmd),
    /// Launch Terminal UI
    Tui(TuiCmd),
    /// Launch Axum HTTP API
    Api(ApiCmd),
}

#[derive(Debug, Subcommand, Clone)]
pub enum SubjectCmd {
    Add { name: String },
    List,
    Rm { subject: String },
}

#[derive(Debug, Subcommand, Clone)]
pub enum CardCmd {
    Add(CardAdd),
    List {
        #[arg(long)]
        subject: Option<String>,
        /// Case-insensitive text match on front/back
        #[arg(long)]
        query: Option<String>,
    },
    Rm {
        card_id: String,
    },
    Edit(CardEdit),
}

#[derive(Debug, Args, Clone)]
pub struct CardAdd {
    #[arg(long)]
    pub subject: String,
    #[arg(long)]
    pub front: String,
    #[arg(long)]
    pub back: String,
}

#[derive(Debug, Args, Clone)]
pub struct CardEdit {
    pub card_id: String,
    #[arg(long)]
    pub front: Option<String>,
    #[arg(long)]
    pub back: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct DueCmd {
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long)]
    pub max: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct ReviewCmd {
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long, default_value_t = 50)]
    pub max: usize,
    /// Stop on a failed save instead of moving on
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ExportCmd {
    Json {
        path: PathBuf,
    },
    Csv {
        path: PathBuf,
        #[arg(long)]
        subject: Option<String>,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum ImportCmd {
    Json {
        path: PathBuf,
    },
    Csv {
        path: PathBuf,
        #[arg(long)]
        subject: Option<String>,
    },
}

#[derive(Debug, Args, Clone)]
pub struct TuiCmd {
    #[arg(long, default_value_t = 50)]
    pub max: usize,
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ApiCmd {
    /// Bind address (host:port)
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
}
