use anyhow::{Context, Result};
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    fs::{self, File},
    io::{self, stdin},
    path::PathBuf,
};

use proctor::{
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore, ProctorConfig},
    exam::{ExamLoader, FileExamLoader},
    host::ExamApp,
    proctor::AnswerStore,
    report::{summarize, write_logs_csv},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::ExamSession,
    store::ProctorDb,
    submission::SubmissionClient,
};

/// proctored exam sessions in the terminal
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// take an exam from a JSON descriptor or a plain-text MCQ bank
    Run(RunArgs),
    /// print the integrity report of archived submissions
    Report(ReportArgs),
    /// show the effective configuration
    Config {
        /// write the defaults to the config file
        #[clap(long)]
        init: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// exam descriptor (.json) or question bank (.txt)
    path: PathBuf,

    /// prior submission snapshot to resume from
    #[clap(long)]
    prior: Option<PathBuf>,

    /// candidate identifier
    #[clap(short = 's', long)]
    student: Option<String>,

    /// duration in minutes for question banks
    #[clap(short = 'd', long, default_value_t = 30)]
    duration: u32,

    /// database file (defaults to the state directory)
    #[clap(long)]
    db: Option<PathBuf>,

    /// config file (defaults to the config directory)
    #[clap(long)]
    config: Option<PathBuf>,

    /// strikes before auto-submission
    #[clap(long)]
    threshold: Option<u8>,

    /// submit on the last keyboard strike too
    #[clap(long)]
    keyboard_auto_submit: bool,

    /// keep violation counters across restarts
    #[clap(long)]
    persist_violations: bool,
}

#[derive(Args, Debug)]
struct ReportArgs {
    exam_id: String,

    /// export cheating logs as CSV
    #[clap(long)]
    csv: Option<PathBuf>,

    #[clap(long)]
    db: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, cfg: &mut ProctorConfig) {
        if let Some(threshold) = self.threshold {
            cfg.strike_threshold = threshold;
        }
        if self.keyboard_auto_submit {
            cfg.keyboard_auto_submit = true;
        }
        if self.persist_violations {
            cfg.persist_violations = true;
        }
    }

    fn student_id(&self) -> String {
        self.student
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

fn open_db(path: Option<&PathBuf>) -> Result<ProctorDb> {
    let db = match path {
        Some(p) => ProctorDb::open(p),
        None => ProctorDb::open_default(),
    };
    db.context("opening the proctor database")
}

fn init_logging() -> Result<()> {
    let path = AppDirs::log_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Command::Run(args) => run(args),
        Command::Report(args) => report(args),
        Command::Config { init } => {
            let store = FileConfigStore::new();
            let cfg = store.load();
            if init {
                store.save(&cfg).context("writing config")?;
            }
            println!("{}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = args
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut cfg = store.load();
    args.apply(&mut cfg);

    let mut loader = FileExamLoader::new(&args.path).with_bank_duration(args.duration);
    if let Some(prior) = &args.prior {
        loader = loader.with_prior(prior);
    }
    let loaded = loader
        .load()
        .with_context(|| format!("loading exam {}", args.path.display()))?;

    let db = open_db(args.db.as_ref())?;
    let prior = match loaded.prior {
        Some(prior) => prior,
        None => db.load_answers(&loaded.exam.id)?,
    };

    let student = args.student_id();
    let mut session = ExamSession::new(loaded.exam, student, &cfg).resume(&prior);
    if cfg.persist_violations {
        if let Some(state) = db.load_violations(&session.exam().id, session.student_id())? {
            log::info!("rehydrating {} earlier violations", state.general_count);
            session = session.with_violations(state);
        }
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = ExamApp::new(session, &db, &db, (cfg.min_cols, cfg.min_rows));
    let result = start_tui(&mut terminal, &mut app);
    app.teardown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, S: AnswerStore, C: SubmissionClient>(
    terminal: &mut Terminal<B>,
    app: &mut ExamApp<S, C>,
) -> Result<()> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        if app.should_quit() {
            return Ok(());
        }
        let size = terminal.size()?;
        let event = runner.step();
        app.on_event(event, (size.width, size.height));
    }
}

fn report(args: ReportArgs) -> Result<()> {
    let db = open_db(args.db.as_ref())?;
    let submissions = db.submissions(&args.exam_id)?;
    if submissions.is_empty() {
        println!("no submissions for {}", args.exam_id);
        return Ok(());
    }
    print!("{}", summarize(&submissions));

    if let Some(path) = args.csv {
        let file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        write_logs_csv(&submissions, file)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::parse_from(["proctor", "run", "exam.json"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.path, PathBuf::from("exam.json"));
        assert_eq!(args.duration, 30);
        assert!(args.prior.is_none());
        assert!(!args.keyboard_auto_submit);
    }

    #[test]
    fn test_cli_run_overrides_config() {
        let cli = Cli::parse_from([
            "proctor",
            "run",
            "bank.txt",
            "--threshold",
            "5",
            "--keyboard-auto-submit",
            "-s",
            "alice",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut cfg = ProctorConfig::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.strike_threshold, 5);
        assert!(cfg.keyboard_auto_submit);
        assert!(!cfg.persist_violations);
        assert_eq!(args.student_id(), "alice");
    }

    #[test]
    fn test_cli_report_with_csv() {
        let cli = Cli::parse_from(["proctor", "report", "e1", "--csv", "out.csv"]);
        let Command::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.exam_id, "e1");
        assert_eq!(args.csv, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["proctor"]).is_err());
    }
}
