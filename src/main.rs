//! Command line front-end of the AWS cleanup workflow.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use cleanup_dispatch::{
    config::{Settings, load_settings},
    env,
    framework::{TokioClock, TriggerGate},
    github::{GitHubClient, HttpTransport},
    report::{
        archive::read_entry,
        parse_report,
        render::{HtmlRenderer, Page, render_page},
        table::render_results_table,
    },
    shutdown,
    workflow::{CleanupInputs, Progress, Session, TracingProgress, Update},
};
use parking_lot::Mutex;
use tokio_util::compat::TokioAsyncReadCompatExt as _;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Trigger an AWS cleanup workflow and render its report.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// A TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dispatch the workflow, wait for its run and render the report.
    Run(RunArgs),
    /// Render the report inside a local artifact archive.
    Render {
        /// The artifact zip.
        archive: PathBuf,
        /// The report file inside the archive.
        #[arg(long)]
        file: Option<String>,
        /// Write the page here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render a pipe-delimited results file as an HTML table.
    Table {
        /// The results file.
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    repo: Option<String>,
    /// The workflow file name or id.
    #[arg(long)]
    workflow: Option<String>,
    /// The branch or tag to run on.
    #[arg(long = "ref")]
    git_ref: Option<String>,
    /// A GitHub token; `GH_TOKEN` or `GITHUB_TOKEN` when omitted.
    #[arg(long)]
    token: Option<String>,
    /// `AWS_ACCESS_KEY_ID` when omitted.
    #[arg(long)]
    access_key_id: Option<String>,
    /// `AWS_SECRET_ACCESS_KEY` when omitted.
    #[arg(long)]
    secret_access_key: Option<String>,
    /// `AWS_REGION` when omitted.
    #[arg(long)]
    region: Option<String>,
    /// What the workflow should do.
    #[arg(long, default_value = "analyze")]
    action: String,
    /// Confirm destructive actions.
    #[arg(long)]
    confirm: bool,
    /// An extra workflow input, repeatable.
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    inputs: Vec<(String, String)>,
    /// The expected run name.
    #[arg(long)]
    run_name: Option<String>,
    /// The artifact holding the report.
    #[arg(long)]
    artifact: Option<String>,
    /// Write the page here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Also unpack the report artifact into this directory.
    #[arg(long)]
    extract_to: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) {
        let overrides = [
            (&mut settings.owner, &self.owner),
            (&mut settings.repo, &self.repo),
            (&mut settings.workflow, &self.workflow),
            (&mut settings.git_ref, &self.git_ref),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }
        if self.run_name.is_some() {
            settings.run_name.clone_from(&self.run_name);
        }
        if self.artifact.is_some() {
            settings.artifact_name.clone_from(&self.artifact);
        }
        if self.extract_to.is_some() {
            settings.extract_to.clone_from(&self.extract_to);
        }
    }

    fn inputs(&self) -> anyhow::Result<CleanupInputs> {
        fn pick(flag: Option<&String>, env: Option<&String>, name: &str) -> anyhow::Result<String> {
            flag.or(env)
                .cloned()
                .ok_or_else(|| anyhow!("missing {name}, pass it as a flag or set it in the environment"))
        }

        Ok(CleanupInputs {
            aws_access_key_id: pick(self.access_key_id.as_ref(), env::AWS_ACCESS_KEY_ID.as_ref(), "access key id")?,
            aws_secret_access_key: pick(
                self.secret_access_key.as_ref(),
                env::AWS_SECRET_ACCESS_KEY.as_ref(),
                "secret access key",
            )?,
            region: pick(self.region.as_ref(), env::AWS_REGION.as_ref(), "region")?,
            action: self.action.clone(),
            confirm: self.confirm,
            extra: self.inputs.iter().cloned().collect::<BTreeMap<_, _>>(),
        })
    }
}

fn parse_key_value(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim().to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {text:?}"))
}

/// Logs every update and keeps its status line for the page.
#[derive(Debug, Default)]
struct StatusLog {
    lines: Mutex<Vec<String>>,
}

impl StatusLog {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Progress for StatusLog {
    fn update(&self, update: &Update) {
        TracingProgress.update(update);
        self.lines.lock().push(update.to_string());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            let mut settings = load_settings(cli.config.as_deref())?;
            args.apply(&mut settings);

            tokio::select! {
                result = run(settings, &args) => result,
                () = shutdown::signal() => bail!("interrupted"),
            }
        }
        Command::Render { archive, file, out } => {
            let report_file = match file {
                Some(file) => file,
                None => load_settings(cli.config.as_deref())?.report_file,
            };
            let html = render_archive(&archive, &report_file).await?;
            emit(out.as_deref(), &html).await
        }
        Command::Table { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            emit(None, &render_results_table(&text)?).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(settings: Settings, args: &RunArgs) -> anyhow::Result<()> {
    let inputs = args.inputs()?;
    let token = args
        .token
        .clone()
        .or_else(|| env::GITHUB_TOKEN.clone())
        .context("missing GitHub token, pass --token or set GH_TOKEN")?;

    let transport = HttpTransport::new(token, settings.request_timeout())?;
    let client = GitHubClient::new(
        Arc::new(transport),
        settings.api_base.clone(),
        settings.owner.clone(),
        settings.repo.clone(),
    );
    let title = format!("{} on {}", settings.workflow, client.slug());
    let statuses = Arc::new(StatusLog::default());
    let session = Session::new(
        client,
        Arc::new(TokioClock),
        statuses.clone(),
        Arc::new(TriggerGate::new()),
        settings,
    );

    let result = session.run(&inputs).await;
    let lines = statuses.lines();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            emit(
                args.out.as_deref(),
                &render_page(&Page {
                    title: &title,
                    statuses: &lines,
                    ..Page::default()
                })?,
            )
            .await?;
            return Err(err.into());
        }
    };

    let report = HtmlRenderer::local().render(&outcome.report.entries)?;
    let html = render_page(&Page {
        title: &title,
        statuses: &lines,
        artifacts: &outcome.artifacts,
        report: Some(&report),
    })?;
    emit(args.out.as_deref(), &html).await
}

async fn render_archive(archive: &Path, report_file: &str) -> anyhow::Result<String> {
    let file = tokio::fs::File::open(archive)
        .await
        .with_context(|| format!("opening {}", archive.display()))?;
    let reader = futures::io::BufReader::new(file.compat());

    let content = read_entry(reader, report_file)
        .await
        .with_context(|| format!("reading {}", archive.display()))?
        .ok_or_else(|| anyhow!("expected file {report_file} not found in {}", archive.display()))?;
    let entries = parse_report(&content)?;
    if entries.is_empty() {
        warn!("{} lists no unused resources", archive.display());
    }

    let title = archive
        .file_name()
        .map_or_else(|| archive.display().to_string(), |name| name.to_string_lossy().into_owned());
    let report = HtmlRenderer::local().render(&entries)?;
    Ok(render_page(&Page {
        title: &title,
        report: Some(&report),
        ..Page::default()
    })?)
}

async fn emit(out: Option<&Path>, html: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            tokio::fs::write(path, html)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => print!("{html}"),
    }
    Ok(())
}
