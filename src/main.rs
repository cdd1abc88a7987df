use anyhow::Result;
use clap::Parser;
use sigaa_progress::{
    config::{DEFAULT_BASE_URL, DEFAULT_VINCULO},
    export, AffiliationMode, Credentials, Endpoints, ExportFormat, Progress, Report,
    SigaaPortalBuilder,
};
use std::{path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log into SIGAA and export the student's curriculum progress.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(short, long, env = "SIGAA_USERNAME")]
    username: String,
    #[arg(short, long, env = "SIGAA_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, env = "SIGAA_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Affiliation to pick when the account has more than one.
    #[arg(long, default_value = DEFAULT_VINCULO)]
    vinculo: String,
    /// When to submit the affiliation choice: auto, always or never.
    #[arg(long, default_value_t = AffiliationMode::Auto)]
    affiliation: AffiliationMode,
    #[arg(short, long, default_value = "instancia.json")]
    output: PathBuf,
    /// Export layout: table, records or csv.
    #[arg(short, long, default_value_t = ExportFormat::Table)]
    format: ExportFormat,
    /// Also write a Markdown summary of completed and pending components.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut builder = SigaaPortalBuilder::default();
    builder
        .credentials(Credentials::new(args.username, args.password))
        .endpoints(Endpoints::new(&args.base_url)?)
        .vinculo(args.vinculo)
        .affiliation(args.affiliation);
    if let Some(secs) = args.timeout {
        builder.timeout(Duration::from_secs(secs));
    }
    let portal = builder.build()?;

    let session = portal.session()?;
    session.login().await?;
    let data = session.fetch_components().await?;

    export::write(&data.disciplinas, args.format, &args.output)?;

    let progress = Progress::from_components(&data.disciplinas)?;
    info!(
        concluidas = progress.concluidas.len(),
        pendentes = progress.pendentes.len(),
        "categorized components"
    );
    if let Some(path) = args.report {
        Report::new(&data.disciplinas, &progress).write(&path)?;
    }

    Ok(())
}
