mod view;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use view::{ChannelView, ViewEvent};
use visit_presenter::{
    InMemorySource, PageState, PresenterContext, VisitPage, VisitsPresenter, VisitsView,
};
use visit_spec::{
    AssetDir, CachedConfigLoader, ConfigDocument, Expr, ExprEngine, FactSet, RelevanceEngine,
    StaticLabels, VisitRecord, VisitRenderer, config_schema, render_json, render_text,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Render paginated visit summaries from a YAML layout",
    long_about = "Renders one page of visit records through a YAML layout, checks layouts, and evaluates relevance expressions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Render one page of visits for a client.
    Render(RenderArgs),
    /// Parse a layout and its expressions without rendering anything.
    Check {
        /// Path to the YAML layout.
        #[arg(long, value_name = "CONFIG")]
        config: PathBuf,
        /// Print the layout back as normalized YAML.
        #[arg(long)]
        normalize: bool,
    },
    /// Print the JSON Schema of the layout format.
    Schema,
    /// Evaluate a relevance expression against ad-hoc facts.
    Eval {
        /// Expression to evaluate, e.g. `age > 18 && diagnosis != null`.
        #[arg(long = "expr", value_name = "EXPR")]
        expression: String,
        /// Fact as NAME=VALUE; repeatable.
        #[arg(long = "fact", value_name = "NAME=VALUE")]
        facts: Vec<String>,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Path to the YAML layout.
    #[arg(long, value_name = "CONFIG")]
    config: PathBuf,
    /// JSON array of visit records.
    #[arg(long, value_name = "RECORDS")]
    records: PathBuf,
    /// Client the records belong to.
    #[arg(long, default_value = "client")]
    entity: String,
    /// Page to show, counting from 1.
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Visits per page.
    #[arg(long, default_value_t = InMemorySource::DEFAULT_PAGE_SIZE)]
    page_size: usize,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// YAML map of label overrides (`label_id: text`).
    #[arg(long, value_name = "LABELS")]
    labels: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Render(args) => run_render(args).await,
        Command::Check { config, normalize } => run_check(&config, normalize),
        Command::Schema => run_schema(),
        Command::Eval { expression, facts } => run_eval(&expression, &facts),
    }
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides the default.
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_render(args: RenderArgs) -> CliResult<()> {
    let index = args
        .page
        .checked_sub(1)
        .ok_or("pages are numbered from 1")?;
    let records: Vec<VisitRecord> = serde_json::from_slice(&fs::read(&args.records)?)?;
    let labels = match &args.labels {
        Some(path) => StaticLabels::from_yaml(&fs::read(path)?)?,
        None => StaticLabels::english(),
    };
    let (root, config_name) = split_config_path(&args.config)?;

    let renderer = Arc::new(VisitRenderer::new(ExprEngine, labels));
    let context = PresenterContext::new(
        Arc::new(InMemorySource::new(args.page_size).with_records(&args.entity, records)),
        Arc::new(CachedConfigLoader::new(AssetDir::new(root))),
        Arc::clone(&renderer),
    )
    .with_config_name(config_name);

    let (view, mut events) = ChannelView::channel();
    let view: Arc<dyn VisitsView> = Arc::new(view);
    let presenter = VisitsPresenter::spawn(args.entity.as_str(), context, Arc::downgrade(&view));

    presenter.refresh_page_count();
    let (state, _) = wait_page_state(&mut events).await?;
    if state.total_pages > 0 && index >= state.total_pages {
        return Err(format!(
            "page {} is out of range ({} pages)",
            args.page, state.total_pages
        )
        .into());
    }

    presenter.load_page(index);
    let page = wait_visits(&mut events).await?;
    let (state, counter) = wait_page_state(&mut events).await?;
    presenter.detach();

    match args.format {
        OutputFormat::Text => print_text(&renderer, &page, state, counter),
        OutputFormat::Json => print_json(&renderer, &page, state, counter)?,
    }
    Ok(())
}

fn print_text(
    renderer: &VisitRenderer,
    page: &VisitPage,
    state: PageState,
    counter: Option<String>,
) {
    if page.rows.is_empty() {
        println!("No visits recorded.");
        return;
    }
    println!("{}", render_text(renderer, &page.rows));
    if let Some(counter) = counter.filter(|_| state.total_pages > 0) {
        println!();
        println!("{counter}");
    }
}

fn print_json(
    renderer: &VisitRenderer,
    page: &VisitPage,
    state: PageState,
    counter: Option<String>,
) -> CliResult<()> {
    let mut output = render_json(renderer, &page.rows);
    if let Some(map) = output.as_object_mut() {
        map.insert("page".into(), json!(page.page + 1));
        map.insert("total_pages".into(), json!(state.total_pages));
        map.insert("has_next".into(), json!(state.has_next()));
        map.insert("has_previous".into(), json!(state.has_previous()));
        map.insert("counter".into(), json!(counter));
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn next_event(events: &mut UnboundedReceiver<ViewEvent>) -> CliResult<ViewEvent> {
    events
        .recv()
        .await
        .ok_or_else(|| "presenter stopped before answering".into())
}

async fn wait_page_state(
    events: &mut UnboundedReceiver<ViewEvent>,
) -> CliResult<(PageState, Option<String>)> {
    loop {
        match next_event(events).await? {
            ViewEvent::PageState { state, counter } => return Ok((state, counter)),
            ViewEvent::Failed(message) => return Err(message.into()),
            ViewEvent::Visits(_) => continue,
        }
    }
}

async fn wait_visits(events: &mut UnboundedReceiver<ViewEvent>) -> CliResult<VisitPage> {
    loop {
        match next_event(events).await? {
            ViewEvent::Visits(page) => return Ok(page),
            ViewEvent::Failed(message) => return Err(message.into()),
            ViewEvent::PageState { .. } => continue,
        }
    }
}

/// Split a layout path into the asset directory and the file name inside it.
fn split_config_path(path: &Path) -> CliResult<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("{} does not name a file", path.display()))?;
    let root = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((root.to_path_buf(), name.to_string()))
}

fn run_check(config: &Path, normalize: bool) -> CliResult<()> {
    let document = ConfigDocument::parse(&fs::read(config)?)?;

    let mut invalid = 0;
    for field in document.entries.iter().flat_map(|entry| entry.fields()) {
        let expressions = [
            ("relevance", field.relevance.as_deref()),
            ("highlight", field.highlight.as_deref()),
        ];
        for (kind, expression) in expressions {
            if let Some(expression) = expression.filter(|text| !text.trim().is_empty())
                && let Err(err) = Expr::parse(expression)
            {
                eprintln!("field `{}` {kind}: {err}", field.key);
                invalid += 1;
            }
        }
    }
    if invalid > 0 {
        return Err(format!("{invalid} invalid expression(s) in {}", config.display()).into());
    }

    if normalize {
        print!("{}", document.to_yaml()?);
    } else {
        println!(
            "ok: {} entries, {} fields",
            document.entries.len(),
            document.field_count()
        );
    }
    Ok(())
}

fn run_schema() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&config_schema())?);
    Ok(())
}

fn run_eval(expression: &str, facts: &[String]) -> CliResult<()> {
    let facts = facts
        .iter()
        .map(|fact| {
            fact.split_once('=')
                .ok_or_else(|| format!("fact `{fact}` is not NAME=VALUE"))
        })
        .collect::<Result<FactSet, _>>()?;
    let holds = ExprEngine.evaluate(&facts, expression)?;
    println!("{holds}");
    Ok(())
}
