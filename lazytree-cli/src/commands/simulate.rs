//! Simulate command - load a synthetic debugger session through the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use lazytree::config::ALL_LEVELS;
use lazytree::vtree::{ItemId, VirtualTree};
use lazytree::{
    init_logging, Element, ElementFilter, NullDisplay, Settings, SpawningContentProvider,
    TreeModelViewer, TreePath, UniformAdapters, UpdateRequest, ViewerUpdateListener,
};
use tracing::info;

use super::session::{DebugSession, HideNames, SessionShape};
use crate::error::CliError;

/// Upper bound on how long a simulation may take to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Number of threads in the session
    #[arg(long, default_value_t = 3)]
    pub threads: usize,

    /// Stack frames per thread
    #[arg(long, default_value_t = 4)]
    pub frames: usize,

    /// Variables per frame
    #[arg(long, default_value_t = 5)]
    pub variables: usize,

    /// Levels of fields under each variable
    #[arg(long, default_value_t = 1)]
    pub nesting: usize,

    /// Base latency of each answer, in milliseconds
    #[arg(long, default_value_t = 5)]
    pub delay_ms: u64,

    /// Levels to expand automatically (-1 for all); defaults to all unless the settings file sets a level
    #[arg(long, allow_hyphen_values = true)]
    pub expand_level: Option<i32>,

    /// Hide elements with this name (repeatable)
    #[arg(long = "hide", value_name = "NAME")]
    pub hide: Vec<String>,

    /// Reveal and select a path once loaded, e.g. thread-1/frame-2/var-0
    #[arg(long, value_name = "PATH")]
    pub navigate: Option<String>,

    /// Print the counters as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Skip printing the tree
    #[arg(long)]
    pub no_tree: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Counts update activity reported by the viewer.
#[derive(Debug, Default)]
struct ActivityCounter {
    bursts: AtomicUsize,
    updates: AtomicUsize,
}

impl ViewerUpdateListener for ActivityCounter {
    fn updates_begin(&self) {
        self.bursts.fetch_add(1, Ordering::Relaxed);
    }

    fn update_complete(&self, _update: &UpdateRequest) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Run the simulate command.
pub fn run(args: SimulateArgs, mut settings: Settings) -> Result<(), CliError> {
    if args.verbose {
        settings.logging.filter = "lazytree=debug,lazytree_cli=debug".to_string();
    }
    let _log_guard = init_logging(&settings.logging)?;

    if let Some(level) = args.expand_level {
        settings.viewer.auto_expand_level = level;
    } else if settings.viewer.auto_expand_level == 0 {
        settings.viewer.auto_expand_level = ALL_LEVELS;
    }
    if settings.viewer.columns.is_empty() {
        settings.viewer.columns = vec!["name".to_string(), "value".to_string()];
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lazytree-provider")
        .build()
        .map_err(|e| CliError::Simulation(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(simulate(args, settings))
}

async fn simulate(args: SimulateArgs, settings: Settings) -> Result<(), CliError> {
    let shape = SessionShape {
        threads: args.threads,
        frames: args.frames,
        variables: args.variables,
        nesting: args.nesting,
        delay: Duration::from_millis(args.delay_ms),
    };
    info!(?shape, expand_level = settings.viewer.auto_expand_level, "Starting simulation");

    let provider = Arc::new(SpawningContentProvider::on_current_runtime(Arc::new(
        DebugSession::new(shape),
    )));
    let adapters = UniformAdapters::new(provider.clone()).with_label_provider(provider);
    let quiet = settings.viewer.quiet_period;
    let mut viewer = TreeModelViewer::new(Arc::new(adapters), Box::new(NullDisplay), settings.viewer);

    let activity = Arc::new(ActivityCounter::default());
    viewer.add_update_listener(activity.clone());
    if !args.hide.is_empty() {
        let filter: Arc<dyn ElementFilter> = Arc::new(HideNames::new(args.hide.clone()));
        viewer.set_filters(vec![filter]);
    }

    let started = Instant::now();
    viewer.set_input(Element::new("debug-session"));
    settle(&mut viewer, quiet).await?;

    if let Some(target) = &args.navigate {
        let path = TreePath::from_names(target.split('/').filter(|s| !s.is_empty()));
        viewer.navigate(&path)?;
        settle(&mut viewer, quiet).await?;
    }
    let elapsed = started.elapsed();

    if !args.no_tree {
        print_tree(viewer.tree());
    }

    let metrics = viewer.metrics();
    if args.json {
        let json = serde_json::to_string_pretty(&metrics)
            .map_err(|e| CliError::Simulation(format!("failed to encode counters: {}", e)))?;
        println!("{}", json);
    } else {
        println!();
        println!("Settled in {:.1?}", elapsed);
        println!("  Items:          {}", viewer.tree().len());
        println!("  Scheduled:      {}", metrics.scheduled);
        println!("  Coalesced:      {}", metrics.coalesced);
        println!("  Provider calls: {}", metrics.provider_calls);
        println!("  Batching ratio: {:.2}", metrics.batching_ratio());
        println!("  Commits:        {}", metrics.commits);
        println!("  Filter passes:  {}", metrics.filter_passes);
        println!("  Failed:         {}", metrics.failed);
        println!(
            "  Busy periods:   {} ({} updates)",
            activity.bursts.load(Ordering::Relaxed),
            activity.updates.load(Ordering::Relaxed)
        );
        let selection: Vec<String> = viewer.selection().iter().map(|p| p.to_string()).collect();
        if !selection.is_empty() {
            println!("  Selected:       {}", selection.join(", "));
        }
    }

    viewer.dispose();
    Ok(())
}

async fn settle(viewer: &mut TreeModelViewer, quiet: Duration) -> Result<(), CliError> {
    tokio::time::timeout(SETTLE_TIMEOUT, viewer.run_until_idle(quiet))
        .await
        .map_err(|_| {
            CliError::Simulation(format!(
                "viewer did not settle within {:?}",
                SETTLE_TIMEOUT
            ))
        })
}

/// Prints the realized part of the tree, one item per line.
fn print_tree(tree: &VirtualTree) {
    println!("debug-session");
    print_children(tree, tree.root(), 1);
}

fn print_children(tree: &VirtualTree, id: ItemId, depth: usize) {
    let Some(item) = tree.item(id) else {
        return;
    };
    if !item.is_expanded() {
        return;
    }
    for (_, child_id) in item.children() {
        let Some(child) = tree.item(child_id) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        let marker = if tree.is_selected(child_id) { "*" } else { " " };
        let line = match child.label() {
            Some(label) => label
                .columns
                .iter()
                .filter_map(|column| column.text.as_deref())
                .collect::<Vec<_>>()
                .join(" = "),
            None => child
                .data()
                .map(|element| element.name().to_string())
                .unwrap_or_else(|| "…".to_string()),
        };
        println!("{}{}{}", indent, marker, line);
        print_children(tree, child_id, depth + 1);
    }
}
