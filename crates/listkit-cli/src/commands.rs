use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use listkit_diff::{diff, diff_sections, EditScript};
use listkit_updater::{
    ApplyMode, InMemoryListView, ListUpdater, TransitionOutcome, UpdaterConfig, ViewCall,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::cli::*;
use crate::snapshot::{load_flat, load_sections, Item, ItemSection};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Diff(args) => cmd_diff(args, cli.format),
        Command::Simulate(args) => cmd_simulate(args, cli.format),
    }
}

fn cmd_diff(args: DiffArgs, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&diff_document(&args)?)?);
        return Ok(());
    }

    let ids = |items: &[Item]| items.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
    if args.sections {
        let before = load_sections(&args.before)?;
        let after = load_sections(&args.after)?;
        let script = diff_sections(&before, &after)?;

        let headers =
            |s: &[ItemSection]| s.iter().map(|s| s.header.id.clone()).collect::<Vec<_>>();
        print_script(&headers(&before), &headers(&after), &script.sections, "");
        for rows in script.rows.iter().filter(|r| r.script.has_changes()) {
            let id = &after[rows.to_section].header.id;
            println!("{} {}", "section".bold(), id.bold());
            print_script(
                &ids(&before[rows.from_section].items),
                &ids(&after[rows.to_section].items),
                &rows.script,
                "  ",
            );
        }
        println!("{} changes", script.change_count());
    } else {
        let before = load_flat(&args.before)?;
        let after = load_flat(&args.after)?;
        let script = diff(&before, &after)?;
        print_script(&ids(&before), &ids(&after), &script, "");
        println!("{} changes", script.change_count());
    }
    Ok(())
}

/// The edit script between the two files as JSON.
fn diff_document(args: &DiffArgs) -> anyhow::Result<Value> {
    let doc = if args.sections {
        let before = load_sections(&args.before)?;
        let after = load_sections(&args.after)?;
        serde_json::to_value(diff_sections(&before, &after)?)?
    } else {
        let before = load_flat(&args.before)?;
        let after = load_flat(&args.after)?;
        serde_json::to_value(diff(&before, &after)?)?
    };
    Ok(doc)
}

fn print_script(old: &[String], new: &[String], script: &EditScript<String>, indent: &str) {
    for &i in &script.deletes {
        println!("{indent}{} {} @{i}", "-".red().bold(), old[i].red());
    }
    for &i in &script.inserts {
        println!("{indent}{} {} @{i}", "+".green().bold(), new[i].green());
    }
    for m in &script.moves {
        println!(
            "{indent}{} {} {} -> {}",
            "~".yellow().bold(),
            old[m.from].yellow(),
            m.from,
            m.to
        );
    }
    for u in &script.updates {
        println!(
            "{indent}{} {} {} -> {}",
            "^".cyan().bold(),
            old[u.from].cyan(),
            u.from,
            u.to
        );
    }
}

fn cmd_simulate(args: SimulateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => UpdaterConfig::default(),
    };
    let snapshots = args
        .snapshots
        .iter()
        .map(|p| load_sections(p))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(simulate(snapshots, config))?;

    if format == OutputFormat::Json {
        let doc = json!({
            "outcomes": report
                .outcomes
                .iter()
                .map(|(step, o)| json!({ "step": step, "outcome": o }))
                .collect::<Vec<_>>(),
            "calls": report.calls,
            "consistent": report.consistent,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{}", "Transitions".bold());
    for (step, o) in &report.outcomes {
        let mode = match o.mode {
            ApplyMode::Batched => "batched".green(),
            ApplyMode::Reloaded(reason) => format!("reloaded ({reason})").yellow(),
        };
        let status = if o.applied { "✓".green() } else { "✗".red() };
        println!(
            "  step {step}: #{} {mode}, {} ops, {} coalesced {status}",
            o.generation, o.operations, o.coalesced
        );
    }
    println!("{}", "View calls".bold());
    for call in &report.calls {
        match call {
            ViewCall::Begin => println!("  begin_updates"),
            ViewCall::Apply(batch) => println!("  apply {batch}"),
            ViewCall::End { accepted } => println!(
                "  end_updates {}",
                if *accepted { "✓".green() } else { "rejected".red() }
            ),
            ViewCall::ReloadAll { sections, accepted } => println!(
                "  reload_all {sections} sections {}",
                if *accepted { "✓".green() } else { "failed".red() }
            ),
        }
    }
    if report.consistent {
        println!("{} view matches the final snapshot", "✓".green().bold());
    } else {
        println!("{} view differs from the final snapshot", "✗".red().bold());
    }
    Ok(())
}

struct Report {
    outcomes: Vec<(usize, TransitionOutcome)>,
    calls: Vec<ViewCall>,
    consistent: bool,
}

/// Submit every consecutive pair without yielding so the updater can
/// coalesce them, then collect one outcome per submission.
async fn simulate(
    snapshots: Vec<Vec<ItemSection>>,
    config: UpdaterConfig,
) -> anyhow::Result<Report> {
    let mut snapshots = snapshots.into_iter().map(Arc::new);
    let Some(initial) = snapshots.next() else {
        bail!("no snapshots given");
    };
    let view = Arc::new(InMemoryListView::with_sections(initial.as_ref().clone()));
    let updater: ListUpdater<Item, Item> = ListUpdater::with_config(view.clone(), config);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut previous = initial;
    let mut submitted = 0;
    for (step, next) in snapshots.enumerate() {
        let tx = tx.clone();
        updater.update(
            Arc::clone(&previous),
            Arc::clone(&next),
            Some(Box::new(move |outcome: &TransitionOutcome| {
                let _ = tx.send((step + 1, *outcome));
            })),
        )?;
        previous = next;
        submitted += 1;
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(submitted);
    while outcomes.len() < submitted {
        match rx.recv().await {
            Some(outcome) => outcomes.push(outcome),
            None => bail!("updater stopped after {} of {submitted} transitions", outcomes.len()),
        }
    }

    Ok(Report {
        outcomes,
        calls: view.calls(),
        consistent: view.sections() == *previous,
    })
}
