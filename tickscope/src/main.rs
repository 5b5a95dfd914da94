//! # tickscope - Main Entry Point
//!
//! Samples the threads of a running process through `/proc` until Ctrl-C,
//! the `--duration` deadline, or the target exiting, then prints a summary
//! and optionally writes the JSON report.

#![allow(clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tickscope::cli::Args;
use tickscope::export::{JsonFileSink, SamplerReport};
use tickscope::profiling::{ProcThreadSource, SamplerBuilder};
use tickscope::stats::ProcessStatistics;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

/// Root frames listed in the summary per thread group
const SUMMARY_TOP_FRAMES: usize = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    let source = ProcThreadSource::new(args.pid);
    let threads = source
        .list_threads()
        .with_context(|| format!("Cannot read threads of process {}", args.pid))?;

    let settings = args.sampler_settings()?;
    if !quiet {
        println!("tickscope v{}", env!("CARGO_PKG_VERSION"));
        println!(
            "sampling pid {} ({} threads) every {}",
            args.pid,
            threads.len(),
            settings.aggregator.interval
        );
    }

    let mut builder = SamplerBuilder::new(settings, Arc::new(source))
        .statistics(Arc::new(ProcessStatistics::new(args.pid)));
    if let Some(path) = &args.export {
        builder = builder.sink(JsonFileSink::new(path));
    }
    let sampler = builder.build()?;

    let started = Instant::now();
    sampler.start()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let proc_path = format!("/proc/{}", args.pid);
    let mut exit_reason = "interrupted";

    loop {
        if sampler.completion().is_some() {
            exit_reason = "duration limit reached";
            break;
        }
        if !std::path::Path::new(&proc_path).exists() {
            exit_reason = "process exited";
            break;
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = &mut ctrl_c => break,
        }
    }

    let completion = tokio::task::spawn_blocking(move || sampler.stop())
        .await
        .context("Sampler shutdown task failed")??;
    info!("Session ended: {}", completion.reason);

    if !quiet {
        eprintln!("\n{exit_reason}: {:.1}s", started.elapsed().as_secs_f64());
        print_summary(&completion.report);
        if let Some(path) = &args.export {
            println!("saved: {}", path.display());
        }
    }

    Ok(())
}

fn print_summary(report: &SamplerReport) {
    for thread in &report.threads {
        println!("{} ({:.1}ms)", thread.name, thread.time / 1_000.0);
        for node in thread.children.iter().take(SUMMARY_TOP_FRAMES) {
            let share = if thread.time > 0.0 {
                node.time / thread.time * 100.0
            } else {
                0.0
            };
            println!("  {:5.1}%  {}.{}", share, node.class_name, node.method_name);
        }
    }
}
