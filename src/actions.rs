use anyhow::{bail, Context, Result};
use flowsphere::{
    fs::{open_file, open_inputs},
    interact::{PresetInput, SystemBrowser, TerminalInput},
    transport::UreqTransport,
    Config, NodeOutcome, RunReport, SequenceRunner,
};
use std::{collections::HashMap, process};

pub fn action_run(c: &seahorse::Context) {
    let configs = load(&c.args).unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        process::exit(1);
    });
    init_logger(configs.iter().any(|(_, config)| config.enable_debug));

    let answers = match c.string_flag("inputs") {
        Ok(path) => Some(open_inputs(&path).unwrap_or_else(|e| {
            eprintln!("Error: {:?}", e);
            process::exit(1);
        })),
        Err(_) => None,
    };
    let open_browser = !c.bool_flag("no-browser");

    // One run per file, one after another, so prompts never interleave.
    for (path, config) in &configs {
        match process(config, answers.clone(), open_browser)
            .with_context(|| format!("Sequence {} failed", path))
        {
            Ok(report) => print_report(&report),
            Err(e) => {
                eprintln!("Error: {:?}", e);
                process::exit(1);
            }
        }
    }
}

fn load(paths: &[String]) -> Result<Vec<(String, Config)>> {
    if paths.is_empty() {
        bail!("No config files given.")
    }
    paths
        .iter()
        .map(|p| -> Result<(String, Config)> { Ok((p.clone(), open_file(p)?)) })
        .collect()
}

fn init_logger(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_module("flowsphere", log::LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn process(
    config: &Config,
    answers: Option<HashMap<String, String>>,
    open_browser: bool,
) -> Result<RunReport> {
    let mut runner = SequenceRunner::new(UreqTransport::new());
    runner = match answers {
        Some(a) => runner.with_inputs(PresetInput::new(a)),
        None => runner.with_inputs(TerminalInput),
    };
    if open_browser {
        runner = runner.with_browser(SystemBrowser);
    }
    Ok(runner.run(config)?)
}

fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match outcome {
            NodeOutcome::Executed { id, status } => {
                println!("\x1b[32mName\x1b[m: \x1b[35m{}\x1b[m ({})", id, status);
                println!();
                if let Some(res) = report.responses.get(id) {
                    println!("\x1b[34mResponse\x1b[m: \x1b[36m{}\x1b[m", res.body);
                    println!();
                }
            }
            NodeOutcome::Skipped { id } => {
                println!("\x1b[33mSkipped\x1b[m: \x1b[35m{}\x1b[m", id);
                println!();
            }
        }
    }
}
