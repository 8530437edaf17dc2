use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::error;

use netbatch::{OutputMode, Task, TaskFile, XorHexCredentials};

/// Run a fixed list of commands over SSH on every device of a task
#[derive(Parser, Debug)]
#[command(name = "netbatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a fixed list of commands over SSH on a batch of devices", long_about = None)]
struct Cli {
    /// Path to the JSON task file
    task: PathBuf,

    /// Print the task summary and exit without connecting
    #[arg(long)]
    summary_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let task = match load_task(&cli.task) {
        Ok(task) => task,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    print_summary(&task);
    if cli.summary_only {
        return ExitCode::SUCCESS;
    }

    match netbatch::run_batch(&task).await {
        Ok(summary) => {
            println!("{}", summary);
            if summary.sink_errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!("batch aborted: {}", e);
            eprintln!("Error: {:#}", anyhow::Error::from(e));
            ExitCode::from(1)
        }
    }
}

fn load_task(path: &Path) -> anyhow::Result<Task> {
    let task = TaskFile::load(path)?
        .into_task(&XorHexCredentials)
        .with_context(|| format!("reading credentials from '{}'", path.display()))?;
    task.validate()?;
    Ok(task)
}

fn print_summary(task: &Task) {
    println!("Task:        {}", task.name);
    if !task.description.is_empty() {
        println!("Description: {}", task.description);
    }
    println!("User:        {}", task.credentials.username);
    println!("Superuser:   {}", if task.superuser() { "yes" } else { "no" });
    println!("Type:        {}", task.device_type);
    println!("Devices:     {}", task.devices.len());
    println!("Commands:    {}", task.commands.len());
    match &task.output {
        OutputMode::Stdout => println!("Output:      stdout"),
        OutputMode::SingleFile(dir) => println!("Output:      single file in {}", dir.display()),
        OutputMode::PerDevice(dir) => println!("Output:      one file per device in {}", dir.display()),
    }
    match &task.log_dir {
        Some(dir) => println!("Log:         {}", dir.display()),
        None => println!("Log:         stdout"),
    }
    println!();
}
