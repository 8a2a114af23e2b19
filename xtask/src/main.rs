use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the camfile workspace", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the workspace
    Build,
    /// Run the workspace tests
    Test,
    /// Run the camfile CLI, forwarding any extra arguments
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", what);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building workspace...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Test => {
            println!("Testing workspace...");
            cargo(&["test", "--workspace"], "Test")?;
        }
        Commands::Run { args } => {
            println!("Running camfile...");
            let mut full = vec!["run", "-p", "camfile-cli", "--"];
            full.extend(args.iter().map(String::as_str));
            cargo(&full, "Run")?;
        }
    }

    Ok(())
}
