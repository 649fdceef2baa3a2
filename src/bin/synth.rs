use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::path::PathBuf;

use ghoidc::{config::SynthConfig, StackError};

#[derive(Debug, Parser)]
#[command(name = "synth", about = "Render GitHub Actions OIDC roles as a CloudFormation template")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Synthesize the template described by a config file
  Template {
    /// Config file, falls back to SYNTH_CONFIG
    #[arg(env = "SYNTH_CONFIG")]
    config: PathBuf,
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
    /// Write to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
  },
  /// Print the JSON schema of the config file
  Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
  Json,
  Yaml,
}

fn main() -> anyhow::Result<()> {
  env_logger::init();

  match Cli::parse().command {
    Command::Template { config, format, out } => {
      let cfg = SynthConfig::from_path(&config)?;
      let stack = cfg
        .build()
        .with_context(|| format!("Failed to build stack from {}", config.display()))?;

      let rendered = match format {
        Format::Json => stack.to_json_string(),
        Format::Yaml => stack.to_yaml_string(),
      };
      let rendered = match rendered {
        Ok(r) => r,
        Err(StackError::Validation(errors)) => {
          for e in &errors {
            error!("{}", e.trim());
          }
          bail!("Stack {} has {} validation error(s)", stack.name(), errors.len());
        }
        Err(e) => return Err(e.into()),
      };

      match out {
        Some(path) => {
          std::fs::write(&path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
          info!("Wrote {}", path.display());
        }
        None => println!("{}", rendered),
      }
    }
    Command::Schema => {
      println!("{}", serde_json::to_string_pretty(&ghoidc::config::schema())?);
    }
  }

  Ok(())
}
