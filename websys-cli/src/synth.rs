// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! The `synth` and `validate` subcommands.

use crate::args;
use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use websys::prelude::*;

fn spec_arg() -> Arg<'static> {
    Arg::new("spec")
        .short('s')
        .long("spec")
        .value_name("FILE")
        .help("Sets the path to the service spec")
        .required(true)
        .takes_value(true)
}

fn schema_arg() -> Arg<'static> {
    Arg::new("schema")
        .long("schema")
        .value_name("FILE")
        .help("Validates against a custom JSON schema instead of the built-in one")
        .takes_value(true)
}

pub fn command_args() -> Command<'static> {
    Command::new("synth")
        .about("Synthesizes a service spec into a resource plan")
        .arg(spec_arg())
        .arg(schema_arg())
        .args(args::get_env_args())
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Writes the plan to a file instead of stdout")
                .takes_value(true),
        )
        .arg(
            Arg::new("dry run")
                .long("dry-run")
                .help("Logs the planned resources instead of writing the plan")
                .conflicts_with("output")
                .takes_value(false),
        )
        .arg(
            Arg::new("root path")
                .short('r')
                .long("root-path")
                .value_name("DIR")
                .help("Sets the directory relative code and policy paths are resolved against")
                .takes_value(true),
        )
        .arg(
            Arg::new("repository token")
                .long("repository-token")
                .value_name("TOKEN")
                .env("WEBSYS_REPOSITORY_TOKEN")
                .hide_env_values(true)
                .help("Sets the access token front-end apps check out their repository with")
                .takes_value(true),
        )
}

pub fn validate_args() -> Command<'static> {
    Command::new("validate")
        .about("Checks a service spec against the schema without building it")
        .arg(spec_arg())
        .arg(schema_arg())
        .args(args::get_env_args())
}

/// Reads the flags every subcommand shares into synthesis options.
fn options(matches: &ArgMatches) -> Result<SynthOptions> {
    let account = matches
        .value_of("account")
        .ok_or_else(|| anyhow!("no AWS account: pass --account or set CDK_DEFAULT_ACCOUNT"))?;
    let region = matches
        .value_of("region")
        .unwrap_or_else(|| WEBSYS_DEFAULT_REGION.as_str());

    let mut options = SynthOptions::new(DeployEnv::new(account, region));
    options.branch = matches.value_of("branch").map(str::to_owned);
    if let Some(path) = matches.value_of("schema") {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema {}", path))?;
        options.schema = Some(serde_json::from_str(&text)?);
    }
    Ok(options)
}

fn read_spec(matches: &ArgMatches) -> Result<String> {
    let path = matches
        .value_of("spec")
        .ok_or_else(|| anyhow!("no spec file provided"))?;
    fs::read_to_string(path).with_context(|| format!("failed to read spec {}", path))
}

/// Synthesizes the spec and writes its plan as JSON.
pub async fn command(matches: &ArgMatches) -> Result<()> {
    let raw = read_spec(matches)?;
    let mut options = options(matches)?;
    options.root_path = matches.value_of("root path").map(PathBuf::from);
    options.repository_token = matches.value_of("repository token").map(str::to_owned);

    let lookup = AwsLayerVersionLookup::try_new(&options.env.region)?;
    let output = synthesize(&raw, &options, &lookup).await?;

    if matches.is_present("dry run") {
        let mut sink = LogSink::new();
        output.plan.apply(&mut sink)?;
        return Ok(());
    }

    let writer: Box<dyn Write> = match matches.value_of("output") {
        Some(path) => Box::new(
            fs::File::create(path).with_context(|| format!("failed to create {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut sink = JsonSink::new(writer);
    output.plan.apply(&mut sink)?;

    info!(
        "[OK] synthesized {} resources ({} warnings)",
        output.plan.len(),
        output.warnings.len()
    );
    Ok(())
}

/// Runs the schema gate only.
pub fn validate(matches: &ArgMatches) -> Result<()> {
    let raw = read_spec(matches)?;
    let (spec, warnings) = prepare(&raw, &options(matches)?)?;
    println!(
        "[OK] {} is valid: {} branches, {} functions, {} warnings",
        spec.api_name,
        spec.branch.len(),
        spec.lambda_func.len(),
        warnings.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_of(argv: &[&str]) -> ArgMatches {
        command_args().get_matches_from(argv.iter().copied())
    }

    #[test]
    fn account_and_region() -> Result<()> {
        std::env::remove_var("CDK_DEFAULT_ACCOUNT");
        std::env::remove_var("CDK_DEFAULT_REGION");

        let missing = matches_of(&["synth", "--spec", "spec.json"]);
        let err = options(&missing).unwrap_err();
        assert!(err.to_string().contains("--account"));

        let fallback = matches_of(&["synth", "--spec", "spec.json", "--account", "123456789012"]);
        let opts = options(&fallback)?;
        assert_eq!("123456789012", opts.env.account);
        assert_eq!(WEBSYS_DEFAULT_REGION.as_str(), opts.env.region);
        assert!(opts.branch.is_none());
        assert!(opts.schema.is_none());

        let explicit = matches_of(&[
            "synth",
            "--spec",
            "spec.json",
            "--account",
            "123456789012",
            "--region",
            "eu-west-1",
            "--branch",
            "dev",
        ]);
        let opts = options(&explicit)?;
        assert_eq!("eu-west-1", opts.env.region);
        assert_eq!(Some("dev".to_string()), opts.branch);
        Ok(())
    }

    #[test]
    fn dry_run_excludes_output() {
        let result = command_args().try_get_matches_from([
            "synth",
            "--spec",
            "spec.json",
            "--dry-run",
            "--output",
            "plan.json",
        ]);
        assert!(result.is_err());
    }
}
