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

//! The `layer` subcommand resolves a layer name to its latest version ARN.

use crate::args;
use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use websys::prelude::*;

pub fn command_args() -> Command<'static> {
    Command::new("layer")
        .about("Prints the latest published version ARN of a lambda layer")
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("LAYER_NAME")
                .help("The layer name")
                .required(true)
                .takes_value(true),
        )
        .args(args::get_env_args())
}

pub async fn command(matches: &ArgMatches) -> Result<()> {
    let name = matches
        .value_of("name")
        .ok_or_else(|| anyhow!("no layer name provided"))?;
    let account = matches
        .value_of("account")
        .ok_or_else(|| anyhow!("no AWS account: pass --account or set CDK_DEFAULT_ACCOUNT"))?;
    let region = matches
        .value_of("region")
        .unwrap_or_else(|| WEBSYS_DEFAULT_REGION.as_str());

    let lookup = AwsLayerVersionLookup::try_new(region)?;
    let version = lookup.latest_version(name).await?;
    let names = NameSolver::new("", DeployEnv::new(account, region));
    println!("{}", names.layer_version_arn(name, version));
    Ok(())
}
