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

mod args;
mod layer;
mod synth;

use anyhow::Result;
use clap::{crate_version, Command};

#[tokio::main]
pub async fn main() -> Result<()> {
    let matches = Command::new("websys")
        .version(crate_version!())
        .about("Synthesizes multi-branch web services into cloud resource plans")
        .author("UMD Database Group")
        .args(args::get_logging_args())
        .subcommand(synth::command_args())
        .subcommand(synth::validate_args())
        .subcommand(layer::command_args())
        .arg_required_else_help(true)
        .get_matches();

    match matches.subcommand() {
        Some(("synth", sub)) => {
            args::get_logging(&matches, sub)?.init();
            synth::command(sub).await?;
        }
        Some(("validate", sub)) => {
            args::get_logging(&matches, sub)?.init();
            synth::validate(sub)?;
        }
        Some(("layer", sub)) => {
            args::get_logging(&matches, sub)?.init();
            layer::command(sub).await?;
        }
        _ => unreachable!("clap requires a subcommand"),
    }

    Ok(())
}
