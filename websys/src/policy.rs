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

//! IAM policy fragments attached to front-end identity roles.
//!
//! A fragment is a JSON policy document whose text may contain the
//! `{$service}`, `{$branch}`, `{$account}` and `{$region}` tokens.

use crate::error::{Result, WebSysError};
use crate::template::{substitute, Substitutions};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A policy document bound to one branch.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyFragment {
    /// The file name of the fragment, used as the inline policy name.
    pub name:     String,
    /// The substituted document.
    pub document: Value,
}

impl PolicyFragment {
    /// Substitutes and parses fragment text.
    pub fn parse(name: &str, text: &str, subs: &Substitutions) -> Result<PolicyFragment> {
        let document = serde_json::from_str(&substitute(text, subs)).map_err(|e| {
            WebSysError::Schema(format!("policy fragment '{}' is not valid JSON: {}", name, e))
        })?;
        Ok(PolicyFragment {
            name: name.to_owned(),
            document,
        })
    }

    /// Reads, substitutes and parses the fragment at `path`.
    pub fn load(path: &Path, subs: &Substitutions) -> Result<PolicyFragment> {
        let text = fs::read_to_string(path).map_err(|e| {
            WebSysError::MissingPrerequisite(format!(
                "cannot read policy fragment {}: {}",
                path.display(),
                e
            ))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        PolicyFragment::parse(&name, &text, subs)
    }
}
