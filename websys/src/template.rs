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

//! Named placeholder substitution for spec text and policy fragments.
//!
//! Spec documents and IAM policy fragments may carry a closed set of tokens
//! such as `{$account}` or `{$branch}`. They are replaced by plain text
//! substitution *before* the document is parsed, so a substituted value can
//! take part in schema checks. Tokens without a bound value are left verbatim.

use crate::error::{Result, WebSysError};
use crate::naming::DeployEnv;
use std::collections::BTreeMap;

/// The placeholders websys knows how to substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    /// `{$account}`: the AWS account id.
    Account,
    /// `{$region}`: the AWS region name.
    Region,
    /// `{$service_name}`: the spec's service name.
    ServiceName,
    /// `{$service}`: the service name, as spelled in policy fragments.
    Service,
    /// `{$api}`: the spec's api name.
    Api,
    /// `{$branch}`: the branch being synthesized.
    Branch,
}

impl Placeholder {
    /// All placeholders, in substitution order.
    pub const ALL: [Placeholder; 6] = [
        Placeholder::Account,
        Placeholder::Region,
        Placeholder::ServiceName,
        Placeholder::Service,
        Placeholder::Api,
        Placeholder::Branch,
    ];

    /// The literal token as it appears in a document.
    pub fn token(&self) -> &'static str {
        match self {
            Placeholder::Account => "{$account}",
            Placeholder::Region => "{$region}",
            Placeholder::ServiceName => "{$service_name}",
            Placeholder::Service => "{$service}",
            Placeholder::Api => "{$api}",
            Placeholder::Branch => "{$branch}",
        }
    }
}

/// A set of placeholder bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: BTreeMap<Placeholder, String>,
}

impl Substitutions {
    /// Creates an empty binding set.
    pub fn new() -> Self {
        Substitutions::default()
    }

    /// Binds `placeholder` to `value`, replacing any earlier binding.
    pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(placeholder, value.into());
        self
    }

    /// Bindings for a spec document.
    ///
    /// # Arguments
    /// * `env` - The account and region the service is deployed to.
    /// * `service_name` - The spec's `service_name`.
    /// * `api_name` - The spec's `api_name`.
    /// * `branch` - The branch to bind `{$branch}` to, if any.
    pub fn for_spec(
        env: &DeployEnv,
        service_name: &str,
        api_name: &str,
        branch: Option<&str>,
    ) -> Self {
        let subs = Substitutions::new()
            .with(Placeholder::Account, env.account.as_str())
            .with(Placeholder::Region, env.region.as_str())
            .with(Placeholder::ServiceName, service_name)
            .with(Placeholder::Api, api_name);
        match branch {
            Some(branch) => subs.with(Placeholder::Branch, branch),
            None => subs,
        }
    }

    /// Bindings for a policy fragment attached to one branch.
    pub fn for_policy(env: &DeployEnv, service_name: &str, branch: &str) -> Self {
        Substitutions::new()
            .with(Placeholder::Account, env.account.as_str())
            .with(Placeholder::Region, env.region.as_str())
            .with(Placeholder::Service, service_name)
            .with(Placeholder::Branch, branch)
    }

    /// Replaces every bound token in `text`.
    pub fn apply(&self, text: &str) -> String {
        self.values
            .iter()
            .fold(text.to_string(), |acc, (placeholder, value)| {
                acc.replace(placeholder.token(), value)
            })
    }
}

/// Replaces every bound placeholder of `subs` in `text`.
pub fn substitute(text: &str, subs: &Substitutions) -> String {
    subs.apply(text)
}

/// Lists the `{$...}` tokens still present in `text`, in order of appearance.
pub fn unresolved(text: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut rest = text;
    while let Some(start) = rest.find("{$") {
        let tail = &rest[start..];
        match tail.find('}') {
            Some(end) => {
                let token = &tail[..=end];
                if !tokens.iter().any(|t| t == token) {
                    tokens.push(token.to_string());
                }
                rest = &tail[end + 1..];
            }
            None => break,
        }
    }
    tokens
}

/// Reads `service_name` and `api_name` out of a raw (unsubstituted) spec, so
/// the spec-level bindings can be built before the document is parsed for
/// real. Placeholders only ever appear inside JSON strings, which keeps the
/// raw text parseable.
pub fn peek_names(raw: &str) -> Result<(String, String)> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| WebSysError::Schema(format!("spec is not valid JSON: {}", e)))?;
    let field = |name: &str| -> Result<String> {
        match value.get(name).and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(WebSysError::Schema(format!(
                "`{}` must be a non-empty string",
                name
            ))),
        }
    };
    Ok((field("service_name")?, field("api_name")?))
}
