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

//! Function specs and the runtime catalogue.

use crate::configs::{WEBSYS_DEFAULT_RUNTIME, WEBSYS_QUEUE_ADDITIONAL_TIMEOUT};
use crate::error::{Result, WebSysError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One logical compute unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LambdaSpec {
    /// Path of the code asset, relative to the root path.
    #[serde(default)]
    pub code:           Option<String>,
    /// Runtime name, e.g. `PYTHON_3_12` or `python3.12`.
    #[serde(default)]
    pub runtime:        Option<String>,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout:        Option<i64>,
    /// Memory size in MB.
    #[serde(default)]
    pub memory_size:    Option<i64>,
    /// Ephemeral storage size in MB.
    #[serde(default)]
    pub storage_size:   Option<i64>,
    /// Layer ids, resolved through `ref.lambda_layer`.
    #[serde(default)]
    pub layer_list:     Vec<String>,
    /// Managed policies attached to the function role.
    #[serde(default)]
    pub managed_policy: Vec<String>,
    /// Inbound queue, if the function is fed by one.
    #[serde(default)]
    pub queue:          Option<QueueSpec>,
    /// Logical key of the function whose inbound queue receives this
    /// function's output.
    #[serde(default)]
    pub queue_next:     Option<String>,
    /// Path of an OpenAPI test event schema.
    #[serde(default)]
    pub test:           Option<String>,
}

/// The inbound queue block of a function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueSpec {
    /// Seconds added to the function timeout to form the visibility timeout.
    #[serde(default)]
    pub additional_timeout: Option<i64>,
}

impl LambdaSpec {
    /// The timeout the function runs with.
    pub fn effective_timeout(&self, default: i64) -> i64 {
        self.timeout.unwrap_or(default)
    }

    /// Visibility timeout of the inbound queue: function timeout plus the
    /// queue's additional timeout. `None` when the function has no queue.
    pub fn visibility_timeout(&self, default_timeout: i64) -> Result<Option<i64>> {
        let queue = match &self.queue {
            Some(queue) => queue,
            None => return Ok(None),
        };
        let timeout = self.effective_timeout(default_timeout);
        let additional = queue
            .additional_timeout
            .unwrap_or(*WEBSYS_QUEUE_ADDITIONAL_TIMEOUT);
        timeout.checked_add(additional).map(Some).ok_or_else(|| {
            WebSysError::Schema(format!(
                "visibility timeout overflows: timeout {} + additional_timeout {}",
                timeout, additional
            ))
        })
    }
}

/// Lambda runtimes websys can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    /// Python 3.9
    Python39,
    /// Python 3.10
    Python310,
    /// Python 3.11
    Python311,
    /// Python 3.12
    Python312,
    /// Python 3.13
    Python313,
    /// Node.js 18
    Nodejs18,
    /// Node.js 20
    Nodejs20,
    /// Node.js 22
    Nodejs22,
    /// Java 17
    Java17,
    /// Java 21
    Java21,
    /// Custom runtime on Amazon Linux 2
    ProvidedAl2,
    /// Custom runtime on Amazon Linux 2023
    ProvidedAl2023,
}

/// `(runtime, constant name, identifier)`.
const RUNTIMES: [(Runtime, &str, &str); 12] = [
    (Runtime::Python39, "PYTHON_3_9", "python3.9"),
    (Runtime::Python310, "PYTHON_3_10", "python3.10"),
    (Runtime::Python311, "PYTHON_3_11", "python3.11"),
    (Runtime::Python312, "PYTHON_3_12", "python3.12"),
    (Runtime::Python313, "PYTHON_3_13", "python3.13"),
    (Runtime::Nodejs18, "NODEJS_18_X", "nodejs18.x"),
    (Runtime::Nodejs20, "NODEJS_20_X", "nodejs20.x"),
    (Runtime::Nodejs22, "NODEJS_22_X", "nodejs22.x"),
    (Runtime::Java17, "JAVA_17", "java17"),
    (Runtime::Java21, "JAVA_21", "java21"),
    (Runtime::ProvidedAl2, "PROVIDED_AL2", "provided.al2"),
    (Runtime::ProvidedAl2023, "PROVIDED_AL2023", "provided.al2023"),
];

impl Runtime {
    /// The identifier the Lambda API expects, e.g. `python3.12`.
    pub fn identifier(&self) -> &'static str {
        RUNTIMES
            .iter()
            .find(|(runtime, _, _)| runtime == self)
            .map(|(_, _, id)| *id)
            .unwrap_or("python3.12")
    }

    /// Resolves the runtime of a function: its own name, else the spec
    /// default, else the configured default. A name that is given but unknown
    /// is an error; it never falls through to the next candidate.
    pub fn resolve(function: Option<&str>, spec_default: Option<&str>) -> Result<Runtime> {
        match function.or(spec_default) {
            Some(name) => name.parse(),
            None => WEBSYS_DEFAULT_RUNTIME.parse(),
        }
    }
}

impl FromStr for Runtime {
    type Err = WebSysError;

    /// Accepts either the constant name (`PYTHON_3_12`) or the identifier
    /// (`python3.12`).
    fn from_str(name: &str) -> Result<Runtime> {
        RUNTIMES
            .iter()
            .find(|(_, constant, id)| *constant == name || *id == name)
            .map(|(runtime, _, _)| *runtime)
            .ok_or_else(|| WebSysError::UnknownIdentifier(format!("runtime '{}'", name)))
    }
}

impl Display for Runtime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
