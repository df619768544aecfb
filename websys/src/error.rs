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

//! Websys error types

use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::result;

/// Result type for operations that could result in an [WebSysError]
pub type Result<T> = result::Result<T, WebSysError>;

/// Websys error
#[derive(Debug)]
pub enum WebSysError {
    /// Error returned when the spec document (or the schema itself) fails
    /// structural validation. Raised before any resource logic runs.
    Schema(String),
    /// Error returned when a named cross-reference (queue_next target,
    /// queue_state_lambda, cognito user, sender topic, ...) does not exist or
    /// lacks a prerequisite field. The message names both the referencing and
    /// the referenced logical keys.
    ReferentialIntegrity(String),
    /// Error returned when an optional feature is requested without its
    /// required companion input, e.g. a front-end app without a repository
    /// token.
    MissingPrerequisite(String),
    /// Error returned when an external lookup (lambda layer versions) fails.
    ExternalLookup(String),
    /// Error returned when a name does not map to any known descriptor, e.g.
    /// an unsupported lambda runtime.
    UnknownIdentifier(String),
    /// Error returned when the handle registry is read before the phase that
    /// owns the entry has completed.
    PhaseOrder(String),
    /// Error returned when two resources resolve to the same handle or a
    /// registry entry is written twice.
    DuplicateResource(String),
    /// Error associated to I/O operations and associated traits.
    IoError(io::Error),
    /// Error returned when serde_json failed to serialize or deserialize data.
    SerdeJson(serde_json::Error),
    /// Error returned when serde_yaml failed to deserialize an OpenAPI
    /// document.
    SerdeYaml(serde_yaml::Error),
    /// Error returned as a consequence of an error in Websys.
    /// This error should not happen in normal usage of Websys.
    /// Websys has internal invariants that we are unable to ask the
    /// compiler to check for us. This error is raised when one of those
    /// invariants is not verified during synthesis.
    Internal(String),
}

impl From<io::Error> for WebSysError {
    fn from(e: io::Error) -> Self {
        WebSysError::IoError(e)
    }
}

impl From<serde_json::Error> for WebSysError {
    fn from(e: serde_json::Error) -> Self {
        WebSysError::SerdeJson(e)
    }
}

impl From<serde_yaml::Error> for WebSysError {
    fn from(e: serde_yaml::Error) -> Self {
        WebSysError::SerdeYaml(e)
    }
}

impl Display for WebSysError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            WebSysError::Schema(ref desc) => write!(f, "Schema error: {}", desc),
            WebSysError::ReferentialIntegrity(ref desc) => {
                write!(f, "Referential integrity error: {}", desc)
            }
            WebSysError::MissingPrerequisite(ref desc) => {
                write!(f, "Missing prerequisite: {}", desc)
            }
            WebSysError::ExternalLookup(ref desc) => write!(f, "External lookup error: {}", desc),
            WebSysError::UnknownIdentifier(ref desc) => write!(f, "Unknown identifier: {}", desc),
            WebSysError::PhaseOrder(ref desc) => write!(f, "Phase order violation: {}", desc),
            WebSysError::DuplicateResource(ref desc) => {
                write!(f, "Duplicate resource: {}", desc)
            }
            WebSysError::IoError(ref desc) => write!(f, "IO error: {}", desc),
            WebSysError::SerdeJson(ref desc) => write!(f, "serde_json error: {:?}", desc),
            WebSysError::SerdeYaml(ref desc) => write!(f, "serde_yaml error: {}", desc),
            WebSysError::Internal(ref desc) => write!(
                f,
                "Internal error: {}. This was likely caused by a bug in Websys's \
                    code and we would welcome that you file an bug report in our issue tracker",
                desc
            ),
        }
    }
}

impl error::Error for WebSysError {}
