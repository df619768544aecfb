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

//! The schema gate every spec passes before any resource logic runs.

use crate::error::{Result, WebSysError};
use jsonschema::Draft;
use serde_json::Value;

/// Validates `spec` against `schema` (draft 2020-12).
///
/// Every violation is collected, one per line, into a single
/// [`WebSysError::Schema`]; a spec is never partially accepted.
///
/// # Arguments
/// * `spec` - The substituted spec document.
/// * `schema` - The schema document.
pub fn validate(spec: &Value, schema: &Value) -> Result<()> {
    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|e| WebSysError::Schema(format!("invalid schema document: {}", e)))?;

    let violations: Vec<String> = validator
        .iter_errors(spec)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                format!("(root): {}", e)
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(WebSysError::Schema(violations.join("\n")))
    }
}

/// The bundled service spec schema.
pub fn default_schema() -> Result<Value> {
    Ok(serde_json::from_str(include_str!(
        "../schema/service_spec.schema.json"
    ))?)
}
