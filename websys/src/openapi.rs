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

//! Route derivation from OpenAPI documents.

use crate::error::{Result, WebSysError};
use serde_yaml::Value;
use std::fs;
use std::path::Path;

/// Operation keys of an OpenAPI path item. Other keys (`parameters`,
/// `summary`, ...) are not routes.
const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Derives `"{METHOD} {path}"` route keys from an OpenAPI document, in
/// path-then-method document order. JSON documents are accepted too.
pub fn routes_from_str(document: &str) -> Result<Vec<String>> {
    let document: Value = serde_yaml::from_str(document)?;
    let paths = document
        .get("paths")
        .and_then(Value::as_mapping)
        .ok_or_else(|| WebSysError::Schema("openapi document has no `paths` map".to_string()))?;

    let mut routes = vec![];
    for (path, item) in paths {
        let path = path
            .as_str()
            .ok_or_else(|| WebSysError::Schema(format!("openapi path {:?} is not a string", path)))?;
        if let Some(operations) = item.as_mapping() {
            for method in operations.keys().filter_map(Value::as_str) {
                let lower = method.to_ascii_lowercase();
                if METHODS.contains(&lower.as_str()) {
                    routes.push(format!("{} {}", lower.to_ascii_uppercase(), path));
                }
            }
        }
    }
    Ok(routes)
}

/// Reads an OpenAPI document from `path` and derives its route keys.
pub fn routes_from_file(path: &Path) -> Result<Vec<String>> {
    let document = fs::read_to_string(path).map_err(|e| {
        WebSysError::MissingPrerequisite(format!(
            "cannot read openapi document {}: {}",
            path.display(),
            e
        ))
    })?;
    routes_from_str(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn path_then_method_order() -> Result<()> {
        let routes = routes_from_str(
            r#"
openapi: 3.0.0
paths:
  /x:
    get: {}
    post: {}
  /a/{id}:
    parameters: []
    delete:
      summary: remove
"#,
        )?;
        assert_eq!(vec!["GET /x", "POST /x", "DELETE /a/{id}"], routes);
        Ok(())
    }

    #[test]
    fn json_document() -> Result<()> {
        let routes = routes_from_str(r#"{"paths": {"/health": {"head": {}, "get": {}}}}"#)?;
        assert_eq!(vec!["HEAD /health", "GET /health"], routes);
        Ok(())
    }

    #[test]
    fn missing_paths() {
        assert!(matches!(
            routes_from_str("openapi: 3.0.0\n"),
            Err(WebSysError::Schema(_))
        ));
    }

    #[test]
    fn from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("api.yaml");
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "paths:\n  /items:\n    get: {{}}")?;

        assert_eq!(vec!["GET /items"], routes_from_file(&path)?);
        assert!(routes_from_file(&dir.path().join("absent.yaml")).is_err());
        Ok(())
    }
}
