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

//! One synthesis run: raw spec text in, ordered resource plan out.

use crate::aws::lambda::LayerVersionLookup;
use crate::builder::{BuildOutput, GraphBuilder};
use crate::error::{Result, WebSysError};
use crate::naming::DeployEnv;
use crate::reference::ReferenceSolver;
use crate::schema::{default_schema, validate};
use crate::spec::ServiceSpec;
use crate::template::{peek_names, substitute, unresolved, Placeholder, Substitutions};
use log::{info, warn};
use serde_json::Value;
use std::path::PathBuf;

/// Inputs of a synthesis run besides the spec text.
#[derive(Debug, Clone)]
pub struct SynthOptions {
    /// The account and region to deploy to.
    pub env:              DeployEnv,
    /// The branch `{$branch}` is bound to, if any.
    pub branch:           Option<String>,
    /// Directory relative paths in the spec are resolved against.
    pub root_path:        Option<PathBuf>,
    /// Access token of the front-end repositories.
    pub repository_token: Option<String>,
    /// Schema document; the bundled schema when `None`.
    pub schema:           Option<Value>,
}

impl SynthOptions {
    /// Options with nothing but the deployment environment.
    pub fn new(env: DeployEnv) -> SynthOptions {
        SynthOptions {
            env,
            branch: None,
            root_path: None,
            repository_token: None,
            schema: None,
        }
    }
}

/// Substitutes, parses, validates and decodes a spec.
///
/// Returns the spec and the warnings raised on the way (placeholder tokens
/// left unresolved).
pub fn prepare(raw: &str, options: &SynthOptions) -> Result<(ServiceSpec, Vec<String>)> {
    let env = &options.env;
    let (service_name, api_name) = peek_names(raw)?;
    let api_name = substitute(
        &api_name,
        &Substitutions::new()
            .with(Placeholder::Account, env.account.as_str())
            .with(Placeholder::Region, env.region.as_str())
            .with(Placeholder::ServiceName, service_name.as_str()),
    );

    let subs = Substitutions::for_spec(env, &service_name, &api_name, options.branch.as_deref());
    let text = substitute(raw, &subs);
    let mut warnings = vec![];
    for token in unresolved(&text) {
        let message = format!("placeholder {} is left unresolved", token);
        warn!("{}", message);
        warnings.push(message);
    }

    let document: Value = serde_json::from_str(&text)
        .map_err(|e| WebSysError::Schema(format!("spec is not valid JSON: {}", e)))?;
    let schema = match &options.schema {
        Some(schema) => schema.clone(),
        None => default_schema()?,
    };
    validate(&document, &schema)?;

    let spec = ServiceSpec::from_value(document)?;
    info!(
        "Spec of service {} (api {}) passed the schema gate, {} branches",
        spec.service_name,
        spec.api_name,
        spec.branch.len()
    );
    Ok((spec, warnings))
}

/// Runs a full synthesis.
///
/// # Arguments
/// * `raw` - The spec text, placeholders included.
/// * `options` - Deployment inputs.
/// * `lookup` - Layer version registry used to resolve layer names.
pub async fn synthesize(
    raw: &str,
    options: &SynthOptions,
    lookup: &dyn LayerVersionLookup,
) -> Result<BuildOutput> {
    let (spec, mut warnings) = prepare(raw, options)?;
    let refs = ReferenceSolver::try_new(spec.reference.as_ref(), &options.env, lookup).await?;
    let mut output = GraphBuilder::new(&spec, refs, options.env.clone())
        .with_root_path(options.root_path.clone())
        .with_repository_token(options.repository_token.clone())
        .build()?;
    warnings.append(&mut output.warnings);
    output.warnings = warnings;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Category;
    use crate::tests::{env, CountingLookup};

    const SPEC: &str = r#"{
        "service_name": "shop",
        "api_name": "{$service_name}-api",
        "branch": {"main": {"bucket": "{$service_name}-{$account}-main"}},
        "lambda_handler": "api.lambda_function.handler",
        "lambda_func": {"echo": {}}
    }"#;

    #[test]
    fn placeholders_before_parsing() -> Result<()> {
        let (spec, warnings) = prepare(SPEC, &SynthOptions::new(env()))?;
        assert_eq!("shop-api", spec.api_name);
        assert_eq!(
            Some("shop-123456789012-main".to_string()),
            spec.branch["main"].bucket
        );
        assert!(warnings.is_empty());
        Ok(())
    }

    #[test]
    fn unbound_branch_token_is_a_warning() -> Result<()> {
        let raw = SPEC.replace("-main\"", "-{$branch}\"");
        let (spec, warnings) = prepare(&raw, &SynthOptions::new(env()))?;
        assert_eq!(
            Some("shop-123456789012-{$branch}".to_string()),
            spec.branch["main"].bucket
        );
        assert_eq!(1, warnings.len());

        let mut options = SynthOptions::new(env());
        options.branch = Some("main".to_string());
        let (spec, warnings) = prepare(&raw, &options)?;
        assert_eq!(
            Some("shop-123456789012-main".to_string()),
            spec.branch["main"].bucket
        );
        assert!(warnings.is_empty());
        Ok(())
    }

    #[test]
    fn schema_gate_runs_before_decoding() {
        let raw = SPEC.replace("\"lambda_func\"", "\"lambda_funcs\"");
        let err = prepare(&raw, &SynthOptions::new(env())).unwrap_err();
        assert!(matches!(err, WebSysError::Schema(_)));

        let err = prepare("{\"service_name\": \"shop\", \"api_name\": ", &SynthOptions::new(env()))
            .unwrap_err();
        assert!(matches!(err, WebSysError::Schema(_)));
    }

    #[test]
    fn custom_schema() -> Result<()> {
        let mut options = SynthOptions::new(env());
        options.schema = Some(serde_json::json!({
            "type": "object",
            "properties": {"branch": {"propertyNames": {"enum": ["main", "dev"]}}}
        }));
        prepare(SPEC, &options)?;

        let raw = SPEC.replace("\"main\": {", "\"staging\": {");
        assert!(matches!(
            prepare(&raw, &options),
            Err(WebSysError::Schema(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn end_to_end() -> Result<()> {
        let output = synthesize(SPEC, &SynthOptions::new(env()), &CountingLookup::new(&[])).await?;
        assert!(output
            .plan
            .find(Category::Function, "shop-api-main-echo")
            .is_some());
        Ok(())
    }
}
