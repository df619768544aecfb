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

//! Common unit test utility methods, and end-to-end properties of a
//! synthesis run.

use crate::aws::lambda::LayerVersionLookup;
use crate::builder::BuildOutput;
use crate::error::{Result, WebSysError};
use crate::naming::DeployEnv;
use crate::synth::{synthesize, SynthOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A layer registry answering from a fixed table and counting calls.
pub(crate) struct CountingLookup {
    versions: HashMap<String, i64>,
    calls:    AtomicUsize,
}

impl CountingLookup {
    pub fn new(versions: &[(&str, i64)]) -> CountingLookup {
        CountingLookup {
            versions: versions
                .iter()
                .map(|(name, version)| (name.to_string(), *version))
                .collect(),
            calls:    AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LayerVersionLookup for CountingLookup {
    async fn latest_version(&self, layer_name: &str) -> Result<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.versions.get(layer_name).copied().ok_or_else(|| {
            WebSysError::ExternalLookup(format!("layer '{}' has no published version", layer_name))
        })
    }
}

/// The deployment environment of every test.
pub(crate) fn env() -> DeployEnv {
    DeployEnv::new("123456789012", "us-east-1")
}

async fn run(spec: Value, options: SynthOptions) -> Result<BuildOutput> {
    let raw = serde_json::to_string_pretty(&spec)?;
    synthesize(&raw, &options, &CountingLookup::new(&[("numpy", 7)])).await
}

/// Synthesizes a spec without a root path or repository token.
pub(crate) async fn build_from_json(spec: Value) -> Result<BuildOutput> {
    run(spec, SynthOptions::new(env())).await
}

/// Synthesizes a spec with a repository token.
pub(crate) async fn build_with_token(spec: Value, token: &str) -> Result<BuildOutput> {
    let mut options = SynthOptions::new(env());
    options.repository_token = Some(token.to_string());
    run(spec, options).await
}

/// Synthesizes a spec whose relative paths live under `root`.
pub(crate) async fn build_with_root(spec: Value, root: &Path) -> Result<BuildOutput> {
    let mut options = SynthOptions::new(env());
    options.root_path = Some(root.to_path_buf());
    options.repository_token = Some("ghp_token".to_string());
    run(spec, options).await
}

mod properties {
    use super::*;
    use crate::plan::{Category, Phase};
    use crate::reference::{StoreEvent, StoreKind};
    use serde_json::json;

    /// Every optional block at once.
    fn full_spec() -> Value {
        json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {
                "main": {"apigw_stage": "$default", "amplify_type": "PRODUCTION", "bucket": "shop-main"},
                "dev": {"apigw_stage": "dev", "amplify_type": "DEVELOPMENT"}
            },
            "lambda_handler": "api.lambda_function.handler",
            "common_lambda_policy": ["AmazonSQSFullAccess"],
            "repository_root": "https://github.com/acme",
            "tags": {"team": "web"},
            "ref": {
                "lambda_layer": {"np": "numpy"},
                "cognito": {"staff": {"user_pool_id": "us-east-1_Pool"}},
                "vpc": {"subnet_id_list": ["subnet-1"], "security_group_id": "sg-1"}
            },
            "sns": {
                "deploys": {"lambda_func": {"notify_teams": {}}}
            },
            "amplify": {
                "web": {"domain": "example.com", "cognito_auth": "staff", "deploy_event_sns": "deploys"}
            },
            "apigw": {
                "lambda_integration": {
                    "entry": {"route": ["POST /pipeline"], "cognito_auth": {"user": "staff", "app": "web"}}
                }
            },
            "s3": {"shop-site": {"website_hosting": true}},
            "lambda_func": {
                "entry": {"layer_list": ["np"], "queue_next": "process"},
                "process": {"timeout": 20, "queue": {}},
                "called_by_batch": {}
            },
            "batch_func": {"ocr": {"maxv_cpus": 2, "queue_state_lambda": "called_by_batch"}}
        })
    }

    fn position(journal: &[StoreEvent], found: impl Fn(&StoreEvent) -> bool) -> Option<usize> {
        journal.iter().position(found)
    }

    #[tokio::test]
    async fn registry_reads_follow_their_phase() -> Result<()> {
        let output = build_with_token(full_spec(), "ghp_token").await?;
        let journal = &output.journal;

        let completed = |phase: Phase| {
            position(journal, |e| *e == StoreEvent::PhaseCompleted(phase)).unwrap()
        };
        let reads = |kind: StoreKind| -> Vec<usize> {
            journal
                .iter()
                .enumerate()
                .filter(|(_, e)| matches!(e, StoreEvent::Read(key) if key.kind == kind))
                .map(|(i, _)| i)
                .collect()
        };

        let gateway_reads = reads(StoreKind::Gateway);
        let client_reads = reads(StoreKind::AuthClient);
        let topic_reads = reads(StoreKind::Topic);
        assert_eq!(2, gateway_reads.len(), "one permission per branch");
        assert_eq!(1, client_reads.len());
        assert_eq!(1, topic_reads.len());

        assert!(gateway_reads.iter().all(|i| *i > completed(Phase::Gateway)));
        assert!(client_reads.iter().all(|i| *i > completed(Phase::Frontend)));
        assert!(topic_reads.iter().all(|i| *i > completed(Phase::Messaging)));

        let phases: Vec<Phase> = journal
            .iter()
            .filter_map(|e| match e {
                StoreEvent::PhaseCompleted(phase) => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(Phase::ALL.to_vec(), phases);
        Ok(())
    }

    #[tokio::test]
    async fn plan_phases_are_ordered() -> Result<()> {
        let output = build_with_token(full_spec(), "ghp_token").await?;
        let plan = &output.plan;

        // front-end, gateway and storage intents never follow branch intents
        let first_branch = plan
            .intents()
            .iter()
            .position(|i| i.phase >= Phase::Compute)
            .unwrap();
        assert!(plan.intents()[first_branch..]
            .iter()
            .all(|i| i.phase >= Phase::Compute));

        // each batch job comes right after the compute of its branch
        let phases: Vec<Phase> = plan.intents().iter().map(|i| i.phase).collect();
        let batch_runs = phases
            .windows(2)
            .filter(|w| w[0] == Phase::Compute && w[1] == Phase::Batch)
            .count();
        assert_eq!(2, batch_runs);

        assert_eq!("web", plan.tags["team"]);
        assert!(output.warnings.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn resynthesis_is_identical() -> Result<()> {
        let first = build_with_token(full_spec(), "ghp_token").await?;
        let second = build_with_token(full_spec(), "ghp_token").await?;
        assert_eq!(first.plan.to_json()?, second.plan.to_json()?);
        assert_eq!(first.journal, second.journal);
        Ok(())
    }

    #[tokio::test]
    async fn queue_next_exports_the_target_queue() -> Result<()> {
        let output = build_from_json(json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {"main": {}},
            "lambda_handler": "h",
            "lambda_func": {"A": {"queue": {}}, "B": {"queue_next": "A"}}
        }))
        .await?;
        let b = output
            .plan
            .find(Category::Function, "shop-api-main-B")
            .unwrap();
        assert_eq!("shop-api-main-A_waiting", b.attributes["environment"]["NextSQS"]);
        Ok(())
    }

    #[tokio::test]
    async fn queue_next_violations_abort() {
        let spec = |functions: Value| {
            json!({
                "service_name": "shop",
                "api_name": "shop-api",
                "branch": {"main": {}},
                "lambda_handler": "h",
                "lambda_func": functions
            })
        };

        let err = build_from_json(spec(json!({"B": {"queue_next": "C"}})))
            .await
            .unwrap_err();
        let desc = err.to_string();
        assert!(matches!(err, WebSysError::ReferentialIntegrity(_)));
        assert!(desc.contains("'C'") && desc.contains("`B`"), "{}", desc);

        let err = build_from_json(spec(json!({"A": {}, "B": {"queue_next": "A"}})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("should have `queue` key"));

        let err = build_from_json(spec(json!({
            "A": {"queue": {}, "queue_next": "B"},
            "B": {"queue": {}, "queue_next": "A"}
        })))
        .await
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[tokio::test]
    async fn visibility_timeouts() -> Result<()> {
        let output = build_from_json(json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {"main": {}},
            "lambda_handler": "h",
            "lambda_func": {
                "fast": {"queue": {"additional_timeout": 10}},
                "slow": {"timeout": 20, "queue": {}}
            }
        }))
        .await?;
        let timeout = |name: &str| {
            output.plan.find(Category::Queue, name).unwrap().attributes["visibility_timeout"].clone()
        };
        assert_eq!(13, timeout("shop-api-main-fast_waiting"));
        assert_eq!(30, timeout("shop-api-main-slow_waiting"));
        Ok(())
    }

    #[tokio::test]
    async fn oversized_additional_timeout_is_a_schema_error() {
        let err = build_from_json(json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {"main": {}},
            "lambda_handler": "h",
            "lambda_func": {"w": {"queue": {"additional_timeout": i64::MAX}}}
        }))
        .await
        .unwrap_err();
        match err {
            WebSysError::Schema(desc) => assert!(desc.contains("additional_timeout"), "{}", desc),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn batch_without_vpc_is_skipped() -> Result<()> {
        let mut spec = full_spec();
        spec["ref"].as_object_mut().unwrap().remove("vpc");
        let output = build_with_token(spec, "ghp_token").await?;

        let batch: Vec<_> = output
            .plan
            .intents()
            .iter()
            .filter(|i| i.phase == Phase::Batch)
            .collect();
        assert!(batch.is_empty());
        assert_eq!(2, output.warnings.len(), "one warning per branch");
        assert!(output.warnings[0].contains("vpc"));
        // the repository is storage, not batch
        assert_eq!(1, output.plan.by_category(Category::Repository).len());
        Ok(())
    }

    #[tokio::test]
    async fn layer_lookup_failure_aborts() {
        let mut spec = full_spec();
        spec["ref"]["lambda_layer"]["np"] = json!("scipy");
        let err = build_with_token(spec, "ghp_token").await.unwrap_err();
        assert!(matches!(err, WebSysError::ExternalLookup(_)));
    }

    #[tokio::test]
    async fn colliding_names_are_rejected() {
        // both branches map onto the same gateway stage
        let mut spec = full_spec();
        spec["branch"]["dev"]["apigw_stage"] = json!("$default");
        let err = build_with_token(spec, "ghp_token").await.unwrap_err();
        assert!(matches!(err, WebSysError::DuplicateResource(_)));
    }
}
