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

//! The resource graph builder.
//!
//! The builder runs a fixed sequence of phases over a decoded spec. A phase
//! may read handles registered by an earlier phase, never by a later one:
//!
//! 1. Messaging: topics, and the functions nested under them.
//! 2. Frontend: apps, their login clients and identity pools.
//! 3. Gateway: the HTTP API, stages, authorizers, integrations and routes.
//! 4. Storage: buckets and container repositories.
//! 5. Compute and Batch, branch by branch: functions with their queues and
//!    permissions, then the batch jobs notifying those functions.
//!
//! Any configuration error aborts the whole build; no partial plan is
//! returned.

mod batch;
mod compute;
mod frontend;
mod gateway;
mod messaging;
mod storage;

use crate::error::Result;
use crate::naming::{DeployEnv, NameSolver};
use crate::plan::{Category, Handle, Phase, Plan, ResourceIntent};
use crate::reference::{ReferenceSolver, StoreEvent};
use crate::spec::ServiceSpec;
use log::{info, warn};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable names every function and app branch receives.
pub mod env_keys {
    /// The api name.
    pub const API: &str = "API";
    /// The service name.
    pub const SERVICE: &str = "Service";
    /// The branch name.
    pub const BRANCH: &str = "Branch";
    /// The branch bucket.
    pub const BUCKET: &str = "Bucket";
    /// The branch notification URL.
    pub const NOTIFICATION_URL: &str = "NotificationUrl";
    /// The inbound queue of the `queue_next` function.
    pub const NEXT_SQS: &str = "NextSQS";
}

/// The result of a build.
#[derive(Debug)]
pub struct BuildOutput {
    /// The ordered resource plan.
    pub plan:     Plan,
    /// Every registry write, read and phase completion, in order.
    pub journal:  Vec<StoreEvent>,
    /// Non-fatal findings, e.g. skipped batch jobs.
    pub warnings: Vec<String>,
}

/// Builds the resource plan of one service spec.
pub struct GraphBuilder<'a> {
    spec:             &'a ServiceSpec,
    names:            NameSolver,
    refs:             ReferenceSolver,
    plan:             Plan,
    root_path:        Option<PathBuf>,
    repository_token: Option<String>,
    warnings:         Vec<String>,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder.
    ///
    /// # Arguments
    /// * `spec` - The decoded spec.
    /// * `refs` - The resolved `ref` block; its store must be empty.
    /// * `env` - The account and region the service is deployed to.
    pub fn new(spec: &'a ServiceSpec, refs: ReferenceSolver, env: DeployEnv) -> Self {
        GraphBuilder {
            spec,
            names: NameSolver::new(spec.api_name.as_str(), env),
            refs,
            plan: Plan::new(spec.tags.clone()),
            root_path: None,
            repository_token: None,
            warnings: vec![],
        }
    }

    /// Sets the directory relative paths of the spec are resolved against.
    pub fn with_root_path(mut self, root_path: Option<PathBuf>) -> Self {
        self.root_path = root_path;
        self
    }

    /// Sets the access token front-end apps check out their repository with.
    pub fn with_repository_token(mut self, token: Option<String>) -> Self {
        self.repository_token = token;
        self
    }

    /// Runs every phase and returns the plan.
    pub fn build(mut self) -> Result<BuildOutput> {
        info!("Building resource graph of {}", self.names.api_name());

        self.build_messaging()?;
        self.complete(Phase::Messaging);

        self.build_frontend()?;
        self.complete(Phase::Frontend);

        self.build_gateway()?;
        self.complete(Phase::Gateway);

        self.build_storage()?;
        self.complete(Phase::Storage);

        let spec = self.spec;
        for branch in spec.branch_names() {
            self.build_compute(branch)?;
            self.build_batch(branch)?;
        }
        self.complete(Phase::Compute);
        self.complete(Phase::Batch);

        info!(
            "Resource graph of {} has {} intents, {} warnings",
            self.names.api_name(),
            self.plan.len(),
            self.warnings.len()
        );
        Ok(BuildOutput {
            plan:     self.plan,
            journal:  self.refs.into_journal(),
            warnings: self.warnings,
        })
    }

    fn complete(&mut self, phase: Phase) {
        self.refs.store_mut().complete(phase);
    }

    fn emit(&mut self, intent: ResourceIntent) -> Result<Handle> {
        self.plan.push(intent)
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Joins a relative spec path to the root path. Absolute paths are kept.
    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.root_path {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// The environment shared by every function (and app branch) of
    /// `branch`. Functions shared by all branches only get the api and
    /// service names.
    fn base_env(&self, branch: Option<&str>) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(env_keys::API.to_owned(), self.spec.api_name.clone());
        env.insert(env_keys::SERVICE.to_owned(), self.spec.service_name.clone());
        if let Some(branch) = branch {
            env.insert(env_keys::BRANCH.to_owned(), branch.to_owned());
            if let Some(branch_spec) = self.spec.branch.get(branch) {
                if let Some(bucket) = &branch_spec.bucket {
                    env.insert(env_keys::BUCKET.to_owned(), bucket.clone());
                }
                if let Some(url) = &branch_spec.notification_url {
                    env.insert(env_keys::NOTIFICATION_URL.to_owned(), url.clone());
                }
            }
        }
        env
    }

    /// Emits an IAM role assumed by a service principal.
    fn emit_service_role(
        &mut self,
        phase: Phase,
        role_name: &str,
        principal: &str,
        managed_policies: &[&str],
    ) -> Result<Handle> {
        self.emit(ResourceIntent::new(
            Category::Role,
            phase,
            role_name,
            json!({
                "role_name": role_name,
                "assumed_by": {"service": principal},
                "managed_policies": managed_policies,
            }),
        ))
    }

    /// Emits a resource-based permission letting `principal` invoke
    /// `function` on behalf of `source_arn`.
    fn emit_invoke_permission(
        &mut self,
        phase: Phase,
        name: &str,
        function: &Handle,
        principal: &str,
        source_arn: Value,
        source: Option<&Handle>,
    ) -> Result<Handle> {
        let intent = ResourceIntent::new(
            Category::Permission,
            phase,
            name,
            json!({
                "function_name": function.reference(),
                "action": "lambda:InvokeFunction",
                "principal": principal,
                "source_arn": source_arn,
            }),
        )
        .depends_on(function)
        .depends_on_all(source);
        self.emit(intent)
    }
}
