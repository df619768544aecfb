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

//! Resolution of spec-external references, and the registry of handles the
//! graph builder fills in as it goes.

mod store;

pub use store::{HandleStore, Scope, StoreEvent, StoreKey, StoreKind};

use crate::aws::lambda::LayerVersionLookup;
use crate::error::{Result, WebSysError};
use crate::naming::{DeployEnv, NameSolver};
use crate::spec::{RefSpec, VpcSpec};
use log::info;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

const ARN_PREFIX: &str = "arn:";

/// A user pool with its JWT issuer URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUserPool {
    /// The pool id.
    pub user_pool_id:  String,
    /// `https://cognito-idp.{region}.amazonaws.com/{user_pool_id}`.
    pub user_pool_url: String,
    /// Other descriptor fields, as given.
    pub extra:         BTreeMap<String, Value>,
}

/// Resolved external references plus the handle store.
#[derive(Debug)]
pub struct ReferenceSolver {
    layers:  BTreeMap<String, String>,
    cognito: BTreeMap<String, ResolvedUserPool>,
    vpc:     Option<VpcSpec>,
    store:   HandleStore,
}

impl ReferenceSolver {
    /// Resolves `reference` up front.
    ///
    /// Layer values starting with `arn:` pass through; any other value is a
    /// layer name whose latest version is looked up once per name, however
    /// many layer ids share it.
    ///
    /// # Arguments
    /// * `reference` - The spec's `ref` block, if any.
    /// * `env` - The account and region ARNs are formatted for.
    /// * `lookup` - The layer version registry.
    pub async fn try_new(
        reference: Option<&RefSpec>,
        env: &DeployEnv,
        lookup: &dyn LayerVersionLookup,
    ) -> Result<ReferenceSolver> {
        let names = NameSolver::new("", env.clone());
        let mut layers = BTreeMap::new();
        let mut cognito = BTreeMap::new();
        let mut vpc = None;

        if let Some(reference) = reference {
            let mut by_name: HashMap<&str, String> = HashMap::new();
            for (layer_id, arn_or_name) in &reference.lambda_layer {
                let arn = if arn_or_name.starts_with(ARN_PREFIX) {
                    arn_or_name.clone()
                } else if let Some(arn) = by_name.get(arn_or_name.as_str()) {
                    arn.clone()
                } else {
                    let version = lookup.latest_version(arn_or_name).await?;
                    let arn = names.layer_version_arn(arn_or_name, version);
                    by_name.insert(arn_or_name.as_str(), arn.clone());
                    arn
                };
                info!("Layer {} -> {}", layer_id, arn);
                layers.insert(layer_id.clone(), arn);
            }

            for (user, pool) in &reference.cognito {
                cognito.insert(
                    user.clone(),
                    ResolvedUserPool {
                        user_pool_id:  pool.user_pool_id.clone(),
                        user_pool_url: names.user_pool_url(&pool.user_pool_id),
                        extra:         pool.extra.clone(),
                    },
                );
            }

            vpc = reference.vpc.clone();
        }

        Ok(ReferenceSolver {
            layers,
            cognito,
            vpc,
            store: HandleStore::new(),
        })
    }

    /// The versioned ARN of every layer in `layer_ids`, in order.
    pub fn layer_arns(&self, layer_ids: &[String], requested_by: &str) -> Result<Vec<String>> {
        layer_ids
            .iter()
            .map(|id| {
                self.layers.get(id).cloned().ok_or_else(|| {
                    WebSysError::ReferentialIntegrity(format!(
                        "layer '{}' is not declared in ref.lambda_layer: requested by {}",
                        id, requested_by
                    ))
                })
            })
            .collect()
    }

    /// The resolved user pool of `user`.
    pub fn user_pool(&self, user: &str, requested_by: &str) -> Result<&ResolvedUserPool> {
        self.cognito.get(user).ok_or_else(|| {
            WebSysError::ReferentialIntegrity(format!(
                "cognito user '{}' is not declared in ref.cognito: requested by {}",
                user, requested_by
            ))
        })
    }

    /// The network descriptor batch jobs run in.
    pub fn vpc(&self) -> Option<&VpcSpec> {
        self.vpc.as_ref()
    }

    /// The handle store, for writes and journaled reads.
    pub fn store_mut(&mut self) -> &mut HandleStore {
        &mut self.store
    }

    /// Consumes the solver, returning the store journal.
    pub fn into_journal(self) -> Vec<StoreEvent> {
        self.store.into_journal()
    }
}
