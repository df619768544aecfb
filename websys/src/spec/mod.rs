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

//! The typed model of a service spec document.
//!
//! A spec is decoded only after it passed template substitution and the schema
//! gate; decoding failures are still reported as schema errors because they
//! mean the document does not have the expected shape.

mod frontend;
mod function;
mod infra;

pub use frontend::{AmplifyAppSpec, ApiGwSpec, CognitoAuthSpec, RouteSpec};
pub use function::{LambdaSpec, QueueSpec, Runtime};
pub use infra::{BatchFuncSpec, BucketSpec, TopicSpec};

use crate::error::{Result, WebSysError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The top-level declarative unit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceSpec {
    /// The service identifier, exported to every function as `Service`.
    pub service_name:         String,
    /// Prefix of every physical resource name.
    pub api_name:             String,
    /// Deployment lines, keyed by branch name.
    pub branch:               BTreeMap<String, BranchSpec>,
    /// Handler entry point shared by all functions.
    pub lambda_handler:       String,
    /// Managed policies attached to every branch-scoped function.
    #[serde(default)]
    pub common_lambda_policy: Vec<String>,
    /// External references.
    #[serde(default, rename = "ref")]
    pub reference:            Option<RefSpec>,
    /// Tags applied to every resource of the stack.
    #[serde(default)]
    pub tags:                 BTreeMap<String, String>,
    /// Runtime name used by functions that do not name one.
    #[serde(default)]
    pub default_runtime:      Option<String>,
    /// Repository root that front-end apps are checked out from.
    #[serde(default)]
    pub repository_root:      Option<String>,
    /// Branch-scoped functions.
    #[serde(default)]
    pub lambda_func:          BTreeMap<String, LambdaSpec>,
    /// The HTTP entry point.
    #[serde(default)]
    pub apigw:                Option<ApiGwSpec>,
    /// Buckets, keyed by bucket name.
    #[serde(default)]
    pub s3:                   Option<BTreeMap<String, BucketSpec>>,
    /// Messaging topics, keyed by topic key.
    #[serde(default)]
    pub sns:                  Option<BTreeMap<String, TopicSpec>>,
    /// Container batch jobs, keyed by batch key.
    #[serde(default)]
    pub batch_func:           Option<BTreeMap<String, BatchFuncSpec>>,
    /// Front-end apps, keyed by app name.
    #[serde(default)]
    pub amplify:              Option<BTreeMap<String, AmplifyAppSpec>>,
}

/// One deployment line, e.g. `main` or `dev`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BranchSpec {
    /// Gateway stage serving this branch.
    #[serde(default)]
    pub apigw_stage:      Option<String>,
    /// Front-end stage type (`PRODUCTION`, `DEVELOPMENT`, ...).
    #[serde(default)]
    pub amplify_type:     Option<String>,
    /// Bucket exported to functions as `Bucket`.
    #[serde(default)]
    pub bucket:           Option<String>,
    /// URL exported to functions as `NotificationUrl`.
    #[serde(default, rename = "notification-url")]
    pub notification_url: Option<String>,
}

/// External references, consumed read-only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RefSpec {
    /// Layer id -> layer ARN or layer name.
    #[serde(default)]
    pub lambda_layer: BTreeMap<String, String>,
    /// User key -> user pool descriptor.
    #[serde(default)]
    pub cognito:      BTreeMap<String, CognitoSpec>,
    /// The network batch jobs run in.
    #[serde(default)]
    pub vpc:          Option<VpcSpec>,
}

/// A user pool referenced by apps and gateway routes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CognitoSpec {
    /// The user pool id, e.g. `us-east-1_AbCdEf`.
    pub user_pool_id: String,
    /// Any other descriptor fields, kept as given.
    #[serde(flatten)]
    pub extra:        BTreeMap<String, Value>,
}

/// The network descriptor batch compute environments are placed in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VpcSpec {
    /// Subnets of the compute environment.
    pub subnet_id_list:    Vec<String>,
    /// Security group of the compute environment.
    pub security_group_id: String,
}

impl ServiceSpec {
    /// Decodes a validated spec document.
    pub fn from_value(value: Value) -> Result<ServiceSpec> {
        let spec: ServiceSpec = serde_json::from_value(value)
            .map_err(|e| WebSysError::Schema(format!("malformed service spec: {}", e)))?;
        spec.check()?;
        Ok(spec)
    }

    /// Parses and decodes a spec document from text.
    pub fn from_json(text: &str) -> Result<ServiceSpec> {
        ServiceSpec::from_value(serde_json::from_str(text)?)
    }

    fn check(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(WebSysError::Schema("`service_name` is empty".to_string()));
        }
        if self.api_name.is_empty() {
            return Err(WebSysError::Schema("`api_name` is empty".to_string()));
        }
        if self.branch.is_empty() {
            return Err(WebSysError::Schema(
                "`branch` must declare at least one branch".to_string(),
            ));
        }
        Ok(())
    }

    /// The branch names, in synthesis order.
    pub fn branch_names(&self) -> Vec<&str> {
        self.branch.keys().map(String::as_str).collect()
    }
}
