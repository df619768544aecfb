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

//! Topics, buckets and batch jobs.

use super::LambdaSpec;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;

/// A messaging topic and the functions it feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicSpec {
    #[serde(default)]
    pub description: Option<String>,
    /// Functions subscribed to the topic. They are shared by all branches.
    #[serde(default)]
    pub lambda_func: Option<BTreeMap<String, LambdaSpec>>,
}

/// A bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BucketSpec {
    #[serde(default)]
    pub public_read:     bool,
    #[serde(default)]
    pub website_hosting: bool,
}

/// A container batch job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BatchFuncSpec {
    /// Upper bound of the compute environment.
    pub maxv_cpus:          i64,
    /// Memory requirement in MB.
    #[serde(default)]
    pub memory:             Option<i64>,
    /// vCPU requirement; fractional values such as `0.25` are allowed.
    #[serde(default)]
    pub vcpu:               Option<Number>,
    /// Branch function notified on job state changes.
    pub queue_state_lambda: String,
}
