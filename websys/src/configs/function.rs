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

//! Helper functions to describe a Lambda function.

use crate::configs::{WEBSYS_BASIC_EXECUTION_POLICY, WEBSYS_DEFAULT_CODE, WEBSYS_LAMBDA_TIMEOUT};
use crate::spec::Runtime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Lambda function configuration, rendered into the attributes of a function
/// intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionConfig {
    /// The physical function name, e.g. `shop-api-main-echo`.
    ///
    /// The length constraint of the Lambda API applies only to the full ARN.
    /// If only the function name is given, it is limited to 64 characters.
    pub function_name:    String,
    /// The runtime identifier, e.g. `python3.12`.
    pub runtime:          String,
    /// The method in the function code that processes events.
    pub handler:          String,
    /// Path of the code asset.
    pub code:             String,
    /// The maximum execution time in seconds. Lambda caps it at 900s.
    pub timeout:          i64,
    /// Memory in MB, between 128MB and 10,240MB in 1MB increments. `None`
    /// keeps the Lambda default.
    pub memory_size:      Option<i64>,
    /// Ephemeral storage in MB.
    pub storage_size:     Option<i64>,
    /// Versioned layer ARNs.
    pub layers:           Vec<String>,
    /// Environment variables.
    pub environment:      BTreeMap<String, String>,
    /// Managed policies attached to the execution role, basic execution
    /// first.
    pub managed_policies: Vec<String>,
}

impl FunctionConfig {
    /// Creates a function configuration with the built-in defaults.
    pub fn new(function_name: &str, handler: &str, runtime: Runtime) -> FunctionConfig {
        FunctionConfig {
            function_name:    function_name.to_owned(),
            runtime:          runtime.identifier().to_owned(),
            handler:          handler.to_owned(),
            code:             WEBSYS_DEFAULT_CODE.to_string(),
            timeout:          *WEBSYS_LAMBDA_TIMEOUT,
            memory_size:      None,
            storage_size:     None,
            layers:           vec![],
            environment:      BTreeMap::new(),
            managed_policies: vec![WEBSYS_BASIC_EXECUTION_POLICY.to_string()],
        }
    }

    /// Sets the code asset path.
    pub fn set_code(&mut self, code: &str) -> &mut Self {
        self.code = code.to_owned();
        self
    }

    /// Sets the timeout in seconds.
    pub fn set_timeout(&mut self, timeout: i64) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Sets the memory size.
    pub fn set_memory_size(&mut self, memory_size: Option<i64>) -> &mut Self {
        self.memory_size = memory_size;
        self
    }

    /// Sets the ephemeral storage size.
    pub fn set_storage_size(&mut self, storage_size: Option<i64>) -> &mut Self {
        self.storage_size = storage_size;
        self
    }

    /// Sets the layer ARNs.
    pub fn set_layers(&mut self, layers: Vec<String>) -> &mut Self {
        self.layers = layers;
        self
    }

    /// Sets the environment variables.
    pub fn set_environment(&mut self, environment: BTreeMap<String, String>) -> &mut Self {
        self.environment = environment;
        self
    }

    /// Appends managed policies, skipping ones already attached.
    pub fn add_managed_policies<'a, I>(&mut self, policies: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        for policy in policies {
            if !self.managed_policies.contains(policy) {
                self.managed_policies.push(policy.clone());
            }
        }
        self
    }

    /// Renders the configuration as intent attributes.
    pub fn to_attributes(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
