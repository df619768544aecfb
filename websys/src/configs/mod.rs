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

//! This module provides various default configurations for Websys.

pub mod function;
pub use function::FunctionConfig;

mod settings;
pub use self::settings::WEBSYS_CONF;
use lazy_static::lazy_static;

lazy_static! {
    /// Fallback AWS region when neither a flag nor the environment names one.
    pub static ref WEBSYS_DEFAULT_REGION: String = WEBSYS_CONF["aws"]["region"].to_string();

    /// Lambda runtime used when neither the function nor the spec names one.
    pub static ref WEBSYS_DEFAULT_RUNTIME: String = WEBSYS_CONF["lambda"]["default_runtime"].to_string();
    /// Lambda timeout (seconds) assumed when the function spec omits it.
    pub static ref WEBSYS_LAMBDA_TIMEOUT: i64 = WEBSYS_CONF["lambda"]["default_timeout"].parse::<i64>().unwrap_or(3);
    /// Placeholder code asset for functions without a `code` path.
    pub static ref WEBSYS_DEFAULT_CODE: String = WEBSYS_CONF["lambda"]["default_code"].to_string();
    /// Managed policy every function role carries.
    pub static ref WEBSYS_BASIC_EXECUTION_POLICY: String = WEBSYS_CONF["lambda"]["basic_execution_policy"].to_string();
    /// Schema registry holding lambda test events.
    pub static ref WEBSYS_TEST_EVENT_REGISTRY: String = WEBSYS_CONF["lambda"]["test_event_registry"].to_string();

    /// Extra visibility timeout (seconds) added on top of the function timeout.
    pub static ref WEBSYS_QUEUE_ADDITIONAL_TIMEOUT: i64 = WEBSYS_CONF["sqs"]["additional_timeout"].parse::<i64>().unwrap_or(10);
    /// Receives before a message is moved to the dead-letter queue.
    pub static ref WEBSYS_QUEUE_MAX_RECEIVE_COUNT: i64 = WEBSYS_CONF["sqs"]["max_receive_count"].parse::<i64>().unwrap_or(3);
    /// Messages handed to one function invocation.
    pub static ref WEBSYS_QUEUE_BATCH_SIZE: i64 = WEBSYS_CONF["sqs"]["batch_size"].parse::<i64>().unwrap_or(1);

    /// Container registry host template, `{$region}` is substituted.
    pub static ref WEBSYS_REGISTRY_HOST: String = WEBSYS_CONF["ecr"]["registry_host"].to_string();
    /// Days before untagged images expire.
    pub static ref WEBSYS_UNTAGGED_MAX_AGE_DAYS: i64 = WEBSYS_CONF["ecr"]["untagged_max_age_days"].parse::<i64>().unwrap_or(7);

    /// Stage variable carrying the branch name.
    pub static ref WEBSYS_STAGE_VARIABLE: String = WEBSYS_CONF["apigw"]["stage_variable"].to_string();
    /// Stage used for branches that do not name one.
    pub static ref WEBSYS_DEFAULT_STAGE: String = WEBSYS_CONF["apigw"]["default_stage"].to_string();
    /// Methods allowed by the gateway CORS configuration.
    pub static ref WEBSYS_CORS_ALLOW_METHODS: Vec<String> = WEBSYS_CONF["apigw"]["cors_allow_methods"]
        .split(',')
        .map(|m| m.trim().to_string())
        .collect();
    /// Request field a JWT authorizer reads the token from.
    pub static ref WEBSYS_IDENTITY_SOURCE: String = WEBSYS_CONF["apigw"]["identity_source"].to_string();

    /// Callback URL used while developing a front-end app locally.
    pub static ref WEBSYS_LOCAL_CALLBACK_URL: String = WEBSYS_CONF["amplify"]["local_callback_url"].to_string();
}
