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

//! Deterministic physical names for every resource websys emits.
//!
//! All names are pure functions of `(api_name, branch, logical key)`; nothing
//! here touches the registry or the network. Re-running a synthesis on an
//! unchanged spec therefore yields the same names, which is what lets the
//! provisioning engine converge instead of duplicating resources.

use crate::configs::WEBSYS_REGISTRY_HOST;
use crate::template::{substitute, Placeholder, Substitutions};

/// The AWS account and region a service is deployed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeployEnv {
    /// The AWS account id.
    pub account: String,
    /// The AWS region name.
    pub region:  String,
}

impl DeployEnv {
    /// Creates a new deployment environment.
    pub fn new<T>(account: T, region: T) -> Self
    where
        T: Into<String>,
    {
        DeployEnv {
            account: account.into(),
            region:  region.into(),
        }
    }
}

/// Names of the resources making up one batch job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchNames {
    /// `{api}-{branch}-{key}`; also the log group name.
    pub batch:               String,
    /// The Fargate compute environment.
    pub compute_environment: String,
    /// The job queue.
    pub job_queue:           String,
    /// The job definition.
    pub job_definition:      String,
    /// Role assumed by the batch service.
    pub service_role:        String,
    /// Role used to pull the image and ship logs.
    pub execution_role:      String,
    /// Role assumed by the running job.
    pub job_role:            String,
    /// The job state-change rule.
    pub rule:                String,
}

/// Maps logical keys to physical names for one api.
#[derive(Debug, Clone)]
pub struct NameSolver {
    api_name: String,
    env:      DeployEnv,
}

impl NameSolver {
    /// Creates a name solver for `api_name` deployed to `env`.
    pub fn new(api_name: impl Into<String>, env: DeployEnv) -> Self {
        NameSolver {
            api_name: api_name.into(),
            env,
        }
    }

    /// The api name every physical name is prefixed with.
    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    /// The deployment environment.
    pub fn env(&self) -> &DeployEnv {
        &self.env
    }

    /// `{api}-{branch}-{key}`, or `{api}-{key}` for functions shared by all
    /// branches (topic subscribers).
    pub fn lambda_name(&self, key: &str, branch: Option<&str>) -> String {
        match branch {
            Some(branch) => format!("{}-{}-{}", self.api_name, branch, key),
            None => format!("{}-{}", self.api_name, key),
        }
    }

    /// The inbound queue of a function: `{lambda_name}_waiting`.
    pub fn waiting_queue_name(&self, key: &str, branch: Option<&str>) -> String {
        format!("{}_waiting", self.lambda_name(key, branch))
    }

    /// The dead-letter queue of a function: `{lambda_name}_dead`.
    pub fn dead_queue_name(&self, key: &str, branch: Option<&str>) -> String {
        format!("{}_dead", self.lambda_name(key, branch))
    }

    /// `{api}-{topic_key}`.
    pub fn topic_name(&self, key: &str) -> String {
        format!("{}-{}", self.api_name, key)
    }

    /// `{api}-{key}`: the container repository of a batch job, shared by all
    /// branches (each branch pushes its own tag).
    pub fn repository_name(&self, key: &str) -> String {
        format!("{}-{}", self.api_name, key)
    }

    /// `{api}-{branch}-{key}`.
    pub fn batch_name(&self, key: &str, branch: &str) -> String {
        format!("{}-{}-{}", self.api_name, branch, key)
    }

    /// All resource names of one batch job.
    pub fn batch_names(&self, key: &str, branch: &str) -> BatchNames {
        let batch = self.batch_name(key, branch);
        let job_queue = format!("{}-JobQueue", batch);
        BatchNames {
            compute_environment: format!("{}-ComputeEnvironment", batch),
            job_definition: format!("{}-JobDef", batch),
            service_role: format!("{}-BatchServiceRole", batch),
            execution_role: format!("{}-ExecutionRole", batch),
            job_role: format!("{}-JobRole", batch),
            rule: format!("{}-notice", job_queue),
            job_queue,
            batch,
        }
    }

    /// The registry host for the configured region.
    pub fn registry_host(&self) -> String {
        let subs = Substitutions::new().with(Placeholder::Region, self.env.region.as_str());
        substitute(&WEBSYS_REGISTRY_HOST, &subs)
    }

    /// `{account}.{registry_host}/{api}-{key}:{branch}`.
    pub fn container_url(&self, key: &str, branch: &str) -> String {
        format!(
            "{}.{}/{}:{}",
            self.env.account,
            self.registry_host(),
            self.repository_name(key),
            branch
        )
    }

    /// `auth-{user}-{app}`: one JWT authorizer per (user pool, app) pair.
    pub fn authorizer_name(&self, user: &str, app: &str) -> String {
        format!("auth-{}-{}", user, app)
    }

    /// The function an integration targets; the branch is picked at request
    /// time from the stage variable.
    pub fn integration_function_name(&self, key: &str, stage_variable: &str) -> String {
        format!(
            "{}-${{stageVariables.{}}}-{}",
            self.api_name, stage_variable, key
        )
    }

    /// `{app}-client`.
    pub fn client_name(&self, app: &str) -> String {
        format!("{}-client", app)
    }

    /// `arn:aws:lambda:{region}:{account}:function:{name}`.
    pub fn lambda_function_arn(&self, function_name: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}",
            self.env.region, self.env.account, function_name
        )
    }

    /// `arn:aws:lambda:{region}:{account}:layer:{name}:{version}`.
    pub fn layer_version_arn(&self, layer_name: &str, version: i64) -> String {
        format!(
            "arn:aws:lambda:{}:{}:layer:{}:{}",
            self.env.region, self.env.account, layer_name, version
        )
    }

    /// The JWT issuer of a user pool.
    pub fn user_pool_url(&self, user_pool_id: &str) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.env.region, user_pool_id
        )
    }

    /// The source ARN covering every stage, method and path of an api.
    pub fn execute_api_arn(&self, api_id: &str) -> String {
        format!(
            "arn:aws:execute-api:{}:{}:{}/*/*/*",
            self.env.region, self.env.account, api_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn names() -> NameSolver {
        NameSolver::new("shop", DeployEnv::new("123456789012", "us-west-2"))
    }

    #[test]
    fn lambda_and_queue_names() {
        let names = names();
        assert_eq!("shop-main-echo", names.lambda_name("echo", Some("main")));
        assert_eq!("shop-echo", names.lambda_name("echo", None));
        assert_eq!(
            "shop-dev-echo_waiting",
            names.waiting_queue_name("echo", Some("dev"))
        );
        assert_eq!("shop-dev-echo_dead", names.dead_queue_name("echo", Some("dev")));
        assert_eq!("shop-notify", names.topic_name("notify"));
    }

    #[test]
    fn batch_and_container_names() {
        let names = names();
        let batch = names.batch_names("render", "main");
        assert_eq!("shop-main-render", batch.batch);
        assert_eq!("shop-main-render-JobQueue", batch.job_queue);
        assert_eq!("shop-main-render-JobQueue-notice", batch.rule);
        assert_eq!("shop-main-render-ComputeEnvironment", batch.compute_environment);
        assert_eq!(
            "123456789012.dkr.ecr.us-west-2.amazonaws.com/shop-render:main",
            names.container_url("render", "main")
        );
    }

    #[test]
    fn arns() {
        let names = names();
        assert_eq!(
            "arn:aws:lambda:us-west-2:123456789012:layer:numpy:7",
            names.layer_version_arn("numpy", 7)
        );
        assert_eq!(
            "https://cognito-idp.us-west-2.amazonaws.com/us-west-2_abc",
            names.user_pool_url("us-west-2_abc")
        );
        assert_eq!(
            "arn:aws:execute-api:us-west-2:123456789012:abc123/*/*/*",
            names.execute_api_arn("abc123")
        );
        assert_eq!(
            "shop-${stageVariables.branch}-echo",
            names.integration_function_name("echo", "branch")
        );
    }

    #[test]
    fn names_are_deterministic() {
        let a = names();
        let b = names();
        for key in ["echo", "worker", "render"] {
            for branch in ["main", "dev"] {
                assert_eq!(a.lambda_name(key, Some(branch)), b.lambda_name(key, Some(branch)));
                assert_eq!(a.container_url(key, branch), b.container_url(key, branch));
            }
        }
    }

    #[test]
    fn distinct_inputs_never_collide() {
        let names = names();
        let branches = ["main", "dev"];
        let keys = ["echo", "pipeline_entry"];

        // Categories live in separate AWS namespaces, so a name only has to be
        // unique within its category.
        let mut produced: Vec<(&str, String)> = vec![];
        for branch in branches {
            for key in keys {
                produced.push(("function", names.lambda_name(key, Some(branch))));
                produced.push(("queue", names.waiting_queue_name(key, Some(branch))));
                produced.push(("queue", names.dead_queue_name(key, Some(branch))));
                produced.push(("batch", names.batch_name(key, branch)));
                produced.push(("container", names.container_url(key, branch)));
            }
        }
        for key in keys {
            produced.push(("topic", names.topic_name(key)));
            produced.push(("function", names.lambda_name(key, None)));
        }

        let mut seen = HashSet::new();
        for entry in &produced {
            assert!(seen.insert(entry.clone()), "collision on {:?}", entry);
        }
        assert_eq!(produced.len(), seen.len());
    }
}
