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

use super::{env_keys, GraphBuilder};
use crate::configs::{
    FunctionConfig, WEBSYS_LAMBDA_TIMEOUT, WEBSYS_QUEUE_BATCH_SIZE,
    WEBSYS_QUEUE_MAX_RECEIVE_COUNT, WEBSYS_TEST_EVENT_REGISTRY,
};
use crate::error::{Result, WebSysError};
use crate::plan::{Category, Handle, Phase, ResourceIntent};
use crate::reference::{Scope, StoreKey, StoreKind};
use crate::spec::{LambdaSpec, Runtime};
use log::{debug, info};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

/// Checks every `queue_next` edge of `functions`: the target must exist, must
/// declare a `queue` block, and following the edges must never loop.
pub(crate) fn check_queue_chain(functions: &BTreeMap<String, LambdaSpec>) -> Result<()> {
    for (key, spec) in functions {
        if let Some(next) = &spec.queue_next {
            match functions.get(next) {
                None => {
                    return Err(WebSysError::ReferentialIntegrity(format!(
                        "lambda '{}' spec not found: requested by queue_next of `{}`",
                        next, key
                    )))
                }
                Some(target) if target.queue.is_none() => {
                    return Err(WebSysError::ReferentialIntegrity(format!(
                        "lambda '{}' spec should have `queue` key: requested by queue_next of `{}`",
                        next, key
                    )))
                }
                Some(_) => {}
            }
        }
    }

    // Every function has at most one successor, so a walk from each start
    // either ends or revisits a key of its own path.
    let mut acyclic: BTreeSet<&str> = BTreeSet::new();
    for start in functions.keys() {
        let mut path: Vec<&str> = vec![];
        let mut current = Some(start.as_str());
        while let Some(key) = current {
            if acyclic.contains(key) {
                break;
            }
            if let Some(pos) = path.iter().position(|k| *k == key) {
                let mut cycle: Vec<&str> = path[pos..].to_vec();
                cycle.push(key);
                return Err(WebSysError::ReferentialIntegrity(format!(
                    "queue_next chain forms a cycle: {}",
                    cycle.join(" -> ")
                )));
            }
            path.push(key);
            current = functions.get(key).and_then(|s| s.queue_next.as_deref());
        }
        acyclic.extend(path);
    }
    Ok(())
}

impl<'a> GraphBuilder<'a> {
    /// The branch functions of `branch`.
    pub(super) fn build_compute(&mut self, branch: &str) -> Result<()> {
        let spec = self.spec;
        if spec.lambda_func.is_empty() {
            info!("No lambda_func for branch {}, nothing to compute", branch);
            return Ok(());
        }
        info!("Building compute of branch {}", branch);
        self.build_functions(&spec.lambda_func, Some(branch), None, Phase::Compute)
    }

    /// Builds one function map. `branch` is `None` for functions shared by
    /// all branches; `sender` is the topic feeding the functions, if any.
    pub(super) fn build_functions(
        &mut self,
        functions: &BTreeMap<String, LambdaSpec>,
        branch: Option<&str>,
        sender: Option<&Handle>,
        phase: Phase,
    ) -> Result<()> {
        check_queue_chain(functions)?;

        let spec = self.spec;
        for (key, lambda) in functions {
            let function_name = self.names.lambda_name(key, branch);
            let runtime = Runtime::resolve(lambda.runtime.as_deref(), spec.default_runtime.as_deref())?;
            let layers = self
                .refs
                .layer_arns(&lambda.layer_list, &format!("layer_list of `{}`", key))?;

            let mut environment = self.base_env(branch);
            if let Some(next) = &lambda.queue_next {
                environment.insert(
                    env_keys::NEXT_SQS.to_owned(),
                    self.names.waiting_queue_name(next, branch),
                );
            }

            let timeout = lambda.effective_timeout(*WEBSYS_LAMBDA_TIMEOUT);
            let mut config = FunctionConfig::new(&function_name, &spec.lambda_handler, runtime);
            config
                .set_timeout(timeout)
                .set_memory_size(lambda.memory_size)
                .set_storage_size(lambda.storage_size)
                .set_layers(layers)
                .set_environment(environment)
                .add_managed_policies(&lambda.managed_policy);
            if branch.is_some() {
                config.add_managed_policies(&spec.common_lambda_policy);
            }
            if let Some(code) = &lambda.code {
                config.set_code(&self.resolve_path(code).to_string_lossy());
            }

            let function = self.emit(ResourceIntent::new(
                Category::Function,
                phase,
                &function_name,
                config.to_attributes(),
            ))?;

            if let Some(test) = &lambda.test {
                self.emit_test_event_schema(phase, &function_name, &function, test)?;
            }

            let integrated = branch.is_some()
                && spec
                    .apigw
                    .as_ref()
                    .map_or(false, |apigw| apigw.lambda_integration.contains_key(key));
            if integrated {
                let gateway = self.refs.store_mut().read(
                    &StoreKey::new(StoreKind::Gateway, Scope::Shared, &spec.api_name),
                    &format!("lambda_integration of `{}`", key),
                )?;
                let source_arn = self.names.execute_api_arn(&gateway.reference());
                self.emit_invoke_permission(
                    phase,
                    &format!("{}-permission", function_name),
                    &function,
                    "apigateway.amazonaws.com",
                    json!(source_arn),
                    Some(&gateway),
                )?;
            }

            if let Some(topic) = sender {
                self.emit(
                    ResourceIntent::new(
                        Category::Subscription,
                        phase,
                        &format!("{}-subscription", function_name),
                        json!({
                            "protocol": "lambda",
                            "topic_arn": topic.arn(),
                            "endpoint": function.arn(),
                        }),
                    )
                    .depends_on(topic)
                    .depends_on(&function),
                )?;
                self.emit_invoke_permission(
                    phase,
                    &format!("{}-sns-permission", function_name),
                    &function,
                    "sns.amazonaws.com",
                    json!(topic.arn()),
                    Some(topic),
                )?;
            }

            if let Some(visibility_timeout) = lambda.visibility_timeout(*WEBSYS_LAMBDA_TIMEOUT)? {
                self.emit_queue_pair(phase, key, branch, &function, visibility_timeout)?;
            }

            self.refs.store_mut().write(
                StoreKey::new(StoreKind::Function, Scope::of(branch), key),
                function,
            )?;
        }
        Ok(())
    }

    /// The waiting queue feeding a function, its dead-letter queue, and the
    /// trigger binding the waiting queue to the function.
    fn emit_queue_pair(
        &mut self,
        phase: Phase,
        key: &str,
        branch: Option<&str>,
        function: &Handle,
        visibility_timeout: i64,
    ) -> Result<()> {
        let dead_name = self.names.dead_queue_name(key, branch);
        let dead = self.emit(ResourceIntent::new(
            Category::Queue,
            phase,
            &dead_name,
            json!({ "queue_name": dead_name }),
        ))?;

        let waiting_name = self.names.waiting_queue_name(key, branch);
        debug!("{} visibility timeout {}s", waiting_name, visibility_timeout);
        let waiting = self.emit(
            ResourceIntent::new(
                Category::Queue,
                phase,
                &waiting_name,
                json!({
                    "queue_name": waiting_name,
                    "visibility_timeout": visibility_timeout,
                    "dead_letter_queue": {
                        "target_arn": dead.arn(),
                        "max_receive_count": *WEBSYS_QUEUE_MAX_RECEIVE_COUNT,
                    },
                }),
            )
            .depends_on(&dead),
        )?;

        self.emit(
            ResourceIntent::new(
                Category::EventSourceMapping,
                phase,
                &format!("{}-trigger", waiting_name),
                json!({
                    "event_source_arn": waiting.arn(),
                    "function_name": function.reference(),
                    "batch_size": *WEBSYS_QUEUE_BATCH_SIZE,
                }),
            )
            .depends_on(&waiting)
            .depends_on(function),
        )?;
        Ok(())
    }

    /// Registers the OpenAPI test event schema of a function.
    fn emit_test_event_schema(
        &mut self,
        phase: Phase,
        function_name: &str,
        function: &Handle,
        path: &str,
    ) -> Result<()> {
        let path = self.resolve_path(path);
        let content = fs::read_to_string(&path).map_err(|e| {
            WebSysError::MissingPrerequisite(format!(
                "cannot read test event schema {} of {}: {}",
                path.display(),
                function_name,
                e
            ))
        })?;
        let schema_name = format!("{}-schema", function_name);
        self.emit(
            ResourceIntent::new(
                Category::EventSchema,
                phase,
                &schema_name,
                json!({
                    "registry_name": *WEBSYS_TEST_EVENT_REGISTRY,
                    "schema_name": format!("_{}", schema_name),
                    "type": "OpenApi3",
                    "description": "test event for lambda",
                    "content": content,
                }),
            )
            .depends_on(function),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::build_from_json;
    use serde_json::{json, Value};

    fn functions(value: Value) -> BTreeMap<String, LambdaSpec> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn queue_chain_errors_name_both_keys() {
        let err = check_queue_chain(&functions(json!({"B": {"queue_next": "C"}}))).unwrap_err();
        match err {
            WebSysError::ReferentialIntegrity(desc) => {
                assert!(desc.contains("'C'"), "{}", desc);
                assert!(desc.contains("`B`"), "{}", desc);
            }
            other => panic!("unexpected error: {}", other),
        }

        let err = check_queue_chain(&functions(json!({"A": {}, "B": {"queue_next": "A"}})))
            .unwrap_err();
        match err {
            WebSysError::ReferentialIntegrity(desc) => {
                assert!(desc.contains("`queue`"), "{}", desc);
                assert!(desc.contains("'A'") && desc.contains("`B`"), "{}", desc);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn queue_chain_cycles() {
        let err = check_queue_chain(&functions(json!({
            "A": {"queue": {}, "queue_next": "B"},
            "B": {"queue": {}, "queue_next": "C"},
            "C": {"queue": {}, "queue_next": "A"},
        })))
        .unwrap_err();
        assert_eq!(
            "Referential integrity error: queue_next chain forms a cycle: A -> B -> C -> A",
            err.to_string()
        );

        let err = check_queue_chain(&functions(json!({"A": {"queue": {}, "queue_next": "A"}})))
            .unwrap_err();
        assert!(err.to_string().ends_with("A -> A"));

        // a chain feeding into a shared tail is fine
        assert!(check_queue_chain(&functions(json!({
            "A": {"queue_next": "C"},
            "B": {"queue_next": "C"},
            "C": {"queue": {}},
        })))
        .is_ok());
    }

    #[tokio::test]
    async fn function_attributes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("event.yaml"), "openapi: 3.0.0\n")?;

        let output = crate::tests::build_with_root(
            json!({
                "service_name": "shop",
                "api_name": "shop-api",
                "branch": {"main": {}},
                "lambda_handler": "api.lambda_function.handler",
                "default_runtime": "PYTHON_3_11",
                "common_lambda_policy": ["AmazonSQSFullAccess"],
                "ref": {"lambda_layer": {"np": "arn:aws:lambda:us-east-1:1:layer:numpy:3"}},
                "lambda_func": {
                    "echo": {
                        "code": "src/echo",
                        "memory_size": 256,
                        "storage_size": 1024,
                        "layer_list": ["np"],
                        "managed_policy": ["AmazonS3FullAccess"],
                        "test": "event.yaml"
                    },
                    "legacy": {"runtime": "python3.9"}
                }
            }),
            dir.path(),
        )
        .await?;

        let echo = output
            .plan
            .find(Category::Function, "shop-api-main-echo")
            .unwrap();
        let attributes = &echo.attributes;
        assert_eq!("python3.11", attributes["runtime"]);
        assert_eq!("api.lambda_function.handler", attributes["handler"]);
        assert_eq!(
            dir.path().join("src/echo").to_string_lossy().as_ref(),
            attributes["code"].as_str().unwrap()
        );
        assert_eq!(256, attributes["memory_size"]);
        assert_eq!(1024, attributes["storage_size"]);
        assert_eq!(
            "arn:aws:lambda:us-east-1:1:layer:numpy:3",
            attributes["layers"][0]
        );
        assert_eq!(
            json!([
                "service-role/AWSLambdaBasicExecutionRole",
                "AmazonS3FullAccess",
                "AmazonSQSFullAccess"
            ]),
            attributes["managed_policies"]
        );

        let schema = output
            .plan
            .find(Category::EventSchema, "shop-api-main-echo-schema")
            .unwrap();
        assert_eq!("_shop-api-main-echo-schema", schema.attributes["schema_name"]);
        assert_eq!("openapi: 3.0.0\n", schema.attributes["content"]);

        let legacy = output
            .plan
            .find(Category::Function, "shop-api-main-legacy")
            .unwrap();
        assert_eq!("python3.9", legacy.attributes["runtime"]);
        assert_eq!("initial_lambda", legacy.attributes["code"]);
        Ok(())
    }

    #[tokio::test]
    async fn undeclared_layer_is_rejected() {
        let err = build_from_json(json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {"main": {}},
            "lambda_handler": "h",
            "lambda_func": {"echo": {"layer_list": ["np"]}}
        }))
        .await
        .unwrap_err();
        assert!(matches!(err, WebSysError::ReferentialIntegrity(_)));
    }

    #[tokio::test]
    async fn queue_trigger() -> Result<()> {
        let output = build_from_json(json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {"main": {}},
            "lambda_handler": "h",
            "lambda_func": {"worker": {"queue": {}}}
        }))
        .await?;

        let waiting = output
            .plan
            .find(Category::Queue, "shop-api-main-worker_waiting")
            .unwrap();
        assert_eq!(
            "${Queue/shop-api-main-worker_dead.Arn}",
            waiting.attributes["dead_letter_queue"]["target_arn"]
        );
        assert_eq!(3, waiting.attributes["dead_letter_queue"]["max_receive_count"]);

        let trigger = output
            .plan
            .find(
                Category::EventSourceMapping,
                "shop-api-main-worker_waiting-trigger",
            )
            .unwrap();
        assert_eq!(1, trigger.attributes["batch_size"]);
        assert_eq!(
            "${Function/shop-api-main-worker.Ref}",
            trigger.attributes["function_name"]
        );
        Ok(())
    }
}
