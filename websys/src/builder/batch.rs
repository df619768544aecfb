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

use super::GraphBuilder;
use crate::error::Result;
use crate::plan::{Category, Handle, Phase, ResourceIntent};
use crate::reference::{Scope, StoreKey, StoreKind};
use crate::spec::BatchFuncSpec;
use log::info;
use serde_json::{json, Value};

const BATCH_SERVICE_POLICIES: [&str; 1] = ["service-role/AWSBatchServiceRole"];
const EXECUTION_POLICIES: [&str; 1] = ["service-role/AmazonECSTaskExecutionRolePolicy"];
const JOB_POLICIES: [&str; 4] = [
    "service-role/AWSBatchServiceEventTargetRole",
    "service-role/AWSLambdaRole",
    "service-role/AWSLambdaSQSQueueExecutionRole",
    "AmazonS3FullAccess",
];

impl<'a> GraphBuilder<'a> {
    /// The batch jobs of `branch`. Without a VPC descriptor the jobs are
    /// skipped with a warning.
    pub(super) fn build_batch(&mut self, branch: &str) -> Result<()> {
        let spec = self.spec;
        let jobs = match &spec.batch_func {
            Some(jobs) if !jobs.is_empty() => jobs,
            _ => return Ok(()),
        };
        let vpc = match self.refs.vpc() {
            Some(vpc) => vpc.clone(),
            None => {
                self.warn(format!(
                    "cannot create batch func of branch '{}': vpc is not defined in spec",
                    branch
                ));
                return Ok(());
            }
        };

        info!("Building batch of branch {}", branch);
        for (key, job) in jobs {
            let function = self.refs.store_mut().read(
                &StoreKey::new(
                    StoreKind::Function,
                    Scope::Branch(branch.to_owned()),
                    &job.queue_state_lambda,
                ),
                &format!("queue_state_lambda of `{}`", key),
            )?;

            if vpc.subnet_id_list.is_empty() {
                self.warn(format!(
                    "ignore creating {} because vpc subnet_id_list is blank",
                    self.names.batch_name(key, branch)
                ));
                continue;
            }
            self.emit_job(
                key,
                job,
                branch,
                &function,
                &vpc.subnet_id_list,
                &vpc.security_group_id,
            )?;
        }
        Ok(())
    }

    fn emit_job(
        &mut self,
        key: &str,
        job: &BatchFuncSpec,
        branch: &str,
        function: &Handle,
        subnets: &[String],
        security_group_id: &str,
    ) -> Result<()> {
        let names = self.names.batch_names(key, branch);
        let phase = Phase::Batch;

        let service_role = self.emit_service_role(
            phase,
            &names.service_role,
            "batch.amazonaws.com",
            &BATCH_SERVICE_POLICIES,
        )?;
        let execution_role = self.emit_service_role(
            phase,
            &names.execution_role,
            "ecs-tasks.amazonaws.com",
            &EXECUTION_POLICIES,
        )?;
        let job_role =
            self.emit_service_role(phase, &names.job_role, "ecs-tasks.amazonaws.com", &JOB_POLICIES)?;

        let compute_environment = self.emit(
            ResourceIntent::new(
                Category::ComputeEnvironment,
                phase,
                &names.compute_environment,
                json!({
                    "compute_environment_name": names.compute_environment,
                    "type": "MANAGED",
                    "service_role": service_role.arn(),
                    "compute_resources": {
                        "type": "FARGATE",
                        "maxv_cpus": job.maxv_cpus,
                        "subnets": subnets,
                        "security_group_ids": [security_group_id],
                    },
                }),
            )
            .depends_on(&service_role),
        )?;

        let job_queue = self.emit(
            ResourceIntent::new(
                Category::JobQueue,
                phase,
                &names.job_queue,
                json!({
                    "job_queue_name": names.job_queue,
                    "priority": 1,
                    "compute_environment_order": [{
                        "compute_environment": compute_environment.arn(),
                        "order": 1,
                    }],
                }),
            )
            .depends_on(&compute_environment),
        )?;

        let rule = self.emit(
            ResourceIntent::new(
                Category::EventRule,
                phase,
                &names.rule,
                json!({
                    "rule_name": names.rule,
                    "event_pattern": {
                        "source": ["aws.batch"],
                        "detail_type": ["Batch Job State Change"],
                        "detail": {
                            "status": ["RUNNING", "SUCCEEDED", "FAILED"],
                            "jobQueue": [job_queue.arn()],
                        },
                    },
                    "targets": [function.arn()],
                }),
            )
            .depends_on(&job_queue)
            .depends_on(function),
        )?;
        self.emit_invoke_permission(
            phase,
            &format!("{}-permission", names.rule),
            function,
            "events.amazonaws.com",
            json!(rule.arn()),
            Some(&rule),
        )?;

        let log_group = self.emit(ResourceIntent::new(
            Category::LogGroup,
            phase,
            &names.batch,
            json!({ "log_group_name": names.batch }),
        ))?;

        let mut requirements = vec![];
        if let Some(memory) = job.memory {
            requirements.push(json!({"type": "MEMORY", "value": memory.to_string()}));
        }
        if let Some(vcpu) = &job.vcpu {
            requirements.push(json!({"type": "VCPU", "value": vcpu.to_string()}));
        }
        let environment: Vec<Value> = self
            .base_env(Some(branch))
            .into_iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();

        let repository = Handle::new(Category::Repository, &self.names.repository_name(key));
        self.emit(
            ResourceIntent::new(
                Category::JobDefinition,
                phase,
                &names.job_definition,
                json!({
                    "job_definition_name": names.job_definition,
                    "type": "container",
                    "platform_capabilities": ["FARGATE"],
                    "container_properties": {
                        "image": self.names.container_url(key, branch),
                        "environment": environment,
                        "execution_role_arn": execution_role.arn(),
                        "job_role_arn": job_role.arn(),
                        "log_configuration": {
                            "log_driver": "awslogs",
                            "options": {"awslogs-group": names.batch},
                        },
                        "resource_requirements": requirements,
                    },
                }),
            )
            .depends_on(&repository)
            .depends_on(&execution_role)
            .depends_on(&job_role)
            .depends_on(&log_group),
        )?;
        Ok(())
    }
}
