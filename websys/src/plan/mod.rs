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

//! The ordered resource plan a synthesis run produces.
//!
//! A plan is a list of [`ResourceIntent`]s. Each intent only depends on
//! intents emitted before it, so a provisioning engine can create the
//! resources in plan order.

mod sink;

pub use sink::{JsonSink, LogSink, MemorySink, ProvisioningSink};

use crate::error::{Result, WebSysError};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

/// The kind of cloud resource an intent creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Category {
    /// Messaging topic.
    Topic,
    /// Resource policy of a topic.
    TopicPolicy,
    /// Subscription of a function to a topic.
    Subscription,
    /// Front-end app.
    App,
    /// Branch of a front-end app.
    AppBranch,
    /// Custom domain of a front-end app.
    AppDomain,
    /// Login client of a user pool.
    UserPoolClient,
    /// Identity pool.
    IdentityPool,
    /// IAM role.
    Role,
    /// Role attachment of an identity pool.
    RoleAttachment,
    /// Event bus rule.
    EventRule,
    /// HTTP API.
    Api,
    /// Stage of an HTTP API.
    Stage,
    /// Custom domain of an HTTP API.
    DomainName,
    /// DNS alias record.
    DnsRecord,
    /// Mapping of a stage onto a custom domain.
    ApiMapping,
    /// JWT authorizer.
    Authorizer,
    /// Function integration of an HTTP API.
    Integration,
    /// Route of an HTTP API.
    Route,
    /// Bucket.
    Bucket,
    /// Container image repository.
    Repository,
    /// Lambda function.
    Function,
    /// Resource-based invoke permission of a function.
    Permission,
    /// Test event schema of a function.
    EventSchema,
    /// Message queue.
    Queue,
    /// Queue trigger of a function.
    EventSourceMapping,
    /// Batch compute environment.
    ComputeEnvironment,
    /// Batch job queue.
    JobQueue,
    /// Batch job definition.
    JobDefinition,
    /// Log group.
    LogGroup,
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Graph construction phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Phase {
    /// Topics and their nested functions.
    Messaging,
    /// Front-end apps and their login clients.
    Frontend,
    /// The HTTP API.
    Gateway,
    /// Buckets and container repositories.
    Storage,
    /// Branch functions and their queues.
    Compute,
    /// Branch batch jobs.
    Batch,
}

impl Phase {
    /// All phases, in execution order.
    pub const ALL: [Phase; 6] = [
        Phase::Messaging,
        Phase::Frontend,
        Phase::Gateway,
        Phase::Storage,
        Phase::Compute,
        Phase::Batch,
    ];
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stable identity of an intent, `"{category}/{physical_name}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Creates the handle of a resource.
    pub fn new(category: Category, physical_name: &str) -> Handle {
        Handle(format!("{}/{}", category, physical_name))
    }

    /// The handle as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token standing for an attribute only known after provisioning.
    pub fn attr(&self, attribute: &str) -> String {
        format!("${{{}.{}}}", self.0, attribute)
    }

    /// Token of the provisioned ARN.
    pub fn arn(&self) -> String {
        self.attr("Arn")
    }

    /// Token of the provisioned id.
    pub fn reference(&self) -> String {
        self.attr("Ref")
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One resource-creation operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceIntent {
    /// Identity of the intent.
    pub handle:        Handle,
    /// Resource kind.
    pub category:      Category,
    /// Phase that emitted the intent.
    pub phase:         Phase,
    /// Physical resource name.
    pub physical_name: String,
    /// Provider-facing properties; may contain handle tokens.
    pub attributes:    Value,
    /// Intents that must be provisioned first.
    #[serde(rename = "dependsOn")]
    pub depends_on:    Vec<Handle>,
}

impl ResourceIntent {
    /// Creates an intent without dependencies.
    pub fn new(category: Category, phase: Phase, physical_name: &str, attributes: Value) -> Self {
        ResourceIntent {
            handle: Handle::new(category, physical_name),
            category,
            phase,
            physical_name: physical_name.to_owned(),
            attributes,
            depends_on: vec![],
        }
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, handle: &Handle) -> Self {
        if !self.depends_on.contains(handle) {
            self.depends_on.push(handle.clone());
        }
        self
    }

    /// Adds several dependencies.
    pub fn depends_on_all<'a, I>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = &'a Handle>,
    {
        for handle in handles {
            self = self.depends_on(handle);
        }
        self
    }
}

/// A dependency-ordered list of intents plus the stack-wide tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    /// Tags applied to every resource.
    pub tags:    BTreeMap<String, String>,
    intents:     Vec<ResourceIntent>,
    #[serde(skip)]
    emitted:     HashSet<Handle>,
}

impl Plan {
    /// Creates an empty plan.
    pub fn new(tags: BTreeMap<String, String>) -> Plan {
        Plan {
            tags,
            ..Default::default()
        }
    }

    /// Appends an intent and returns its handle.
    ///
    /// Fails with [`WebSysError::DuplicateResource`] when the handle was
    /// already emitted, and with [`WebSysError::Internal`] when a dependency
    /// was not.
    pub fn push(&mut self, intent: ResourceIntent) -> Result<Handle> {
        if self.contains(&intent.handle) {
            return Err(WebSysError::DuplicateResource(format!(
                "{} is emitted twice",
                intent.handle
            )));
        }
        if let Some(missing) = intent.depends_on.iter().find(|h| !self.contains(h)) {
            return Err(WebSysError::Internal(format!(
                "{} depends on {} which is not emitted yet",
                intent.handle, missing
            )));
        }
        debug!("[{}] {}", intent.phase, intent.handle);
        let handle = intent.handle.clone();
        self.emitted.insert(handle.clone());
        self.intents.push(intent);
        Ok(handle)
    }

    /// Whether an intent with this handle exists.
    pub fn contains(&self, handle: &Handle) -> bool {
        self.emitted.contains(handle)
    }

    /// Looks up an intent by category and physical name.
    pub fn find(&self, category: Category, physical_name: &str) -> Option<&ResourceIntent> {
        let handle = Handle::new(category, physical_name);
        self.intents.iter().find(|i| i.handle == handle)
    }

    /// Intents of one category, in plan order.
    pub fn by_category(&self, category: Category) -> Vec<&ResourceIntent> {
        self.intents.iter().filter(|i| i.category == category).collect()
    }

    /// All intents, in plan order.
    pub fn intents(&self) -> &[ResourceIntent] {
        &self.intents
    }

    /// Number of intents.
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Feeds every intent to `sink`, in order, then finishes it.
    pub fn apply(&self, sink: &mut dyn ProvisioningSink) -> Result<()> {
        for intent in &self.intents {
            sink.provision(intent)?;
        }
        sink.finish(&self.tags)
    }

    /// The plan as a pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
