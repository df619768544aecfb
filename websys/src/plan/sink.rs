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

//! Provisioning sinks: the boundary where a plan leaves websys.

use super::ResourceIntent;
use crate::error::Result;
use log::info;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;

/// Executes resource intents, in the order given.
pub trait ProvisioningSink {
    /// Provisions one intent. Every dependency of the intent was provisioned
    /// before.
    fn provision(&mut self, intent: &ResourceIntent) -> Result<()>;

    /// Called once after the last intent, with the stack-wide tags.
    fn finish(&mut self, tags: &BTreeMap<String, String>) -> Result<()>;
}

/// Collects intents in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Intents received so far.
    pub intents:  Vec<ResourceIntent>,
    /// Tags received on finish.
    pub tags:     BTreeMap<String, String>,
    /// Whether `finish` was called.
    pub finished: bool,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> MemorySink {
        MemorySink::default()
    }
}

impl ProvisioningSink for MemorySink {
    fn provision(&mut self, intent: &ResourceIntent) -> Result<()> {
        self.intents.push(intent.clone());
        Ok(())
    }

    fn finish(&mut self, tags: &BTreeMap<String, String>) -> Result<()> {
        self.tags = tags.clone();
        self.finished = true;
        Ok(())
    }
}

/// Writes the plan as one JSON document `{"tags": .., "intents": [..]}`.
pub struct JsonSink<W: Write> {
    writer:  W,
    intents: Vec<ResourceIntent>,
}

impl<W: Write> JsonSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> JsonSink<W> {
        JsonSink {
            writer,
            intents: vec![],
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ProvisioningSink for JsonSink<W> {
    fn provision(&mut self, intent: &ResourceIntent) -> Result<()> {
        self.intents.push(intent.clone());
        Ok(())
    }

    fn finish(&mut self, tags: &BTreeMap<String, String>) -> Result<()> {
        let document = json!({
            "tags": tags,
            "intents": self.intents,
        });
        serde_json::to_writer_pretty(&mut self.writer, &document)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs every intent.
#[derive(Debug, Default)]
pub struct LogSink {
    count: usize,
}

impl LogSink {
    /// Creates a logging sink.
    pub fn new() -> LogSink {
        LogSink::default()
    }

    /// Intents provisioned so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl ProvisioningSink for LogSink {
    fn provision(&mut self, intent: &ResourceIntent) -> Result<()> {
        self.count += 1;
        if intent.depends_on.is_empty() {
            info!("[{}] {}", intent.phase, intent.handle);
        } else {
            let deps: Vec<&str> = intent.depends_on.iter().map(|h| h.as_str()).collect();
            info!("[{}] {} <- {}", intent.phase, intent.handle, deps.join(", "));
        }
        Ok(())
    }

    fn finish(&mut self, tags: &BTreeMap<String, String>) -> Result<()> {
        info!("{} resources planned, {} stack tags", self.count, tags.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Category, Phase, Plan};

    fn sample_plan() -> Result<Plan> {
        let mut tags = BTreeMap::new();
        tags.insert("team".to_string(), "web".to_string());
        let mut plan = Plan::new(tags);
        let topic = plan.push(ResourceIntent::new(
            Category::Topic,
            Phase::Messaging,
            "shop-api-alerts",
            json!({"topic_name": "shop-api-alerts"}),
        ))?;
        plan.push(
            ResourceIntent::new(
                Category::TopicPolicy,
                Phase::Messaging,
                "shop-api-alerts-policy",
                json!({"topic": topic.reference()}),
            )
            .depends_on(&topic),
        )?;
        Ok(plan)
    }

    #[test]
    fn memory_sink_collects_in_order() -> Result<()> {
        let plan = sample_plan()?;
        let mut sink = MemorySink::new();
        plan.apply(&mut sink)?;
        assert!(sink.finished);
        assert_eq!(plan.intents(), sink.intents.as_slice());
        assert_eq!("web", sink.tags["team"]);
        Ok(())
    }

    #[test]
    fn json_sink_writes_document() -> Result<()> {
        let plan = sample_plan()?;
        let mut sink = JsonSink::new(Vec::new());
        plan.apply(&mut sink)?;
        let written: serde_json::Value = serde_json::from_slice(&sink.into_inner())?;
        assert_eq!("web", written["tags"]["team"]);
        assert_eq!("Topic/shop-api-alerts", written["intents"][0]["handle"]);
        assert_eq!("Messaging", written["intents"][1]["phase"]);
        assert_eq!(json!(["Topic/shop-api-alerts"]), written["intents"][1]["dependsOn"]);
        assert_eq!(
            "${Topic/shop-api-alerts.Ref}",
            written["intents"][1]["attributes"]["topic"]
        );
        Ok(())
    }

    #[test]
    fn log_sink_counts() -> Result<()> {
        let plan = sample_plan()?;
        let mut sink = LogSink::new();
        plan.apply(&mut sink)?;
        assert_eq!(2, sink.count());
        Ok(())
    }
}
