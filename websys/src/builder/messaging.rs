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
use crate::plan::{Category, Phase, ResourceIntent};
use crate::reference::{Scope, StoreKey, StoreKind};
use log::info;
use serde_json::json;

impl<'a> GraphBuilder<'a> {
    /// Topics, publishable by the event bus, and the functions subscribed to
    /// them.
    pub(super) fn build_messaging(&mut self) -> Result<()> {
        let spec = self.spec;
        let topics = match &spec.sns {
            Some(topics) => topics,
            None => {
                info!("No sns block, skipping the messaging phase");
                return Ok(());
            }
        };

        for (topic_key, topic_spec) in topics {
            let topic_name = self.names.topic_name(topic_key);
            let topic = self.emit(ResourceIntent::new(
                Category::Topic,
                Phase::Messaging,
                &topic_name,
                json!({
                    "topic_name": topic_name,
                    "display_name": topic_spec.description,
                }),
            ))?;

            let policy_name = format!("{}-policy", topic_name);
            self.emit(
                ResourceIntent::new(
                    Category::TopicPolicy,
                    Phase::Messaging,
                    &policy_name,
                    json!({
                        "topics": [topic.reference()],
                        "policy_document": {
                            "Statement": [{
                                "Effect": "Allow",
                                "Principal": {"Service": "events.amazonaws.com"},
                                "Action": "sns:Publish",
                                "Resource": topic.arn(),
                            }]
                        },
                    }),
                )
                .depends_on(&topic),
            )?;

            if let Some(functions) = &topic_spec.lambda_func {
                self.build_functions(functions, None, Some(&topic), Phase::Messaging)?;
            }

            self.refs.store_mut().write(
                StoreKey::new(StoreKind::Topic, Scope::Shared, topic_key),
                topic,
            )?;
        }
        Ok(())
    }
}
