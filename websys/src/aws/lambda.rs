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

//! This crate contains the wrapped AWS Lambda calls websys needs: finding the
//! latest published version of a layer.

use crate::error::{Result, WebSysError};
use async_trait::async_trait;
use log::{debug, info};
use rusoto_core::Region;
use rusoto_lambda::{Lambda, LambdaClient, ListLayerVersionsRequest};
use std::str::FromStr;

/// Looks up the latest published version of a layer.
///
/// The reference solver only depends on this trait so that synthesis can run
/// against a fake registry.
#[async_trait]
pub trait LayerVersionLookup: Send + Sync {
    /// Returns the highest version number published under `layer_name`.
    async fn latest_version(&self, layer_name: &str) -> Result<i64>;
}

/// [`LayerVersionLookup`] backed by the Lambda `ListLayerVersions` API.
pub struct AwsLayerVersionLookup {
    client: LambdaClient,
}

impl AwsLayerVersionLookup {
    /// Creates a lookup for the given region.
    ///
    /// # Arguments
    /// * `region` - The region name, e.g. `us-east-1`.
    pub fn try_new(region: &str) -> Result<AwsLayerVersionLookup> {
        let region = Region::from_str(region)
            .map_err(|e| WebSysError::ExternalLookup(format!("region '{}': {}", region, e)))?;
        Ok(AwsLayerVersionLookup {
            client: LambdaClient::new(region),
        })
    }
}

#[async_trait]
impl LayerVersionLookup for AwsLayerVersionLookup {
    async fn latest_version(&self, layer_name: &str) -> Result<i64> {
        let mut latest: Option<i64> = None;
        let mut marker = None;
        loop {
            let request = ListLayerVersionsRequest {
                layer_name: layer_name.to_owned(),
                marker,
                ..Default::default()
            };
            let response = self
                .client
                .list_layer_versions(request)
                .await
                .map_err(|e| WebSysError::ExternalLookup(format!("layer '{}': {}", layer_name, e)))?;

            let page_max = response
                .layer_versions
                .unwrap_or_default()
                .iter()
                .filter_map(|item| item.version)
                .max();
            latest = latest.max(page_max);

            match response.next_marker {
                Some(next) => {
                    debug!("Listing next page of layer {} versions", layer_name);
                    marker = Some(next);
                }
                None => break,
            }
        }

        let version = latest.ok_or_else(|| {
            WebSysError::ExternalLookup(format!(
                "layer '{}' has no published version",
                layer_name
            ))
        })?;
        info!("Layer {} resolved to version {}", layer_name, version);
        Ok(version)
    }
}
