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
use crate::configs::WEBSYS_UNTAGGED_MAX_AGE_DAYS;
use crate::error::Result;
use crate::plan::{Category, Phase, ResourceIntent};
use serde_json::json;

impl<'a> GraphBuilder<'a> {
    /// Buckets, and one container repository per batch job. Reads nothing
    /// from the handle store.
    pub(super) fn build_storage(&mut self) -> Result<()> {
        let spec = self.spec;

        for (bucket_name, bucket) in spec.s3.iter().flatten() {
            let block_public_access = if bucket.public_read {
                "BLOCK_ACLS"
            } else {
                "BLOCK_ALL"
            };
            let index_document = bucket.website_hosting.then(|| "index.html");
            self.emit(ResourceIntent::new(
                Category::Bucket,
                Phase::Storage,
                bucket_name,
                json!({
                    "bucket_name": bucket_name,
                    "public_read_access": bucket.public_read,
                    "block_public_access": block_public_access,
                    "website_index_document": index_document,
                    "removal_policy": "DESTROY",
                }),
            ))?;
        }

        for batch_key in spec.batch_func.iter().flat_map(|jobs| jobs.keys()) {
            let repository_name = self.names.repository_name(batch_key);
            self.emit(ResourceIntent::new(
                Category::Repository,
                Phase::Storage,
                &repository_name,
                json!({
                    "repository_name": repository_name,
                    "image_scan_on_push": false,
                    "removal_policy": "DESTROY",
                    "lifecycle_rules": [{
                        "tag_status": "UNTAGGED",
                        "max_image_age_days": *WEBSYS_UNTAGGED_MAX_AGE_DAYS,
                    }],
                }),
            ))?;
        }
        Ok(())
    }
}
