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

//! Front-end apps and the HTTP gateway.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One front-end application, deployed once per branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AmplifyAppSpec {
    /// Parent domain; the app is served from `{app}.{domain}`.
    pub domain:           String,
    #[serde(default)]
    pub description:      Option<String>,
    /// User key in `ref.cognito` whose pool hosts the app's login client.
    #[serde(default)]
    pub cognito_auth:     Option<String>,
    /// Topic key notified on deployment status changes.
    #[serde(default)]
    pub deploy_event_sns: Option<String>,
    /// Policy fragment paths attached inline to the authenticated role.
    #[serde(default)]
    pub inline_policy:    Vec<String>,
    /// Managed policies attached to the authenticated role.
    #[serde(default)]
    pub managed_policy:   Vec<String>,
}

impl AmplifyAppSpec {
    /// Whether the app asks for a per-branch identity pool.
    pub fn wants_identity_pool(&self) -> bool {
        !self.inline_policy.is_empty() || !self.managed_policy.is_empty()
    }
}

/// The HTTP entry point shared by all branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiGwSpec {
    #[serde(default)]
    pub description:        Option<String>,
    /// Zone name of the custom domain.
    #[serde(default)]
    pub domain:             Option<String>,
    /// Hosted zone id; a custom domain is created only when it is given.
    #[serde(default)]
    pub zone_id:            Option<String>,
    #[serde(default)]
    pub certificate_arn:    Option<String>,
    /// Function key -> routes served by that function.
    #[serde(default)]
    pub lambda_integration: BTreeMap<String, RouteSpec>,
}

/// Routes of one function integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteSpec {
    /// Explicit route keys, e.g. `GET /items`.
    #[serde(default)]
    pub route:         Option<Vec<String>>,
    /// Path of an OpenAPI document the routes are derived from.
    #[serde(default, alias = "openapi_yaml")]
    pub route_openapi: Option<String>,
    #[serde(default)]
    pub cognito_auth:  Option<CognitoAuthSpec>,
}

/// A `(user, app)` pair naming a JWT authorizer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct CognitoAuthSpec {
    /// User key in `ref.cognito`.
    pub user: String,
    /// App key in `amplify`.
    pub app:  String,
}
