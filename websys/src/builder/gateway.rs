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
use crate::configs::{
    WEBSYS_CORS_ALLOW_METHODS, WEBSYS_DEFAULT_STAGE, WEBSYS_IDENTITY_SOURCE, WEBSYS_STAGE_VARIABLE,
};
use crate::error::{Result, WebSysError};
use crate::openapi;
use crate::plan::{Category, Handle, Phase, ResourceIntent};
use crate::reference::{Scope, StoreKey, StoreKind};
use crate::spec::{ApiGwSpec, CognitoAuthSpec, RouteSpec};
use log::info;
use serde_json::json;
use std::collections::BTreeMap;

impl<'a> GraphBuilder<'a> {
    /// The HTTP API shared by all branches: one stage per branch, one
    /// integration per function key and one route per route key.
    pub(super) fn build_gateway(&mut self) -> Result<()> {
        let spec = self.spec;
        let apigw = match &spec.apigw {
            Some(apigw) => apigw,
            None => {
                info!("No apigw block, skipping the gateway phase");
                return Ok(());
            }
        };

        // Routes are resolved before anything is emitted so that a bad
        // integration aborts the phase early.
        let mut routes: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (key, route_spec) in &apigw.lambda_integration {
            if !spec.lambda_func.contains_key(key) {
                return Err(WebSysError::ReferentialIntegrity(format!(
                    "lambda '{}' spec not found: requested by apigw.lambda_integration",
                    key
                )));
            }
            routes.insert(key.as_str(), self.route_keys(key, route_spec)?);
        }

        let api_name = spec.api_name.as_str();
        let api = self.emit(ResourceIntent::new(
            Category::Api,
            Phase::Gateway,
            api_name,
            json!({
                "name": api_name,
                "description": apigw.description,
                "protocol_type": "HTTP",
                "cors_configuration": {
                    "allow_headers": ["*"],
                    "allow_methods": *WEBSYS_CORS_ALLOW_METHODS,
                    "allow_origins": ["*"],
                },
            }),
        ))?;

        let domain = self.emit_api_domain(apigw, &api)?;
        self.emit_stages(&api, domain.as_ref())?;

        // One authorizer per (user, app) pair; two pairs deriving the same
        // name fail in the plan as a duplicate.
        let mut authorizers: BTreeMap<CognitoAuthSpec, Handle> = BTreeMap::new();
        for (key, route_spec) in &apigw.lambda_integration {
            if let Some(auth) = &route_spec.cognito_auth {
                if authorizers.contains_key(auth) {
                    continue;
                }
                let name = self.names.authorizer_name(&auth.user, &auth.app);
                let requested_by = format!("cognito_auth of integration `{}`", key);
                let issuer = self.refs.user_pool(&auth.user, &requested_by)?.user_pool_url.clone();
                let client = self.refs.store_mut().read(
                    &StoreKey::new(StoreKind::AuthClient, Scope::Shared, &auth.app),
                    &requested_by,
                )?;
                let authorizer = self.emit(
                    ResourceIntent::new(
                        Category::Authorizer,
                        Phase::Gateway,
                        &name,
                        json!({
                            "api_id": api.reference(),
                            "name": name,
                            "authorizer_type": "JWT",
                            "identity_source": [*WEBSYS_IDENTITY_SOURCE],
                            "jwt_configuration": {
                                "audience": [client.reference()],
                                "issuer": issuer,
                            },
                        }),
                    )
                    .depends_on(&api)
                    .depends_on(&client),
                )?;
                authorizers.insert(auth.clone(), authorizer);
            }
        }

        for (key, route_spec) in &apigw.lambda_integration {
            let function_name = self
                .names
                .integration_function_name(key, &WEBSYS_STAGE_VARIABLE);
            let integration = self.emit(
                ResourceIntent::new(
                    Category::Integration,
                    Phase::Gateway,
                    &function_name,
                    json!({
                        "api_id": api.reference(),
                        "integration_type": "AWS_PROXY",
                        "integration_uri": self.names.lambda_function_arn(&function_name),
                        "integration_method": "GET",
                        "payload_format_version": "2.0",
                    }),
                )
                .depends_on(&api),
            )?;

            let authorizer = route_spec
                .cognito_auth
                .as_ref()
                .and_then(|auth| authorizers.get(auth))
                .cloned();
            for route_key in &routes[key.as_str()] {
                let intent = ResourceIntent::new(
                    Category::Route,
                    Phase::Gateway,
                    &format!("{}:{}", function_name, route_key),
                    json!({
                        "api_id": api.reference(),
                        "route_key": route_key,
                        "target": format!("integrations/{}", integration.reference()),
                        "authorizer_id": authorizer.as_ref().map(|a| a.reference()),
                        "authorization_type": authorizer.as_ref().map(|_| "JWT"),
                    }),
                )
                .depends_on(&api)
                .depends_on(&integration)
                .depends_on_all(authorizer.as_ref());
                self.emit(intent)?;
            }
        }

        self.refs.store_mut().write(
            StoreKey::new(StoreKind::Gateway, Scope::Shared, api_name),
            api,
        )?;
        Ok(())
    }

    /// The route keys of one integration: explicit, or derived from an
    /// OpenAPI document.
    fn route_keys(&self, key: &str, route_spec: &RouteSpec) -> Result<Vec<String>> {
        match (&route_spec.route, &route_spec.route_openapi) {
            (Some(routes), _) => Ok(routes.clone()),
            (None, Some(document)) => {
                let routes = openapi::routes_from_file(&self.resolve_path(document))?;
                info!("Derived {} routes of {} from {}", routes.len(), key, document);
                Ok(routes)
            }
            (None, None) => Err(WebSysError::Schema(format!(
                "integration `{}` needs `route` or `route_openapi`",
                key
            ))),
        }
    }

    /// The custom domain and its DNS alias, when a hosted zone is given.
    fn emit_api_domain(&mut self, apigw: &ApiGwSpec, api: &Handle) -> Result<Option<Handle>> {
        let (zone_id, zone_name) = match (&apigw.zone_id, &apigw.domain) {
            (Some(zone_id), Some(zone_name)) => (zone_id, zone_name),
            _ => return Ok(None),
        };
        let domain_name = format!("{}.{}", self.names.api_name(), zone_name);
        let domain = self.emit(
            ResourceIntent::new(
                Category::DomainName,
                Phase::Gateway,
                &domain_name,
                json!({
                    "domain_name": domain_name,
                    "domain_name_configurations": apigw
                        .certificate_arn
                        .as_ref()
                        .map(|arn| json!([{"certificate_arn": arn}])),
                }),
            )
            .depends_on(api),
        )?;
        self.emit(
            ResourceIntent::new(
                Category::DnsRecord,
                Phase::Gateway,
                &domain_name,
                json!({
                    "hosted_zone_id": zone_id,
                    "zone_name": zone_name,
                    "record_name": domain_name,
                    "record_type": "A",
                    "alias_target": {
                        "dns_name": domain.attr("RegionalDomainName"),
                        "hosted_zone_id": domain.attr("RegionalHostedZoneId"),
                    },
                }),
            )
            .depends_on(&domain),
        )?;
        Ok(Some(domain))
    }

    /// One auto-deployed stage per branch, whose stage variable carries the
    /// branch name, mapped onto the custom domain if there is one.
    fn emit_stages(&mut self, api: &Handle, domain: Option<&Handle>) -> Result<()> {
        let spec = self.spec;
        for (branch, branch_spec) in &spec.branch {
            let stage_name = branch_spec
                .apigw_stage
                .clone()
                .unwrap_or_else(|| WEBSYS_DEFAULT_STAGE.to_string());
            let physical = format!("{}_{}", spec.api_name, stage_name);
            let stage = self.emit(
                ResourceIntent::new(
                    Category::Stage,
                    Phase::Gateway,
                    &physical,
                    json!({
                        "api_id": api.reference(),
                        "stage_name": stage_name,
                        "auto_deploy": true,
                        "stage_variables": { WEBSYS_STAGE_VARIABLE.as_str(): branch },
                    }),
                )
                .depends_on(api),
            )?;

            if let Some(domain) = domain {
                self.emit(
                    ResourceIntent::new(
                        Category::ApiMapping,
                        Phase::Gateway,
                        &format!("{}_mapping", physical),
                        json!({
                            "api_id": api.reference(),
                            "domain_name": domain.reference(),
                            "stage": stage_name,
                            "api_mapping_key": branch,
                        }),
                    )
                    .depends_on(domain)
                    .depends_on(&stage),
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{Result, WebSysError};
    use crate::plan::Category;
    use crate::tests::{build_from_json, build_with_root, build_with_token};
    use serde_json::{json, Value};
    use std::fs;

    fn gateway_spec() -> Value {
        json!({
            "service_name": "shop",
            "api_name": "shop-api",
            "branch": {
                "main": {"apigw_stage": "$default"},
                "dev": {"apigw_stage": "dev"}
            },
            "lambda_handler": "h",
            "lambda_func": {"echo": {}, "items": {}},
            "apigw": {
                "description": "shop front door",
                "lambda_integration": {
                    "echo": {"route": ["GET /echo", "POST /echo"]},
                    "items": {"route": ["GET /items"]}
                }
            }
        })
    }

    #[tokio::test]
    async fn stages_integrations_routes() -> Result<()> {
        let output = build_from_json(gateway_spec()).await?;
        let plan = &output.plan;

        let api = plan.find(Category::Api, "shop-api").unwrap();
        assert_eq!("HTTP", api.attributes["protocol_type"]);
        assert_eq!(
            json!(["GET", "POST", "HEAD"]),
            api.attributes["cors_configuration"]["allow_methods"]
        );

        let dev = plan.find(Category::Stage, "shop-api_dev").unwrap();
        assert_eq!("dev", dev.attributes["stage_variables"]["branch"]);
        assert!(plan.find(Category::Stage, "shop-api_$default").is_some());

        let integration = plan
            .find(Category::Integration, "shop-api-${stageVariables.branch}-echo")
            .unwrap();
        assert_eq!(
            "arn:aws:lambda:us-east-1:123456789012:function:shop-api-${stageVariables.branch}-echo",
            integration.attributes["integration_uri"]
        );
        assert_eq!("2.0", integration.attributes["payload_format_version"]);

        assert_eq!(3, plan.by_category(Category::Route).len());
        let route = plan
            .find(Category::Route, "shop-api-${stageVariables.branch}-echo:POST /echo")
            .unwrap();
        assert!(route.attributes["authorizer_id"].is_null());

        // every branch function of an integrated key may be invoked by the api
        let permission = plan
            .find(Category::Permission, "shop-api-dev-items-permission")
            .unwrap();
        assert_eq!(
            "arn:aws:execute-api:us-east-1:123456789012:${Api/shop-api.Ref}/*/*/*",
            permission.attributes["source_arn"]
        );
        assert!(plan.by_category(Category::DomainName).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn custom_domain() -> Result<()> {
        let mut spec = gateway_spec();
        spec["apigw"]["domain"] = json!("example.com");
        spec["apigw"]["zone_id"] = json!("Z123");
        let output = build_from_json(spec).await?;
        let plan = &output.plan;

        assert!(plan
            .find(Category::DomainName, "shop-api.example.com")
            .is_some());
        let record = plan.find(Category::DnsRecord, "shop-api.example.com").unwrap();
        assert_eq!("Z123", record.attributes["hosted_zone_id"]);
        let mapping = plan.find(Category::ApiMapping, "shop-api_dev_mapping").unwrap();
        assert_eq!("dev", mapping.attributes["api_mapping_key"]);
        Ok(())
    }

    #[tokio::test]
    async fn shared_authorizer() -> Result<()> {
        let mut spec = gateway_spec();
        spec["repository_root"] = json!("https://github.com/acme");
        spec["ref"] = json!({"cognito": {"staff": {"user_pool_id": "us-east-1_Pool"}}});
        spec["amplify"] = json!({"web": {"domain": "example.com", "cognito_auth": "staff"}});
        let auth = json!({"user": "staff", "app": "web"});
        spec["apigw"]["lambda_integration"]["echo"]["cognito_auth"] = auth.clone();
        spec["apigw"]["lambda_integration"]["items"]["cognito_auth"] = auth;

        let output = build_with_token(spec, "ghp_token").await?;
        let plan = &output.plan;

        let authorizers = plan.by_category(Category::Authorizer);
        assert_eq!(1, authorizers.len());
        let jwt = &authorizers[0].attributes["jwt_configuration"];
        assert_eq!(json!(["${UserPoolClient/web-client.Ref}"]), jwt["audience"]);
        assert_eq!(
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Pool",
            jwt["issuer"]
        );

        let route = plan
            .find(Category::Route, "shop-api-${stageVariables.branch}-items:GET /items")
            .unwrap();
        assert_eq!("${Authorizer/auth-staff-web.Ref}", route.attributes["authorizer_id"]);
        assert_eq!("JWT", route.attributes["authorization_type"]);
        Ok(())
    }

    #[tokio::test]
    async fn authorizer_names_never_merge_pairs() {
        // (staff, web-admin) and (staff-web, admin) both derive auth-staff-web-admin
        let mut spec = gateway_spec();
        spec["repository_root"] = json!("https://github.com/acme");
        spec["ref"] = json!({"cognito": {
            "staff": {"user_pool_id": "us-east-1_Staff"},
            "staff-web": {"user_pool_id": "us-east-1_Web"}
        }});
        spec["amplify"] = json!({
            "web-admin": {"domain": "example.com", "cognito_auth": "staff"},
            "admin": {"domain": "example.com", "cognito_auth": "staff-web"}
        });
        spec["apigw"]["lambda_integration"]["echo"]["cognito_auth"] =
            json!({"user": "staff", "app": "web-admin"});
        spec["apigw"]["lambda_integration"]["items"]["cognito_auth"] =
            json!({"user": "staff-web", "app": "admin"});

        let err = build_with_token(spec, "ghp_token").await.unwrap_err();
        match err {
            WebSysError::DuplicateResource(desc) => {
                assert!(desc.contains("auth-staff-web-admin"), "{}", desc)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn distinct_pairs_get_their_own_authorizer() -> Result<()> {
        let mut spec = gateway_spec();
        spec["repository_root"] = json!("https://github.com/acme");
        spec["ref"] = json!({"cognito": {
            "staff": {"user_pool_id": "us-east-1_Staff"},
            "guest": {"user_pool_id": "us-east-1_Guest"}
        }});
        spec["amplify"] = json!({
            "web": {"domain": "example.com", "cognito_auth": "staff"},
            "shop": {"domain": "example.com", "cognito_auth": "guest"}
        });
        spec["apigw"]["lambda_integration"]["echo"]["cognito_auth"] =
            json!({"user": "staff", "app": "web"});
        spec["apigw"]["lambda_integration"]["items"]["cognito_auth"] =
            json!({"user": "guest", "app": "shop"});

        let output = build_with_token(spec, "ghp_token").await?;
        let plan = &output.plan;
        assert_eq!(2, plan.by_category(Category::Authorizer).len());

        let guest = plan.find(Category::Authorizer, "auth-guest-shop").unwrap();
        let jwt = &guest.attributes["jwt_configuration"];
        assert_eq!(json!(["${UserPoolClient/shop-client.Ref}"]), jwt["audience"]);
        assert_eq!(
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Guest",
            jwt["issuer"]
        );
        let route = plan
            .find(Category::Route, "shop-api-${stageVariables.branch}-items:GET /items")
            .unwrap();
        assert_eq!("${Authorizer/auth-guest-shop.Ref}", route.attributes["authorizer_id"]);
        Ok(())
    }

    #[tokio::test]
    async fn routes_from_openapi() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("items.yaml"),
            "paths:\n  /items:\n    get: {}\n    post: {}\n  /items/{id}:\n    delete: {}\n",
        )?;
        let mut spec = gateway_spec();
        spec["apigw"]["lambda_integration"]["items"] = json!({"openapi_yaml": "items.yaml"});

        let output = build_with_root(spec, dir.path()).await?;
        let routes: Vec<&str> = output
            .plan
            .by_category(Category::Route)
            .iter()
            .map(|r| r.attributes["route_key"].as_str().unwrap())
            .collect();
        assert_eq!(
            vec!["GET /echo", "POST /echo", "GET /items", "POST /items", "DELETE /items/{id}"],
            routes
        );
        Ok(())
    }

    #[tokio::test]
    async fn integration_without_function() {
        let mut spec = gateway_spec();
        spec["apigw"]["lambda_integration"]["ghost"] = json!({"route": ["GET /ghost"]});
        let err = build_from_json(spec).await.unwrap_err();
        match err {
            WebSysError::ReferentialIntegrity(desc) => assert!(desc.contains("'ghost'")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
