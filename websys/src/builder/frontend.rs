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
use crate::configs::WEBSYS_LOCAL_CALLBACK_URL;
use crate::error::{Result, WebSysError};
use crate::plan::{Category, Handle, Phase, ResourceIntent};
use crate::policy::PolicyFragment;
use crate::reference::{Scope, StoreKey, StoreKind};
use crate::spec::AmplifyAppSpec;
use crate::template::Substitutions;
use log::info;
use serde_json::{json, Map, Value};

impl<'a> GraphBuilder<'a> {
    /// One front-end app per `amplify` entry, deployed on every branch.
    pub(super) fn build_frontend(&mut self) -> Result<()> {
        let spec = self.spec;
        let apps = match &spec.amplify {
            Some(apps) => apps,
            None => {
                info!("No amplify block, skipping the frontend phase");
                return Ok(());
            }
        };

        let token = self.repository_token.clone().ok_or_else(|| {
            WebSysError::MissingPrerequisite("need repository_token of github for amplify".to_string())
        })?;
        let root = spec.repository_root.clone().ok_or_else(|| {
            WebSysError::MissingPrerequisite("need repository_root of github for amplify".to_string())
        })?;

        for (app_name, app) in apps {
            let app_handle = self.emit_app(app_name, app, &root, &token)?;

            if let Some(user) = &app.cognito_auth {
                let client = self.emit_login_client(app_name, app, user, &app_handle)?;
                if app.wants_identity_pool() {
                    self.emit_identity_pools(app_name, app, user, &client)?;
                }
                self.refs.store_mut().write(
                    StoreKey::new(StoreKind::AuthClient, Scope::Shared, app_name),
                    client,
                )?;
            }

            if let Some(topic_key) = &app.deploy_event_sns {
                let topic = self.refs.store_mut().read(
                    &StoreKey::new(StoreKind::Topic, Scope::Shared, topic_key),
                    &format!("deploy_event_sns of app `{}`", app_name),
                )?;
                let rule_name = format!("amplify-{}-notification", app_name);
                self.emit(
                    ResourceIntent::new(
                        Category::EventRule,
                        Phase::Frontend,
                        &rule_name,
                        json!({
                            "rule_name": rule_name,
                            "event_pattern": {
                                "source": ["aws.amplify"],
                                "detail_type": ["Amplify Deployment Status Change"],
                                "detail": {
                                    "appId": [app_handle.attr("AppId")],
                                    "branchName": spec.branch_names(),
                                    "jobStatus": ["SUCCEED", "FAILED", "STARTED"],
                                },
                            },
                            "targets": [topic.arn()],
                        }),
                    )
                    .depends_on(&app_handle)
                    .depends_on(&topic),
                )?;
            }
        }
        Ok(())
    }

    /// The app, its branches and its domain.
    fn emit_app(
        &mut self,
        app_name: &str,
        app: &AmplifyAppSpec,
        repository_root: &str,
        token: &str,
    ) -> Result<Handle> {
        let spec = self.spec;
        let app_handle = self.emit(ResourceIntent::new(
            Category::App,
            Phase::Frontend,
            app_name,
            json!({
                "name": app_name,
                "repository": format!("{}/{}", repository_root, app_name),
                "access_token": token,
                "description": app.description,
            }),
        ))?;

        let mut branches = vec![];
        let mut sub_domains = vec![];
        for (branch, branch_spec) in &spec.branch {
            let variables: Vec<Value> = self
                .base_env(Some(branch))
                .into_iter()
                .map(|(name, value)| json!({"name": name, "value": value}))
                .collect();
            branches.push(self.emit(
                ResourceIntent::new(
                    Category::AppBranch,
                    Phase::Frontend,
                    &format!("{}-{}", app_name, branch),
                    json!({
                        "app_id": app_handle.attr("AppId"),
                        "branch_name": branch,
                        "stage": branch_spec.amplify_type,
                        "environment_variables": variables,
                    }),
                )
                .depends_on(&app_handle),
            )?);
            sub_domains.push(json!({"branch_name": branch, "prefix": branch}));
        }

        let domain_name = format!("{}.{}", app_name, app.domain);
        self.emit(
            ResourceIntent::new(
                Category::AppDomain,
                Phase::Frontend,
                &domain_name,
                json!({
                    "app_id": app_handle.attr("AppId"),
                    "domain_name": domain_name,
                    "sub_domain_settings": sub_domains,
                }),
            )
            .depends_on(&app_handle)
            .depends_on_all(&branches),
        )?;
        Ok(app_handle)
    }

    /// The login client of an app. Its callback and logout URLs cover local
    /// development and every branch sub-domain.
    fn emit_login_client(
        &mut self,
        app_name: &str,
        app: &AmplifyAppSpec,
        user: &str,
        app_handle: &Handle,
    ) -> Result<Handle> {
        let pool = self
            .refs
            .user_pool(user, &format!("cognito_auth of app `{}`", app_name))?;
        let mut urls = vec![WEBSYS_LOCAL_CALLBACK_URL.to_string()];
        urls.extend(
            self.spec
                .branch_names()
                .into_iter()
                .map(|branch| format!("https://{}.{}.{}/", branch, app_name, app.domain)),
        );

        let client_name = self.names.client_name(app_name);
        let intent = ResourceIntent::new(
            Category::UserPoolClient,
            Phase::Frontend,
            &client_name,
            json!({
                "user_pool_client_name": client_name,
                "user_pool_id": pool.user_pool_id,
                "o_auth": {
                    "flows": {"authorization_code_grant": true},
                    "callback_urls": urls,
                    "logout_urls": urls,
                },
            }),
        )
        .depends_on(app_handle);
        self.emit(intent)
    }

    /// Per branch: an identity pool federating the app's login client, and
    /// the role its authenticated identities assume.
    fn emit_identity_pools(
        &mut self,
        app_name: &str,
        app: &AmplifyAppSpec,
        user: &str,
        client: &Handle,
    ) -> Result<()> {
        let spec = self.spec;
        let provider_name = {
            let pool = self
                .refs
                .user_pool(user, &format!("cognito_auth of app `{}`", app_name))?;
            format!(
                "cognito-idp.{}.amazonaws.com/{}",
                self.names.env().region,
                pool.user_pool_id
            )
        };

        for branch in spec.branch_names() {
            let subs = Substitutions::for_policy(self.names.env(), &spec.service_name, branch);
            let mut inline_policies = Map::new();
            for path in &app.inline_policy {
                let fragment = PolicyFragment::load(&self.resolve_path(path), &subs)?;
                inline_policies.insert(fragment.name, fragment.document);
            }

            let pool_name = format!("{}-{}-idpool", app_name, branch);
            let pool = self.emit(
                ResourceIntent::new(
                    Category::IdentityPool,
                    Phase::Frontend,
                    &pool_name,
                    json!({
                        "identity_pool_name": pool_name,
                        "allow_unauthenticated_identities": false,
                        "cognito_identity_providers": [{
                            "client_id": client.reference(),
                            "provider_name": provider_name,
                        }],
                    }),
                )
                .depends_on(client),
            )?;

            let role_name = format!("{}-{}-auth-role", app_name, branch);
            let role = self.emit(
                ResourceIntent::new(
                    Category::Role,
                    Phase::Frontend,
                    &role_name,
                    json!({
                        "role_name": role_name,
                        "assumed_by": {
                            "federated": "cognito-identity.amazonaws.com",
                            "action": "sts:AssumeRoleWithWebIdentity",
                            "conditions": {
                                "StringEquals": {
                                    "cognito-identity.amazonaws.com:aud": pool.reference()
                                },
                                "ForAnyValue:StringLike": {
                                    "cognito-identity.amazonaws.com:amr": "authenticated"
                                },
                            },
                        },
                        "inline_policies": inline_policies,
                        "managed_policies": app.managed_policy,
                    }),
                )
                .depends_on(&pool),
            )?;

            self.emit(
                ResourceIntent::new(
                    Category::RoleAttachment,
                    Phase::Frontend,
                    &format!("{}-roles", pool_name),
                    json!({
                        "identity_pool_id": pool.reference(),
                        "roles": {"authenticated": role.arn()},
                    }),
                )
                .depends_on(&pool)
                .depends_on(&role),
            )?;
        }
        Ok(())
    }
}
