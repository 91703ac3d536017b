//! `qualadm`: code-quality platform administration over its Web API.

use super::{api_url, decode};
use crate::app::{Context, Tool};
use crate::args::{BoundArgs, Rule, Validators};
use crate::config::{Profile, ToolConfig};
use crate::error::{AdminError, SpecError};
use crate::format::Transform;
use crate::http_client::{Auth, HttpRequest};
use crate::invoke::ExternalCall;
use crate::router::Route;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

const PAGE_SIZE: &str = "500";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityCommand {
    ProjectList,
    ProjectAdd,
    ProjectDelete,
    GroupList,
    GroupAdd,
    GroupDelete,
    UserList,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupSearch {
    groups: Vec<GroupSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupSummary {
    name: String,
    #[serde(default)]
    members_count: u64,
}

#[derive(Debug, Default)]
pub struct QualityTool;

impl QualityTool {
    /// A token alone is sent as a bearer credential; with an identity, as basic auth.
    fn auth(config: &ToolConfig) -> Auth {
        match &config.credentials.identity {
            Some(user) => Auth::Basic {
                user: user.clone(),
                password: config.credentials.secret.clone(),
            },
            None => Auth::Bearer(config.credentials.secret.clone()),
        }
    }

    fn request(
        ctx: &Context<'_>,
        method: Method,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<ExternalCall, AdminError> {
        let url = api_url(&ctx.config.endpoint, path, query)?;
        Ok(ExternalCall::Http(
            HttpRequest::new(method, url).auth(Self::auth(ctx.config)),
        ))
    }

    async fn search(
        ctx: &mut Context<'_>,
        path: &[&str],
        args: &BoundArgs,
    ) -> Result<(), AdminError> {
        let mut query = vec![("ps", PAGE_SIZE)];
        if let Some(q) = args.get("--query") {
            query.push(("q", q));
        }
        let call = Self::request(ctx, Method::GET, path, &query)?;
        ctx.call_and_emit(&call).await
    }
}

#[async_trait]
impl Tool for QualityTool {
    type Command = QualityCommand;

    fn profile(&self) -> Profile {
        Profile {
            tool: "qualadm",
            env_prefix: "QUALADM",
            requires_identity: false,
        }
    }

    fn routes(&self) -> Result<Vec<Route<QualityCommand>>, SpecError> {
        use QualityCommand::*;

        Ok(vec![
            Route::new(ProjectList, "project", &["list", "dir"], "[--query=]", "List projects")?
                .format("list", Transform::project(Some("/components"), "key"))
                .format("table", Transform::table(Some("/components"), &["key", "name", "visibility"])),
            Route::new(
                ProjectAdd,
                "project",
                &["add", "create"],
                "--key= --name= [--visibility=]",
                "Create a project",
            )?,
            Route::new(ProjectDelete, "project", &["delete", "remove"], "--key=", "Delete a project")?,
            Route::new(GroupList, "group", &["list", "dir"], "[--query=]", "List user groups")?
                .format("list", Transform::project(Some("/groups"), "name"))
                .format("table", Transform::table(Some("/groups"), &["name", "membersCount", "description"])),
            Route::new(
                GroupAdd,
                "group",
                &["add", "create"],
                "--group= [--description=]",
                "Create a user group",
            )?,
            Route::new(
                GroupDelete,
                "group",
                &["delete", "remove"],
                "--group=",
                "Delete a user group that has no members",
            )?,
            Route::new(UserList, "user", &["list", "dir"], "[--query=]", "List users")?
                .format("list", Transform::project(Some("/users"), "login"))
                .format("table", Transform::table(Some("/users"), &["login", "name", "email"])),
        ])
    }

    fn validators(&self) -> Result<Validators, SpecError> {
        Ok(Validators::new()
            .rule("--key", Rule::pattern(400, r"[A-Za-z0-9_.:-]*[A-Za-z_.:-][A-Za-z0-9_.:-]*")?)
            .rule("--group", Rule::alphanumeric(255, " ._-@"))
            .rule("--visibility", Rule::pattern(7, "public|private")?)
            .rule("--query", Rule::alphanumeric(100, " ._-:")))
    }

    fn error_fields(&self) -> &'static [&'static str] {
        &["/errors/0/msg", "/message"]
    }

    async fn execute(
        &self,
        command: QualityCommand,
        args: &BoundArgs,
        ctx: &mut Context<'_>,
    ) -> Result<(), AdminError> {
        match command {
            QualityCommand::ProjectList => {
                Self::search(ctx, &["api", "projects", "search"], args).await
            }
            QualityCommand::ProjectAdd => {
                let mut query = vec![
                    ("project", args.require("--key")?),
                    ("name", args.require("--name")?),
                ];
                if let Some(visibility) = args.get("--visibility") {
                    query.push(("visibility", visibility));
                }
                let call = Self::request(ctx, Method::POST, &["api", "projects", "create"], &query)?;
                ctx.call_and_emit(&call).await
            }
            QualityCommand::ProjectDelete => {
                let key = args.require("--key")?;
                let call = Self::request(
                    ctx,
                    Method::POST,
                    &["api", "projects", "delete"],
                    &[("project", key)],
                )?;
                ctx.call_and_emit(&call).await?;
                ctx.note(&format!("Deleted project {}", key))
            }
            QualityCommand::GroupList => {
                Self::search(ctx, &["api", "user_groups", "search"], args).await
            }
            QualityCommand::GroupAdd => {
                let mut query = vec![("name", args.require("--group")?)];
                if let Some(description) = args.get("--description") {
                    query.push(("description", description));
                }
                let call = Self::request(ctx, Method::POST, &["api", "user_groups", "create"], &query)?;
                ctx.call_and_emit(&call).await
            }
            QualityCommand::GroupDelete => {
                let group = args.require("--group")?;
                let lookup = Self::request(
                    ctx,
                    Method::GET,
                    &["api", "user_groups", "search"],
                    &[("q", group), ("ps", PAGE_SIZE)],
                )?;
                let found: GroupSearch = match ctx.call(&lookup).await? {
                    Some(body) => decode(&body, "group search")?,
                    None => GroupSearch { groups: Vec::new() },
                };
                let summary = found
                    .groups
                    .iter()
                    .find(|g| g.name == group)
                    .ok_or_else(|| AdminError::Conflict(format!("no group named '{}'", group)))?;
                if summary.members_count > 0 {
                    return Err(AdminError::Conflict(format!(
                        "group '{}' still has {} member(s); remove them first",
                        group, summary.members_count
                    )));
                }

                let call = Self::request(
                    ctx,
                    Method::POST,
                    &["api", "user_groups", "delete"],
                    &[("name", group)],
                )?;
                ctx.call_and_emit(&call).await?;
                ctx.note(&format!("Deleted group {}", group))
            }
            QualityCommand::UserList => Self::search(ctx, &["api", "users", "search"], args).await,
        }
    }
}
