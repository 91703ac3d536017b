//! `forgeadm`: source-forge administration over the REST API v4.
//!
//! Projects and groups are addressed by their full path (`infra/dns`), which
//! the API accepts percent-encoded in place of a numeric id.

use super::{api_url, decode};
use crate::app::{Context, Tool};
use crate::args::{BoundArgs, Rule, Validators};
use crate::config::{Profile, ToolConfig};
use crate::error::{AdminError, SpecError, UsageError};
use crate::format::Transform;
use crate::http_client::{Auth, HttpRequest};
use crate::invoke::ExternalCall;
use crate::router::Route;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const API: [&str; 2] = ["api", "v4"];
const PER_PAGE: &str = "100";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeCommand {
    ProjectList,
    ProjectAdd,
    ProjectDelete,
    GroupList,
    GroupAdd,
    GroupDelete,
    MemberAdd,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    path_with_namespace: String,
}

/// Maps an access role name to the API's numeric level.
fn access_level(role: &str) -> Option<u8> {
    match role {
        "guest" => Some(10),
        "reporter" => Some(20),
        "developer" => Some(30),
        "maintainer" => Some(40),
        "owner" => Some(50),
        _ => None,
    }
}

/// Last path component, used as the default slug for a new resource.
fn default_path(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[derive(Debug, Default)]
pub struct ForgeTool;

impl ForgeTool {
    fn request(
        ctx: &Context<'_>,
        method: Method,
        path: &[&str],
        query: &[(&str, &str)],
    ) -> Result<HttpRequest, AdminError> {
        let segments: Vec<&str> = API.iter().chain(path).copied().collect();
        let url = api_url(&ctx.config.endpoint, &segments, query)?;
        Ok(HttpRequest::new(method, url).auth(Self::auth(ctx.config)))
    }

    fn auth(config: &ToolConfig) -> Auth {
        Auth::Bearer(config.credentials.secret.clone())
    }

    async fn list(ctx: &mut Context<'_>, resource: &str, args: &BoundArgs) -> Result<(), AdminError> {
        let mut query = vec![("per_page", PER_PAGE)];
        if resource == "projects" {
            query.push(("simple", "true"));
        }
        if let Some(search) = args.get("--search") {
            query.push(("search", search));
        }
        let request = Self::request(ctx, Method::GET, &[resource], &query)?;
        ctx.call_and_emit(&ExternalCall::Http(request)).await
    }

    async fn group_id(ctx: &mut Context<'_>, group: &str) -> Result<u64, AdminError> {
        let request = Self::request(ctx, Method::GET, &["groups", group], &[])?;
        let body = ctx
            .call(&ExternalCall::Http(request))
            .await?
            .ok_or_else(|| AdminError::Output(format!("empty response for group '{}'", group)))?;
        let namespace: Namespace = decode(&body, "group")?;
        Ok(namespace.id)
    }

    async fn create(ctx: &mut Context<'_>, resource: &str, payload: Value) -> Result<(), AdminError> {
        let request = Self::request(ctx, Method::POST, &[resource], &[])?.json(payload);
        ctx.call_and_emit(&ExternalCall::Http(request)).await
    }

    async fn project_add(ctx: &mut Context<'_>, args: &BoundArgs) -> Result<(), AdminError> {
        let name = args.require("--name")?;
        let mut payload = Map::new();
        payload.insert("name".into(), json!(name));
        payload.insert(
            "path".into(),
            json!(args.get("--path").map(str::to_string).unwrap_or_else(|| default_path(name))),
        );
        if let Some(visibility) = args.get("--visibility") {
            payload.insert("visibility".into(), json!(visibility));
        }
        if let Some(description) = args.get("--description") {
            payload.insert("description".into(), json!(description));
        }
        if let Some(group) = args.get("--group") {
            let id = Self::group_id(ctx, group).await?;
            payload.insert("namespace_id".into(), json!(id));
        }
        Self::create(ctx, "projects", Value::Object(payload)).await
    }

    async fn group_add(ctx: &mut Context<'_>, args: &BoundArgs) -> Result<(), AdminError> {
        let name = args.require("--name")?;
        let mut payload = Map::new();
        payload.insert("name".into(), json!(name));
        payload.insert(
            "path".into(),
            json!(args.get("--path").map(str::to_string).unwrap_or_else(|| default_path(name))),
        );
        payload.insert(
            "visibility".into(),
            json!(args.get("--visibility").unwrap_or("private")),
        );
        if let Some(description) = args.get("--description") {
            payload.insert("description".into(), json!(description));
        }
        if let Some(parent) = args.get("--parent") {
            let id = Self::group_id(ctx, parent).await?;
            payload.insert("parent_id".into(), json!(id));
        }
        Self::create(ctx, "groups", Value::Object(payload)).await
    }

    async fn group_delete(ctx: &mut Context<'_>, args: &BoundArgs) -> Result<(), AdminError> {
        let group = args.require("--group")?;
        let lookup = Self::request(
            ctx,
            Method::GET,
            &["groups", group, "projects"],
            &[("per_page", "1"), ("include_subgroups", "true")],
        )?;
        let projects: Vec<ProjectRef> = match ctx.call(&ExternalCall::Http(lookup)).await? {
            Some(body) => decode(&body, "group projects")?,
            None => Vec::new(),
        };
        if let Some(project) = projects.first() {
            return Err(AdminError::Conflict(format!(
                "group '{}' still contains projects (e.g. {}); move or delete them first",
                group, project.path_with_namespace
            )));
        }

        let request = Self::request(ctx, Method::DELETE, &["groups", group], &[])?;
        ctx.call_and_emit(&ExternalCall::Http(request)).await?;
        ctx.note(&format!("Scheduled deletion of group {}", group))
    }

    async fn member_add(ctx: &mut Context<'_>, args: &BoundArgs) -> Result<(), AdminError> {
        let project = args.require("--project")?;
        let username = args.require("--user")?;
        let role = args.get("--access").unwrap_or("developer");
        let level = access_level(role).ok_or_else(|| UsageError::InvalidValue {
            flag: "--access".to_string(),
            reason: format!("unknown access level '{}'", role),
        })?;

        let lookup = Self::request(ctx, Method::GET, &["users"], &[("username", username)])?;
        let users: Vec<UserRef> = match ctx.call(&ExternalCall::Http(lookup)).await? {
            Some(body) => decode(&body, "user search")?,
            None => Vec::new(),
        };
        let user = users
            .first()
            .ok_or_else(|| AdminError::Conflict(format!("no user named '{}'", username)))?;

        let request = Self::request(ctx, Method::POST, &["projects", project, "members"], &[])?
            .json(json!({"user_id": user.id, "access_level": level}));
        ctx.call_and_emit(&ExternalCall::Http(request)).await
    }
}

#[async_trait]
impl Tool for ForgeTool {
    type Command = ForgeCommand;

    fn profile(&self) -> Profile {
        Profile {
            tool: "forgeadm",
            env_prefix: "FORGEADM",
            requires_identity: false,
        }
    }

    fn routes(&self) -> Result<Vec<Route<ForgeCommand>>, SpecError> {
        use ForgeCommand::*;

        Ok(vec![
            Route::new(ProjectList, "project", &["list", "dir"], "[--search=]", "List projects")?
                .format("list", Transform::project(None, "path_with_namespace"))
                .format(
                    "table",
                    Transform::table(None, &["id", "path_with_namespace", "visibility", "web_url"]),
                ),
            Route::new(
                ProjectAdd,
                "project",
                &["add", "create"],
                "--name= [--path=] [--group=] [--visibility=] [--description=]",
                "Create a project, optionally inside a group",
            )?
            .format("list", Transform::project(None, "path_with_namespace"))
            .format(
                "table",
                Transform::table(None, &["id", "path_with_namespace", "visibility", "web_url"]),
            ),
            Route::new(ProjectDelete, "project", &["delete", "remove"], "--project=", "Delete a project")?,
            Route::new(GroupList, "group", &["list", "dir"], "[--search=]", "List groups")?
                .format("list", Transform::project(None, "full_path"))
                .format("table", Transform::table(None, &["id", "full_path", "visibility"])),
            Route::new(
                GroupAdd,
                "group",
                &["add", "create"],
                "--name= [--path=] [--parent=] [--visibility=] [--description=]",
                "Create a group",
            )?,
            Route::new(
                GroupDelete,
                "group",
                &["delete", "remove"],
                "--group=",
                "Delete a group that contains no projects",
            )?,
            Route::new(
                MemberAdd,
                "member",
                &["add"],
                "--project= --user= [--access=]",
                "Grant a user access to a project",
            )?,
        ])
    }

    fn validators(&self) -> Result<Validators, SpecError> {
        let namespaced = r"[A-Za-z0-9_][A-Za-z0-9_.-]*(/[A-Za-z0-9_][A-Za-z0-9_.-]*)*";
        Ok(Validators::new()
            .rule("--project", Rule::pattern(255, namespaced)?)
            .rule("--group", Rule::pattern(255, namespaced)?)
            .rule("--parent", Rule::pattern(255, namespaced)?)
            .rule("--path", Rule::pattern(255, r"[A-Za-z0-9_][A-Za-z0-9_.-]*")?)
            .rule("--name", Rule::alphanumeric(255, " ._-"))
            .rule("--visibility", Rule::pattern(8, "private|internal|public")?)
            .rule("--user", Rule::alphanumeric(255, "._-"))
            .rule("--access", Rule::pattern(10, "guest|reporter|developer|maintainer|owner")?)
            .rule("--search", Rule::alphanumeric(100, " ._-/")))
    }

    fn error_fields(&self) -> &'static [&'static str] {
        &["/message", "/error"]
    }

    async fn execute(
        &self,
        command: ForgeCommand,
        args: &BoundArgs,
        ctx: &mut Context<'_>,
    ) -> Result<(), AdminError> {
        match command {
            ForgeCommand::ProjectList => Self::list(ctx, "projects", args).await,
            ForgeCommand::ProjectAdd => Self::project_add(ctx, args).await,
            ForgeCommand::ProjectDelete => {
                let project = args.require("--project")?;
                let request = Self::request(ctx, Method::DELETE, &["projects", project], &[])?;
                ctx.call_and_emit(&ExternalCall::Http(request)).await?;
                ctx.note(&format!("Scheduled deletion of project {}", project))
            }
            ForgeCommand::GroupList => Self::list(ctx, "groups", args).await,
            ForgeCommand::GroupAdd => Self::group_add(ctx, args).await,
            ForgeCommand::GroupDelete => Self::group_delete(ctx, args).await,
            ForgeCommand::MemberAdd => Self::member_add(ctx, args).await,
        }
    }
}
