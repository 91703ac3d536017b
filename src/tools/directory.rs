//! `diradm`: directory-service administration through an external binary.
//!
//! Every handler turns into one or more `samba-tool`-style invocations:
//! a sub-command and positional arguments, followed by the connection URI
//! (`-H`) and an authentication file (`-A`) staged in the workspace.

use crate::app::{Context, Tool};
use crate::args::{BoundArgs, Rule, Validators};
use crate::config::{Profile, ToolConfig};
use crate::error::{AdminError, SpecError};
use crate::executor::ProcessRunner;
use crate::format::Transform;
use crate::invoke::ExternalCall;
use crate::router::Route;
use crate::workspace::Workspace;
use async_trait::async_trait;
use tracing::info;

pub const DEFAULT_PROGRAM: &str = "samba-tool";
const AUTH_FILE: &str = "auth.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirCommand {
    UserList,
    UserShow,
    UserAdd,
    UserDelete,
    GroupList,
    GroupAdd,
    GroupDelete,
    GroupMembers,
    MemberAdd,
    MemberRemove,
}

#[derive(Debug, Default)]
pub struct DirectoryTool;

impl DirectoryTool {
    fn program(config: &ToolConfig) -> &str {
        config.program.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }

    /// `<program> <words...> -H <uri> -A <auth file>`
    fn call(ctx: &Context<'_>, words: Vec<String>) -> ExternalCall {
        let mut args = words;
        args.push("-H".to_string());
        args.push(ctx.config.endpoint.clone());
        args.push("-A".to_string());
        args.push(ctx.workspace.path().join(AUTH_FILE).to_string_lossy().into_owned());
        ExternalCall::process(Self::program(ctx.config), args)
    }
}

fn words(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Appends `--option=value` when the flag was given.
fn push_opt(args: &mut Vec<String>, bound: &BoundArgs, flag: &str, option: &str) {
    if let Some(value) = bound.get(flag) {
        args.push(format!("{}={}", option, value));
    }
}

#[async_trait]
impl Tool for DirectoryTool {
    type Command = DirCommand;

    fn profile(&self) -> Profile {
        Profile {
            tool: "diradm",
            env_prefix: "DIRADM",
            requires_identity: true,
        }
    }

    fn routes(&self) -> Result<Vec<Route<DirCommand>>, SpecError> {
        use DirCommand::*;

        let show_short = Transform::substitute(
            &[
                (r"^(sAMAccountName|displayName|mail|userPrincipalName): (.*)$", "$1: $2"),
                (r"^memberOf: CN=([^,]+),.*$", "memberOf: $1"),
            ],
            true,
        )?;
        let members_short = Transform::substitute(&[(r"^CN=([^,]+),.*$", "$1")], false)?;

        Ok(vec![
            Route::new(UserList, "user", &["list", "dir"], "", "List user account names")?,
            Route::new(UserShow, "user", &["show", "get"], "--name=", "Show one user's attributes")?
                .format("short", show_short)
                .format("long", Transform::Raw),
            Route::new(
                UserAdd,
                "user",
                &["add", "create"],
                "--name= [--given-name=] [--surname=] [--mail=] [--ou=]",
                "Create a user with a random initial password",
            )?,
            Route::new(UserDelete, "user", &["delete", "remove"], "--name=", "Delete a user")?,
            Route::new(GroupList, "group", &["list", "dir"], "", "List group names")?,
            Route::new(
                GroupAdd,
                "group",
                &["add", "create"],
                "--group= [--description=] [--ou=]",
                "Create a security group",
            )?,
            Route::new(
                GroupDelete,
                "group",
                &["delete", "remove"],
                "--group=",
                "Delete a group that has no members",
            )?,
            Route::new(GroupMembers, "group", &["members"], "--group=", "List a group's members")?
                .format("short", members_short)
                .format("long", Transform::Raw),
            Route::new(
                MemberAdd,
                "member",
                &["add"],
                "--group= --name=",
                "Add a user to a group",
            )?,
            Route::new(
                MemberRemove,
                "member",
                &["remove", "delete"],
                "--group= --name=",
                "Remove a user from a group",
            )?,
        ])
    }

    fn validators(&self) -> Result<Validators, SpecError> {
        Ok(Validators::new()
            .rule("--name", Rule::pattern(20, r"[A-Za-z0-9][A-Za-z0-9._-]*")?)
            .rule("--group", Rule::pattern(64, r"[A-Za-z0-9][A-Za-z0-9 ._-]*")?)
            .rule("--mail", Rule::pattern(254, r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?)
            .rule("--ou", Rule::pattern(512, r"(?i:OU)=[^,=]+(?:,(?i:OU)=[^,=]+)*")?))
    }

    fn check_preconditions(
        &self,
        config: &ToolConfig,
        runner: &dyn ProcessRunner,
    ) -> Result<(), AdminError> {
        let program = Self::program(config);
        if runner.program_exists(program) {
            Ok(())
        } else {
            Err(AdminError::Precondition(format!(
                "required tool '{}' not found on PATH",
                program
            )))
        }
    }

    fn stage_credentials(&self, config: &ToolConfig, workspace: &Workspace) -> Result<(), AdminError> {
        let identity = config.credentials.identity.as_deref().unwrap_or_default();
        let contents = format!(
            "username = {}\npassword = {}\n",
            identity,
            config.credentials.secret.expose()
        );
        workspace.stage_secret(AUTH_FILE, &contents)?;
        Ok(())
    }

    async fn execute(
        &self,
        command: DirCommand,
        args: &BoundArgs,
        ctx: &mut Context<'_>,
    ) -> Result<(), AdminError> {
        match command {
            DirCommand::UserList => {
                let call = Self::call(ctx, words(&["user", "list"]));
                ctx.call_and_emit(&call).await
            }
            DirCommand::UserShow => {
                let call = Self::call(ctx, words(&["user", "show", args.require("--name")?]));
                ctx.call_and_emit(&call).await
            }
            DirCommand::UserAdd => {
                let mut w = words(&["user", "create", args.require("--name")?, "--random-password"]);
                push_opt(&mut w, args, "--given-name", "--given-name");
                push_opt(&mut w, args, "--surname", "--surname");
                push_opt(&mut w, args, "--mail", "--mail-address");
                push_opt(&mut w, args, "--ou", "--userou");
                let call = Self::call(ctx, w);
                ctx.call_and_emit(&call).await
            }
            DirCommand::UserDelete => {
                let call = Self::call(ctx, words(&["user", "delete", args.require("--name")?]));
                ctx.call_and_emit(&call).await
            }
            DirCommand::GroupList => {
                let call = Self::call(ctx, words(&["group", "list"]));
                ctx.call_and_emit(&call).await
            }
            DirCommand::GroupAdd => {
                let mut w = words(&["group", "add", args.require("--group")?]);
                push_opt(&mut w, args, "--description", "--description");
                push_opt(&mut w, args, "--ou", "--groupou");
                let call = Self::call(ctx, w);
                ctx.call_and_emit(&call).await
            }
            DirCommand::GroupDelete => {
                let group = args.require("--group")?;
                let members = Self::call(ctx, words(&["group", "listmembers", group]));
                if let Some(body) = ctx.call(&members).await? {
                    let count = body.lines().filter(|l| !l.trim().is_empty()).count();
                    if count > 0 {
                        return Err(AdminError::Conflict(format!(
                            "group '{}' still has {} member(s); remove them first",
                            group, count
                        )));
                    }
                }
                info!("Group '{}' is empty, deleting", group);
                let call = Self::call(ctx, words(&["group", "delete", group]));
                ctx.call_and_emit(&call).await
            }
            DirCommand::GroupMembers => {
                let call = Self::call(
                    ctx,
                    words(&["group", "listmembers", args.require("--group")?, "--full-dn"]),
                );
                ctx.call_and_emit(&call).await
            }
            DirCommand::MemberAdd => {
                let call = Self::call(
                    ctx,
                    words(&["group", "addmembers", args.require("--group")?, args.require("--name")?]),
                );
                ctx.call_and_emit(&call).await
            }
            DirCommand::MemberRemove => {
                let call = Self::call(
                    ctx,
                    words(&["group", "removemembers", args.require("--group")?, args.require("--name")?]),
                );
                ctx.call_and_emit(&call).await
            }
        }
    }
}
