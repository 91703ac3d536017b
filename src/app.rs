//! Glue between the router, validators, invoker and a concrete tool.

use crate::args::{BoundArgs, Validators};
use crate::config::{Profile, ToolConfig};
use crate::error::{AdminError, SpecError, UsageError};
use crate::executor::ProcessRunner;
use crate::format::{self, Transform};
use crate::invoke::{ExternalCall, Invoker};
use crate::router::{Route, Router, FORMAT_FLAG};
use crate::workspace::Workspace;
use async_trait::async_trait;
use std::fmt;
use std::io::Write;
use tracing::info;

/// One administrative tool: its command surface and its handlers.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tagged command variants, one per handler.
    type Command: Copy + fmt::Debug + Send + Sync + 'static;

    fn profile(&self) -> Profile;

    fn routes(&self) -> Result<Vec<Route<Self::Command>>, SpecError>;

    fn validators(&self) -> Result<Validators, SpecError>;

    /// JSON pointers tried, in order, to explain a failed call.
    fn error_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Startup checks beyond configuration, such as a required binary.
    fn check_preconditions(
        &self,
        _config: &ToolConfig,
        _runner: &dyn ProcessRunner,
    ) -> Result<(), AdminError> {
        Ok(())
    }

    /// Stages whatever credential material the tool's collaborator reads from disk.
    fn stage_credentials(&self, _config: &ToolConfig, _workspace: &Workspace) -> Result<(), AdminError> {
        Ok(())
    }

    async fn execute(
        &self,
        command: Self::Command,
        args: &BoundArgs,
        ctx: &mut Context<'_>,
    ) -> Result<(), AdminError>;
}

/// What a handler can reach while it runs.
pub struct Context<'a> {
    pub config: &'a ToolConfig,
    pub workspace: &'a Workspace,
    invoker: &'a Invoker<'a>,
    transform: &'a Transform,
    out: &'a mut (dyn Write + Send),
}

impl<'a> Context<'a> {
    pub fn new(
        config: &'a ToolConfig,
        workspace: &'a Workspace,
        invoker: &'a Invoker<'a>,
        transform: &'a Transform,
        out: &'a mut (dyn Write + Send),
    ) -> Self {
        Self {
            config,
            workspace,
            invoker,
            transform,
            out,
        }
    }

    /// Runs one call; `None` is a successful call with nothing to report.
    pub async fn call(&mut self, call: &ExternalCall) -> Result<Option<String>, AdminError> {
        self.invoker.run(call).await
    }

    /// Writes a successful body through the selected transform.
    pub fn emit(&mut self, body: Option<&str>) -> Result<(), AdminError> {
        format::emit(self.transform, body, self.out)
    }

    /// Runs one call and emits its result.
    pub async fn call_and_emit(&mut self, call: &ExternalCall) -> Result<(), AdminError> {
        let body = self.call(call).await?;
        self.emit(body.as_deref())
    }

    /// Prints a confirmation line for operations whose API returns nothing useful.
    pub fn note(&mut self, message: &str) -> Result<(), AdminError> {
        writeln!(self.out, "{}", message).map_err(|e| AdminError::Output(e.to_string()))
    }
}

/// A route resolved and its arguments bound and validated.
#[derive(Debug)]
pub struct Prepared<'e, C> {
    pub command: C,
    pub args: BoundArgs,
    pub transform: &'e Transform,
}

/// A tool assembled with its router and validators.
pub struct Engine<T: Tool> {
    tool: T,
    router: Router<T::Command>,
    validators: Validators,
}

impl<T: Tool> Engine<T> {
    /// Assembles the tool, surfacing any definition error at startup.
    pub fn new(tool: T) -> Result<Self, AdminError> {
        let router = Router::new(tool.profile().tool, tool.routes()?)?;
        let validators = tool.validators()?;
        Ok(Self {
            tool,
            router,
            validators,
        })
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn usage(&self) -> String {
        self.router.usage()
    }

    /// Route, bind, validate and resolve the format selector. No I/O.
    pub fn prepare(
        &self,
        object: &str,
        action: &str,
        rest: &[String],
    ) -> Result<Prepared<'_, T::Command>, UsageError> {
        let route = self.router.resolve(object, action)?;
        let args = route.spec().bind(rest)?;
        self.validators.validate(route.spec(), &args)?;
        let transform = route.formats().resolve(args.get(FORMAT_FLAG))?;
        Ok(Prepared {
            command: route.command,
            args,
            transform,
        })
    }

    /// Prepares and runs the handler for `tokens` (object, action, flags...).
    pub async fn dispatch(
        &self,
        tokens: &[String],
        config: &ToolConfig,
        workspace: &Workspace,
        invoker: &Invoker<'_>,
        out: &mut (dyn Write + Send),
    ) -> Result<(), AdminError> {
        let (object, action, rest) = match tokens {
            [object, action, rest @ ..] => (object, action, rest),
            [object] => {
                return Err(UsageError::UnknownAction {
                    object: object.clone(),
                    action: String::new(),
                }
                .into());
            }
            [] => return Err(UsageError::UnknownObject(String::new()).into()),
        };

        let prepared = self.prepare(object, action, rest)?;
        info!("Dispatching {:?}", prepared.command);

        let mut ctx = Context::new(config, workspace, invoker, prepared.transform, out);
        self.tool
            .execute(prepared.command, &prepared.args, &mut ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, MockHttpClient, MockProcessRunner};
    use crate::tools::directory::DirectoryTool;
    use std::future::Future;

    fn assert_send<F: Future + Send>(_: &F) {}

    #[tokio::test]
    async fn test_dispatch_future_is_send() {
        let parent = tempfile::tempdir().unwrap();
        let workspace = Workspace::acquire_in(parent.path()).unwrap();
        let engine = Engine::new(DirectoryTool).unwrap();
        let config = config("ldap://dc1.example.org", Some("Administrator"));
        let runner = MockProcessRunner::new().succeed("alice\n");
        let invoker = Invoker::new(
            Box::new(runner.clone()),
            Box::new(MockHttpClient::new()),
            &workspace,
            &[],
        );
        let tokens = vec!["user".to_string(), "list".to_string()];
        let mut out = Vec::new();

        let dispatch = engine.dispatch(&tokens, &config, &workspace, &invoker, &mut out);
        assert_send(&dispatch);
        dispatch.await.unwrap();

        assert_eq!(out, b"alice\n");
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_prepare_checks_before_any_call() {
        let engine = Engine::new(DirectoryTool).unwrap();
        let err = engine
            .prepare("user", "show", &["--name".to_string(), "-Hevil".to_string()])
            .unwrap_err();
        assert!(matches!(err, UsageError::InvalidValue { ref flag, .. } if flag == "--name"));
    }
}
