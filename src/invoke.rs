//! The invocation layer: run one external call, classify it, explain failures.
//!
//! Every call goes `Built -> Sent -> {Succeeded, Failed}` in a single hop.
//! There are no retries and no redirects; a caller that wants either composes
//! them around [`Invoker::invoke`].

use crate::error::AdminError;
use crate::executor::ProcessRunner;
use crate::http_client::{HttpClient, HttpRequest};
use crate::workspace::Workspace;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// A fully formed external call.
#[derive(Debug, Clone)]
pub enum ExternalCall {
    Process { program: String, args: Vec<String> },
    Http(HttpRequest),
}

impl ExternalCall {
    pub fn process(program: &str, args: Vec<String>) -> Self {
        ExternalCall::Process {
            program: program.to_string(),
            args,
        }
    }

    /// Short label used as the error cause, e.g. `samba-tool user list`.
    pub fn describe(&self) -> String {
        match self {
            ExternalCall::Process { program, args } => {
                let words: Vec<&str> = args
                    .iter()
                    .take_while(|a| !a.starts_with('-'))
                    .map(String::as_str)
                    .collect();
                if words.is_empty() {
                    program.clone()
                } else {
                    format!("{} {}", program, words.join(" "))
                }
            }
            ExternalCall::Http(request) => {
                let path = request.url.split('?').next().unwrap_or(&request.url);
                format!("{} {}", request.method, path)
            }
        }
    }
}

/// The raw status indicator of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Exit(i32),
    Signaled,
    Http(u16),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exit(code) => write!(f, "exit status {}", code),
            Status::Signaled => f.write_str("terminated by signal"),
            Status::Http(code) => write!(f, "HTTP {}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Outcome of exactly one external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub outcome: Outcome,
    pub status: Status,
    pub body: String,
    /// Message extracted from a structured failure body.
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    /// The structured error when one was found, otherwise the raw status.
    pub fn message(&self) -> String {
        self.error.clone().unwrap_or_else(|| self.status.to_string())
    }

    /// Converts to the handler-facing form.
    ///
    /// A success with an empty body is `Ok(None)` ("no result"). A failure
    /// becomes [`AdminError::Invocation`] with `context` as its cause.
    pub fn into_body(self, context: &str) -> Result<Option<String>, AdminError> {
        match self.outcome {
            Outcome::Succeeded if self.body.trim().is_empty() => Ok(None),
            Outcome::Succeeded => Ok(Some(self.body)),
            Outcome::Failed => Err(AdminError::Invocation {
                context: context.to_string(),
                message: self.message(),
            }),
        }
    }
}

/// Finds the first usable error message in a JSON body.
///
/// `fields` are JSON pointers tried in order. Strings are returned as-is;
/// other non-null values in compact JSON.
pub fn extract_error(body: &str, fields: &[&str]) -> Option<String> {
    let root: Value = serde_json::from_str(body).ok()?;
    fields.iter().find_map(|pointer| match root.pointer(pointer)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// Executes external calls on behalf of handlers.
///
/// Captured bodies, headers and request payloads are written into the
/// workspace as numbered artifacts.
pub struct Invoker<'w> {
    runner: Box<dyn ProcessRunner>,
    http: Box<dyn HttpClient>,
    workspace: &'w Workspace,
    error_fields: &'static [&'static str],
    calls: AtomicUsize,
}

impl<'w> Invoker<'w> {
    pub fn new(
        runner: Box<dyn ProcessRunner>,
        http: Box<dyn HttpClient>,
        workspace: &'w Workspace,
        error_fields: &'static [&'static str],
    ) -> Self {
        Self {
            runner,
            http,
            workspace,
            error_fields,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls executed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sends `call` exactly once and classifies the answer.
    ///
    /// # Errors
    ///
    /// Only transport faults (spawn failure, connection refused) and
    /// workspace write failures are errors here; a non-zero exit or non-2xx
    /// status is a `Failed` result.
    pub async fn invoke(&self, call: &ExternalCall) -> Result<InvocationResult, AdminError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let context = call.describe();
        let transport = |e: anyhow::Error| AdminError::Invocation {
            context: context.clone(),
            message: format!("{:#}", e),
        };

        let (succeeded, status, body) = match call {
            ExternalCall::Process { program, args } => {
                info!("Call {}: {}", n, context);
                let output = self.runner.run(program, args).await.map_err(transport)?;
                self.workspace
                    .write_artifact(&format!("stdout-{}.txt", n), &output.stdout)?;
                let status = match output.status.code() {
                    Some(code) => Status::Exit(code),
                    None => Status::Signaled,
                };
                let body = String::from_utf8_lossy(&output.stdout).into_owned();
                (output.status.success(), status, body)
            }
            ExternalCall::Http(request) => {
                info!("Call {}: {} {}", n, request.method, request.url);
                if let Some(payload) = &request.body {
                    self.workspace
                        .write_artifact(&format!("request-{}.json", n), payload.to_string().as_bytes())?;
                }
                let response = self.http.send(request).await.map_err(transport)?;
                let headers: String = response
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}\n", k, v))
                    .collect();
                self.workspace
                    .write_artifact(&format!("headers-{}.txt", n), headers.as_bytes())?;
                self.workspace
                    .write_artifact(&format!("response-{}.json", n), response.body.as_bytes())?;
                let ok = (200..300).contains(&response.status);
                (ok, Status::Http(response.status), response.body)
            }
        };

        let result = if succeeded {
            debug!("Call {} succeeded with {} ({} bytes)", n, status, body.len());
            InvocationResult {
                outcome: Outcome::Succeeded,
                status,
                body,
                error: None,
            }
        } else {
            let error = extract_error(&body, self.error_fields);
            debug!("Call {} failed with {}", n, status);
            InvocationResult {
                outcome: Outcome::Failed,
                status,
                body,
                error,
            }
        };
        Ok(result)
    }

    /// [`invoke`](Self::invoke) followed by [`InvocationResult::into_body`].
    pub async fn run(&self, call: &ExternalCall) -> Result<Option<String>, AdminError> {
        let context = call.describe();
        self.invoke(call).await?.into_body(&context)
    }
}
