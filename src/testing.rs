//! Scripted collaborators shared by the unit tests.

use crate::app::{Engine, Tool};
use crate::config::{Credentials, Secret, ToolConfig};
use crate::error::AdminError;
use crate::executor::ProcessRunner;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::invoke::Invoker;
use crate::workspace::Workspace;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RunnerState {
    outputs: VecDeque<Output>,
    calls: Vec<(String, Vec<String>)>,
}

/// Mock process runner returning queued outputs in order.
///
/// Clones share state, so a test can keep one handle and give another to the
/// code under test.
#[derive(Clone)]
pub struct MockProcessRunner {
    state: Arc<Mutex<RunnerState>>,
    programs_exist: bool,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RunnerState::default())),
            programs_exist: true,
        }
    }

    pub fn succeed(self, stdout: &str) -> Self {
        self.push(0, stdout)
    }

    pub fn fail(self, code: i32, stdout: &str) -> Self {
        self.push(code, stdout)
    }

    pub fn killed(self) -> Self {
        self.state.lock().unwrap().outputs.push_back(Output {
            status: ExitStatus::from_raw(9),
            stdout: vec![],
            stderr: vec![],
        });
        self
    }

    pub fn missing_programs(mut self) -> Self {
        self.programs_exist = false;
        self
    }

    fn push(self, code: i32, stdout: &str) -> Self {
        self.state.lock().unwrap().outputs.push_back(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: vec![],
        });
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((program.to_string(), args.to_vec()));
        state
            .outputs
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted output for {}", program))
    }

    fn program_exists(&self, _program: &str) -> bool {
        self.programs_exist
    }
}

#[derive(Default)]
struct HttpState {
    responses: VecDeque<HttpResponse>,
    requests: Vec<HttpRequest>,
}

/// Mock HTTP client returning queued responses in order.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    state: Arc<Mutex<HttpState>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.state.lock().unwrap().responses.push_back(HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        });
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        state
            .responses
            .pop_front()
            .ok_or_else(|| anyhow!("connection refused: {}", request.url))
    }
}

pub fn config(endpoint: &str, identity: Option<&str>) -> ToolConfig {
    ToolConfig {
        endpoint: endpoint.to_string(),
        credentials: Credentials {
            identity: identity.map(str::to_string),
            secret: Secret::new("s3cret"),
        },
        program: None,
    }
}

/// Result of driving one command line through a tool.
pub struct Run {
    pub result: Result<(), AdminError>,
    pub stdout: String,
    pub calls: usize,
    /// Workspace root the run used, already removed when `Run` is returned.
    pub workspace: std::path::PathBuf,
}

/// Runs `argv` (object, action, flags...) through `tool` with scripted collaborators.
pub async fn run_tool<T: Tool>(
    tool: T,
    config: &ToolConfig,
    runner: &MockProcessRunner,
    http: &MockHttpClient,
    argv: &[&str],
) -> Run {
    let parent = tempfile::tempdir().unwrap();
    let workspace = Workspace::acquire_in(parent.path()).unwrap();
    let engine = Engine::new(tool).unwrap();
    engine.tool().stage_credentials(config, &workspace).unwrap();

    let invoker = Invoker::new(
        Box::new(runner.clone()),
        Box::new(http.clone()),
        &workspace,
        engine.tool().error_fields(),
    );
    let tokens: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
    let mut out = Vec::new();
    let result = engine
        .dispatch(&tokens, config, &workspace, &invoker, &mut out)
        .await;
    let calls = invoker.call_count();
    drop(invoker);

    let root = workspace.path().to_path_buf();
    workspace.release().unwrap();
    Run {
        result,
        stdout: String::from_utf8(out).unwrap(),
        calls,
        workspace: root,
    }
}
