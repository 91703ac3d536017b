//! Adminkit - a shared engine for object/action administration CLIs.
//!
//! Each tool built on this crate is a thin command surface over one external
//! collaborator (a directory-administration binary or a REST service). The
//! engine supplies everything around the domain calls:
//!
//! - **Routing** of `<object> <action>` pairs, with aliases, to handlers
//! - **Declarative flag validation** before any external call is made
//! - **A scoped temp workspace** that is removed on every exit path
//! - **Single-attempt invocation** of subprocesses and HTTP requests
//! - **Output transforms** selected with `--format`
//!
//! # Architecture
//!
//! - [`args`] - Flag specs, bound arguments and value rules
//! - [`router`] - Object/action routes and generated usage text
//! - [`workspace`] - The per-invocation temp directory
//! - [`executor`] - Subprocess seam
//! - [`http_client`] - HTTP seam
//! - [`invoke`] - Runs a call once and classifies the result
//! - [`format`] - Output transforms
//! - [`config`] - File and environment configuration
//! - [`app`] - The [`app::Tool`] trait and the dispatching [`app::Engine`]
//! - [`cli`] - Process entry point
//! - [`tools`] - `diradm`, `qualadm` and `forgeadm`
//!
//! # Example
//!
//! ```ignore
//! use adminkit::tools::forge::ForgeTool;
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     adminkit::cli::run(ForgeTool).await
//! }
//! ```
//!
//! ```bash
//! export FORGEADM_URL=https://git.example.org FORGEADM_SECRET=glpat-...
//! forgeadm project list --format table
//! forgeadm group delete --group infra/legacy
//! ```

pub mod app;
pub mod args;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod http_client;
pub mod invoke;
pub mod router;
pub mod tools;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;
