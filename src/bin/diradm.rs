use adminkit::tools::directory::DirectoryTool;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    adminkit::cli::run(DirectoryTool).await
}
