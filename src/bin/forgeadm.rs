use adminkit::tools::forge::ForgeTool;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    adminkit::cli::run(ForgeTool).await
}
