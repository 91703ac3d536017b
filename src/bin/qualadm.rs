use adminkit::tools::quality::QualityTool;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    adminkit::cli::run(QualityTool).await
}
