use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    ExitCode::from(dlq_resend::cli::run(std::env::args_os()).await)
}
