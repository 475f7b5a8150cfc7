use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    regscout_app::run().await
}
