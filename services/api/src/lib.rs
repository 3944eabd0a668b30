mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use buildpoints::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
