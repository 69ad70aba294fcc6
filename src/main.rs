mod api;
mod app;
mod core;
mod engine;
mod metadata;
mod utils;

use app::CoreApp;

#[tokio::main]
async fn main() {
    if let Err(e) = CoreApp::run().await {
        eprintln!("\nError: {}\n", e);
        std::process::exit(1);
    }
}
