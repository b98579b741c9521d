#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser as _;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = cgit_mirror::CliArgs::parse();
    cgit_mirror::run(args).await
}

// The browser build starts from `web::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
