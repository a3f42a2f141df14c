#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = webdojo_rust::run_worker().await {
        eprintln!("webdojo-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
