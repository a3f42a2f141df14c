#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = webdojo_rust::run().await {
        eprintln!("webdojo-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
