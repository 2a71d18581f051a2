#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = tryout_rust::run().await {
        eprintln!("tryout-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
