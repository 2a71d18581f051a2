#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = tryout_rust::run_seed().await {
        eprintln!("tryout-seed fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
