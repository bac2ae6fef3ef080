#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examly_rust::run_worker().await {
        eprintln!("examly-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
