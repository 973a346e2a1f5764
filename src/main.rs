#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = enem_mentor::run().await {
        eprintln!("enem-mentor fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
