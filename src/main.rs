#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = soma_exam::run().await {
        eprintln!("soma-exam fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
