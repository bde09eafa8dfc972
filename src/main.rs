#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_session::run().await {
        eprintln!("exam-session fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
