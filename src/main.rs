use rask_log_metrics::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}
