#[tokio::main]
async fn main() -> anyhow::Result<()> {
    boxvision_server::start().await
}
