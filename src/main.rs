#[tokio::main]
async fn main() -> anyhow::Result<()> {
    intervalrun_lib::run().await
}
