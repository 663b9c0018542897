use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    stream_loader::run_with_sys_args().await
}
