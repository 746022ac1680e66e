/*
 * Responsibility
 * - tokio runtime 起動
 * - CLI 解析 → cli::run() の呼び出し (ロジックは置かない)
 */
use anyhow::Result;
use clap::Parser;

use extauth::{app, cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::init_tracing();
    cli::run(cli).await
}
