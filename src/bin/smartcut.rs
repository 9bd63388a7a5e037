//! SmartCut CLI
//!
//! Removes the background of photographs with a U2-Net style ONNX model and
//! writes `<stem>_nobg.png` next to each input.

#[cfg(feature = "cli")]
use smartcut::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
