#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), eframe::Error> {
    // Set up logging; RUST_LOG=debug shows snapping and drop decisions
    env_logger::init();

    // File dialogs and interpretation requests run on this runtime
    tarot_canvas::run_app()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
