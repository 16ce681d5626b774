/// Image Analysis Demo
///
/// Sends an image plus a free-text instruction to Gemini and prints the
/// model's analysis.
///
/// Usage:
///   cargo run --example image_analysis -- path/to/photo.png ["سؤالك هنا"]
///
/// Requirements:
///   - GEMINI_API_KEY set in the environment (or a .env file)
use moriati::llm::gateways::GeminiGateway;
use moriati::llm::LlmBroker;
use moriati::media::UploadedImage;
use moriati::vision::{ImageAnalyzer, DEFAULT_ANALYSIS_PROMPT};
use std::sync::Arc;

#[tokio::main]
async fn main() -> moriati::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: cargo run --example image_analysis -- <image> [prompt]");
        std::process::exit(1);
    };
    let prompt = args.next().unwrap_or_else(|| DEFAULT_ANALYSIS_PROMPT.to_string());

    let image = match UploadedImage::from_path(&path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error: could not read {}: {}", path, e);
            eprintln!("\nSupported formats: PNG, JPG, WEBP");
            std::process::exit(1);
        }
    };

    println!("Analyzing image with vision model...");
    println!("Image: {} ({})", image.id, image.mime_type);
    println!();

    let gateway = Arc::new(GeminiGateway::new());
    let broker = LlmBroker::new("gemini-2.5-flash", gateway);
    let analyzer = ImageAnalyzer::new(broker);

    // Failures come back as localized text, so there is nothing to unwrap
    let result = analyzer.analyze_upload(&image, &prompt).await;

    println!("{}", result);

    Ok(())
}
