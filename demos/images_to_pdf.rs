/// Images to PDF Demo
///
/// Lays each given image onto its own A4 page and saves the composed
/// document in the current directory.
///
/// Usage:
///   cargo run --example images_to_pdf -- a.png b.jpg c.webp
use moriati::media::UploadedImage;
use moriati::pdf;

fn main() {
    tracing_subscriber::fmt::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("الرجاء رفع صورة واحدة على الأقل لإنشاء ملف PDF.");
        std::process::exit(1);
    }

    let mut images = Vec::new();
    for path in &paths {
        match UploadedImage::from_path(path) {
            Ok(image) => images.push(image),
            Err(e) => {
                eprintln!("Error: could not read {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    match pdf::compose_to_file(&images, ".") {
        Ok(path) => println!("Saved {}", path.display()),
        Err(e) => {
            eprintln!("حدث خطأ أثناء إنشاء ملف PDF.");
            eprintln!("({})", e);
            std::process::exit(1);
        }
    }
}
