use pdf_sign_stamp::{sign_document, SignatureArea, SignatureSource, SigningOptions};
use std::{fs::File, io::Write};

// Usage: sign_doc <document.pdf> <signature.png|signature.txt> <areas.json> <result.pdf>
// A signature file starting with `data:` is treated as a drawn canvas export,
// anything else as an uploaded photo.
fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!(
            "Usage: {} <document.pdf> <signature> <areas.json> <result.pdf>",
            args[0]
        );
        std::process::exit(2);
    }

    let pdf_data = std::fs::read(&args[1]).unwrap();
    let signature_data = std::fs::read(&args[2]).unwrap();
    let source = if signature_data.starts_with(b"data:") {
        SignatureSource::Drawn(String::from_utf8(signature_data).unwrap().trim().to_owned())
    } else {
        SignatureSource::Uploaded(signature_data)
    };
    let areas =
        SignatureArea::list_from_json(&std::fs::read_to_string(&args[3]).unwrap()).unwrap();
    // Set PREVIEW_WIDTH=500 for areas captured on the 500px wide web preview.
    let options = SigningOptions {
        preview_width: std::env::var("PREVIEW_WIDTH")
            .ok()
            .and_then(|width| width.parse().ok()),
        ..SigningOptions::default()
    };

    let signed = sign_document(&pdf_data, &source, &areas, &options).unwrap();

    let mut pdf_file = File::create(&args[4]).unwrap();
    pdf_file.write_all(&signed.pdf).unwrap();
}
