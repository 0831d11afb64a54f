//! CLI tool generating the developer layout sample for a report PDF
//!
//! Prints word coordinates of the first page to a JSON file and writes an
//! annotated copy of the document (x0 below each word, y0 in the left
//! margin) so a `ReportLayout`, notably its `subsection_x_ref`, can be
//! authored against a concrete report.

use report_extractor::artifacts::generate_layout_sample;
use std::env;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [output_dir]", args[0]);
        process::exit(1);
    }

    let pdf_path = Path::new(&args[1]);
    let output_dir = args.get(2).map(Path::new);

    match generate_layout_sample(pdf_path, output_dir) {
        Ok(sample) => {
            println!("Layout sample generated");
            println!("  coordinates: {}", sample.coordinates_json.display());
            println!("  annotated:   {}", sample.annotated_pdf.display());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
