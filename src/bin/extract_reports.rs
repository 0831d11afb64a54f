//! CLI tool for batch report extraction

use report_extractor::{artifacts, extract_document, ExtractOptions, ReportAggregator, ReportLayout};
use std::env;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <pdf_file_or_directory> <output_dir> [--json] [--dump-lines]", args[0]);
        eprintln!();
        eprintln!("Extracts structured fields from SISCAN mammography reports.");
        eprintln!("Writes records.json and pending_lines.json to the output directory.");
        eprintln!("  --json        print the full dataset as JSON to stdout");
        eprintln!("  --dump-lines  also write a reconstructed-line dump per document");
        process::exit(1);
    }

    let input = Path::new(&args[1]);
    let output_dir = Path::new(&args[2]);
    let json_output = args.iter().any(|a| a == "--json");
    let dump_lines = args.iter().any(|a| a == "--dump-lines");

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        eprintln!("Error: cannot create {}: {}", output_dir.display(), e);
        process::exit(1);
    }

    let layout = ReportLayout::siscan_mammography();
    let aggregator = match ReportAggregator::new(layout.clone()) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let paths: Vec<PathBuf> = if input.is_dir() {
        match std::fs::read_dir(input) {
            Ok(entries) => {
                let mut paths: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect();
                paths.sort();
                paths
            }
            Err(e) => {
                eprintln!("Error: cannot read {}: {}", input.display(), e);
                process::exit(1);
            }
        }
    } else {
        vec![input.to_path_buf()]
    };

    let dataset = aggregator.process_paths(&paths);

    if dump_lines {
        let options = ExtractOptions::default();
        for path in &paths {
            if let Ok(doc) = extract_document(path, &layout, &options) {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                let dump = output_dir.join(format!("{stem}_lines.txt"));
                if let Err(e) = artifacts::write_lines_dump(&dump, &doc) {
                    eprintln!("Warning: line dump for {} failed: {}", path.display(), e);
                }
            }
        }
    }

    let records_path = output_dir.join("records.json");
    if let Err(e) = artifacts::write_records_json(&records_path, &dataset.records) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    let pending_path = output_dir.join("pending_lines.json");
    if let Err(e) = artifacts::write_pending_json(&pending_path, &dataset.pending) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if json_output {
        match serde_json::to_string(&dataset) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("Report Extraction");
        println!("=================");
        println!("Input: {}", input.display());
        println!("Documents: {}", paths.len());
        println!("Records: {}", dataset.records.len());
        println!("Skipped: {}", dataset.skipped.len());
        for skip in &dataset.skipped {
            println!("  - {}: {}", skip.file, skip.reason);
        }
        if dataset.has_pending() {
            println!();
            println!("Unclassified lines were found; the report layout may have");
            println!("drifted. Inspect {}", pending_path.display());
        }
        println!();
        println!("Records written to: {}", records_path.display());
    }

    if dataset.records.is_empty() {
        process::exit(2);
    }
}
