use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

mod slug {
    include!("../slug.rs");
}

mod pyq {
    include!("../pyq.rs");
}

use pyq::PyqIndex;

#[derive(Parser)]
#[command(name = "pyq-index")]
#[command(about = "Generates the static previous-year-question index", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        help = "Directory with one \"<Subject Name> (<Code>)\" folder per subject",
        default_value = "question-papers"
    )]
    dir: PathBuf,

    #[arg(short, long, help = "Output path for the generated index", default_value = "pyq-data.json")]
    out: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut index = PyqIndex::new();

    if cli.dir.exists() {
        for entry in fs::read_dir(&cli.dir)
            .with_context(|| format!("Failed to read {}", cli.dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let folder = entry.file_name().to_string_lossy().to_string();

            // Sorted so regenerating the index never reorders records.
            let mut pdf_names: Vec<String> = fs::read_dir(entry.path())?
                .filter_map(|f| f.ok())
                .map(|f| f.file_name().to_string_lossy().to_string())
                .filter(|name| name.ends_with(".pdf"))
                .collect();
            pdf_names.sort();

            let mut records = Vec::new();
            for file_name in pdf_names {
                let size_bytes = fs::metadata(entry.path().join(&file_name))?.len();
                records.push(pyq::build_record(&folder, &file_name, size_bytes));
            }

            if !records.is_empty() {
                index.insert(pyq::subject_folder_slug(&folder), records);
            }
        }
    }

    let json = serde_json::to_string_pretty(&index)?;
    fs::write(&cli.out, json)
        .with_context(|| format!("Failed to write {}", cli.out.display()))?;

    println!("Generated PYQ data for {} subjects.", index.len());
    Ok(())
}
