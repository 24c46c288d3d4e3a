//! Pipeline artifact validator
//!
//! Loads an exported pipeline the same way the server does, prints its layout
//! and optionally re-encodes it (e.g. JSON to bincode).

use anyhow::{Context, Result};
use clap::Parser;
use common::artifact::{encode, ArtifactFormat};
use common::{load_pipeline, ColumnTransformer, HandleUnknown};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Validate an exported recurrence pipeline artifact")]
struct Args {
    /// Path to the artifact (.json or .bin)
    file: PathBuf,

    /// Write the validated pipeline to this path; the extension picks the encoding
    #[arg(long)]
    convert: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Model artifact: {}", args.file.display());
    let pipeline = load_pipeline(&args.file)?;

    println!("Name:     {}", pipeline.name);
    println!("Version:  {}", pipeline.version);
    println!("Columns:  {}", pipeline.feature_columns.join(", "));
    for transformer in &pipeline.transformers {
        match transformer {
            ColumnTransformer::StandardScaler { columns, .. } => {
                println!("  scaler       {:?}", columns)
            }
            ColumnTransformer::OneHotEncoder {
                columns,
                handle_unknown,
                ..
            } => {
                let unknown = match handle_unknown {
                    HandleUnknown::Error => "error",
                    HandleUnknown::Ignore => "ignore",
                };
                println!(
                    "  one-hot      {} columns, {} levels, unknown={}",
                    columns.len(),
                    transformer.width(),
                    unknown
                )
            }
            ColumnTransformer::Passthrough { columns } => {
                println!("  passthrough  {:?}", columns)
            }
        }
    }
    println!(
        "Features: {} -> classes {:?}",
        pipeline.n_features_out(),
        pipeline.classifier.classes
    );

    if let Some(out) = args.convert {
        let format = ArtifactFormat::from_path(&out);
        let bytes = encode(&pipeline, format)?;
        fs::write(&out, &bytes).with_context(|| format!("failed to write {}", out.display()))?;
        println!("Wrote {} bytes as {:?} to {}", bytes.len(), format, out.display());
    }

    println!("OK");
    Ok(())
}
