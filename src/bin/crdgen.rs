//! # CRD Generator
//!
//! Generates the Kubernetes CustomResourceDefinition YAML for `Bucket` from
//! the Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Print the CRD
//! cargo run --bin crdgen
//!
//! # Write it to a file
//! cargo run --bin crdgen -- --output config/crd/bucket.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use gcs_bucket_operator::crd::Bucket;
use kube::core::CustomResourceExt;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "crdgen", about = "Print the Bucket CustomResourceDefinition", version)]
struct Args {
    /// Write the CRD to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let yaml = serde_yaml::to_string(&Bucket::crd()).context("Failed to serialize CRD")?;

    match args.output {
        Some(path) => std::fs::write(&path, yaml)
            .with_context(|| format!("Failed to write CRD to {}", path.display()))?,
        None => print!("{yaml}"),
    }

    Ok(())
}
