// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Writes the `MusicService` CustomResourceDefinition derived from `src/crd.rs`, so the
//! manifest in `deploy/crds/` never drifts from the Rust types.
//!
//! Usage:
//!   cargo run --bin crdgen            # writes deploy/crds/musicservices.crd.yaml
//!   cargo run --bin crdgen -- -       # prints to stdout

use kube::CustomResourceExt;
use music_operator::crd::MusicService;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

const OUTPUT_DIR: &str = "deploy/crds";
const OUTPUT_FILE: &str = "musicservices.crd.yaml";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let yaml = serde_yaml::to_string(&MusicService::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    if std::env::args().nth(1).as_deref() == Some("-") {
        print!("{content}");
        return Ok(());
    }

    let output_dir = Path::new(OUTPUT_DIR);
    fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join(OUTPUT_FILE);
    fs::write(&output_path, content)?;
    println!("✓ Generated {}", output_path.display());
    println!("  Deploy with: kubectl apply -f {OUTPUT_DIR}/");

    Ok(())
}
