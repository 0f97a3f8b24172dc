// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: load an IFC file onto a token tape, inspect it, export it again
//!
//! Usage:
//!   ifc-tape stats <file>
//!   ifc-tape line <file> <id>
//!   ifc-tape export <file> [--output <path>]

mod config;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;

use anyhow::{bail, Context, Result};
use ifc_tape_core::{IfcSchema, ModelHandle, ModelRegistry, TypeCatalog};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config::{Config, LogFormat};

#[derive(Debug, Serialize)]
struct Stats<'a> {
    file: &'a str,
    lines: usize,
    tape_bytes: usize,
    next_identifier: u32,
    types: BTreeMap<String, usize>,
}

fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return Ok(());
    }

    let command = args[1].as_str();
    let path = &args[2];

    let mut registry = ModelRegistry::with_catalog(IfcSchema::new(), config.model_config());
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    let handle = registry
        .open(&data)
        .with_context(|| format!("Failed to load {}", path))?;

    match command {
        "stats" => print_stats(&registry, handle, path)?,
        "line" => {
            let id: u32 = match args.get(3) {
                Some(raw) => raw
                    .trim_start_matches('#')
                    .parse()
                    .with_context(|| format!("Invalid line id: {}", raw))?,
                None => bail!("line requires an <id> argument"),
            };
            let line = registry.get_line(handle, id)?;
            println!("{}", serde_json::to_string_pretty(&line)?);
        }
        "export" => {
            let mut output_path: Option<String> = None;
            let mut i = 3;
            while i < args.len() {
                match args[i].as_str() {
                    "--output" | "-o" => {
                        i += 1;
                        match args.get(i) {
                            Some(path) => output_path = Some(path.clone()),
                            None => bail!("--output requires a path"),
                        }
                    }
                    other => bail!("Unknown option: {}", other),
                }
                i += 1;
            }

            let text = registry.export_as_text(handle)?;
            match output_path {
                Some(out) => {
                    fs::write(&out, &text).with_context(|| format!("Failed to write {}", out))?;
                    tracing::info!(output = %out, bytes = text.len(), "Export written");
                }
                None => std::io::stdout().lock().write_all(&text)?,
            }
        }
        other => {
            print_usage();
            bail!("Unknown command: {}", other);
        }
    }

    registry.close(handle)?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ifc_tape_core=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn print_stats(registry: &ModelRegistry, handle: ModelHandle, path: &str) -> Result<()> {
    let model = registry.model(handle)?;
    let catalog = registry.catalog();

    let mut types: BTreeMap<String, usize> = BTreeMap::new();
    for entry in model.directory().entries() {
        let name = catalog
            .name_of(entry.type_code)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("#{}", entry.type_code));
        *types.entry(name).or_default() += 1;
    }

    let stats = Stats {
        file: path,
        lines: model.line_count(),
        tape_bytes: model.tape_len(),
        next_identifier: registry.next_identifier(handle)?,
        types,
    };
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn print_usage() {
    eprintln!("ifc-tape - inspect and re-export IFC models");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  ifc-tape stats <file>                     Line and type counts as JSON");
    eprintln!("  ifc-tape line <file> <id>                 One decoded line as JSON");
    eprintln!("  ifc-tape export <file> [--output <path>]  Re-export as STEP text");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  IFC_TAPE_PAGE_SIZE     Tape page size in bytes (default 65536)");
    eprintln!("  IFC_TAPE_SKIP_UNKNOWN  Skip entities of unknown type (true/false)");
    eprintln!("  IFC_TAPE_LOG_FORMAT    pretty | json");
    eprintln!("  RUST_LOG               Log filter (default info)");
}
