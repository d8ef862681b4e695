use clap::{Arg, Command};
use http_tape::cassette;
use http_tape::Entry;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn main() {
    let matches = Command::new("tape-inspect")
        .version("0.1.0")
        .about("Inspect JSONL cassettes")
        .subcommand(
            Command::new("list")
                .about("List all recorded exchanges in a cassette")
                .arg(
                    Arg::new("cassette")
                        .help("Path to the cassette file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("field")
                .about("Extract a field from cassette entries")
                .arg(
                    Arg::new("cassette")
                        .help("Path to the cassette file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("field")
                        .help("Field path to extract (e.g. 'req.method', 'resp.status')")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("entry")
                        .help("Entry index (0-based). If not specified, shows all entries")
                        .long("entry")
                        .short('e')
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Decode every line and report malformed ones")
                .arg(
                    Arg::new("cassette")
                        .help("Path to the cassette file")
                        .required(true)
                        .index(1),
                ),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("list", sub_matches)) => {
            let cassette_path = sub_matches.get_one::<String>("cassette").unwrap();
            list_entries(cassette_path)
        }
        Some(("field", sub_matches)) => {
            let cassette_path = sub_matches.get_one::<String>("cassette").unwrap();
            let field_path = sub_matches.get_one::<String>("field").unwrap();
            let entry_idx = sub_matches.get_one::<usize>("entry").copied();
            extract_field(cassette_path, field_path, entry_idx)
        }
        Some(("verify", sub_matches)) => {
            let cassette_path = sub_matches.get_one::<String>("cassette").unwrap();
            verify_cassette(cassette_path)
        }
        _ => {
            eprintln!("No subcommand provided. Use --help for usage information.");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn load_entries(cassette_path: &str) -> Result<Vec<Entry>, String> {
    cassette::load(Path::new(cassette_path))
        .map_err(|e| format!("Failed to load cassette: {e}"))
}

fn list_entries(cassette_path: &str) -> Result<(), String> {
    let entries = load_entries(cassette_path)?;

    let listing: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            json!({
                "index": index,
                "method": entry.req.method,
                "url": entry.req.url,
                "body_hash": entry.req.body_hash,
                "status": entry.resp.status,
            })
        })
        .collect();

    let output = json!({
        "total_entries": entries.len(),
        "entries": listing,
    });

    println!("{}", serde_json::to_string(&output).map_err(|e| e.to_string())?);
    Ok(())
}

fn extract_field(
    cassette_path: &str,
    field_path: &str,
    entry_idx: Option<usize>,
) -> Result<(), String> {
    let entries = load_entries(cassette_path)?;

    if let Some(idx) = entry_idx {
        if idx >= entries.len() {
            return Err(format!(
                "Entry index {idx} out of bounds (total: {})",
                entries.len()
            ));
        }
        let value = field_from_entry(&entries[idx], field_path)?;
        print_value(&value);
    } else {
        let mut results = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            match field_from_entry(entry, field_path) {
                Ok(value) => results.push(json!({ "index": index, "value": value })),
                Err(_) => results.push(json!({ "index": index, "value": null })),
            }
        }
        println!(
            "{}",
            serde_json::to_string(&results).map_err(|e| e.to_string())?
        );
    }

    Ok(())
}

fn field_from_entry(entry: &Entry, field_path: &str) -> Result<Value, String> {
    let entry_json =
        serde_json::to_value(entry).map_err(|e| format!("Failed to serialize entry: {e}"))?;

    let mut current = &entry_json;
    for part in field_path.split('.') {
        match current {
            Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| format!("Field '{part}' not found in object"))?;
            }
            _ => {
                return Err(format!("Cannot access field '{part}' on non-object value"));
            }
        }
    }

    Ok(current.clone())
}

fn print_value(value: &Value) {
    match value {
        // Print raw string content without JSON escaping
        Value::String(s) => print!("{s}"),
        _ => print!("{}", serde_json::to_string(value).unwrap_or_default()),
    }
}

fn verify_cassette(cassette_path: &str) -> Result<(), String> {
    let path = PathBuf::from(cassette_path);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read cassette file: {e}"))?;

    let mut good = 0usize;
    let mut bad = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Entry>(line) {
            Ok(_) => good += 1,
            Err(e) => bad.push(json!({ "line": idx + 1, "error": e.to_string() })),
        }
    }

    let ok = bad.is_empty();
    let report = json!({
        "cassette": cassette_path,
        "valid_entries": good,
        "malformed_lines": bad,
        "ok": ok,
    });
    println!("{}", serde_json::to_string(&report).map_err(|e| e.to_string())?);

    if ok {
        Ok(())
    } else {
        Err("cassette contains malformed lines".to_string())
    }
}
