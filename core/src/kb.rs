use crate::corpus::TicketRecord;
use crate::error::{IngestError, KbError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Records read from knowledge-base files plus the lines that could not be parsed.
#[derive(Debug, Default)]
pub struct KbFile {
    pub records: Vec<TicketRecord>,
    pub malformed: Vec<String>,
}

/// Collect `.json`/`.jsonl` files from a file path or a directory tree, sorted.
pub fn discover(input: &Path) -> Result<Vec<PathBuf>, KbError> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(KbError::Io { path: input.to_path_buf(), source: std::io::Error::from(std::io::ErrorKind::NotFound) });
    }
    if files.is_empty() {
        return Err(KbError::Empty(input.to_path_buf()));
    }
    Ok(files)
}

/// Load every knowledge-base file under `input`.
pub fn load_path(input: &Path) -> Result<KbFile, KbError> {
    let mut out = KbFile::default();
    for file in discover(input)? {
        let loaded = load_file(&file)?;
        tracing::info!(file = %file.display(), records = loaded.records.len(), malformed = loaded.malformed.len(), "loaded knowledge-base file");
        out.records.extend(loaded.records);
        out.malformed.extend(loaded.malformed);
    }
    Ok(out)
}

pub fn load_file(file: &Path) -> Result<KbFile, KbError> {
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        load_jsonl(file)
    } else {
        load_json(file)
    }
}

fn open(file: &Path) -> Result<BufReader<File>, KbError> {
    File::open(file).map(BufReader::new).map_err(|source| KbError::Io { path: file.to_path_buf(), source })
}

fn load_jsonl(file: &Path) -> Result<KbFile, KbError> {
    let reader = open(file)?;
    let mut out = KbFile::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| KbError::Io { path: file.to_path_buf(), source })?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<TicketRecord>(&line) {
            Ok(rec) => out.records.push(rec),
            Err(e) => {
                tracing::warn!(file = %file.display(), line = lineno + 1, error = %e, "skipping malformed line");
                out.malformed.push(IngestError::Malformed(format!("{}:{}: {e}", file.display(), lineno + 1)).to_string());
            }
        }
    }
    Ok(out)
}

fn load_json(file: &Path) -> Result<KbFile, KbError> {
    let reader = open(file)?;
    let json: serde_json::Value = serde_json::from_reader(reader).map_err(|source| KbError::Json { path: file.to_path_buf(), source })?;
    let mut out = KbFile::default();
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => Vec::new(),
    };
    for (i, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<TicketRecord>(v) {
            Ok(rec) => out.records.push(rec),
            Err(e) => out.malformed.push(IngestError::Malformed(format!("{}[{i}]: {e}", file.display())).to_string()),
        }
    }
    Ok(out)
}
