// src/input.rs
use crate::cli::Args;
use crate::error::{ErrorContext, Result};
use crate::types::{IpBinding, ResolutionMode, WpFinderError};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, Read};
use std::path::Path;

/// Everything read from the input before the run starts.
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    /// Unique domains in first-seen order; this is the work queue.
    pub domains: Vec<String>,
    /// Domain/IP/fronted rows, only populated in table mode.
    pub bindings: Vec<IpBinding>,
}

/// Reads every input source named by the arguments.
pub fn load_input(args: &Args, mode: ResolutionMode) -> Result<InputTable> {
    match mode {
        ResolutionMode::Table => {
            let path = args.file.as_deref().ok_or_else(|| {
                WpFinderError::ConfigError(
                    "the path to the CSV file is required when using the --sf flag".to_string(),
                )
            })?;
            let records = read_records(open(path)?)?;
            let bindings = parse_bindings(&records)?;
            let domains = unique_domains(bindings.iter().map(|b| b.domain.clone()));
            Ok(InputTable { domains, bindings })
        }
        ResolutionMode::Dns => {
            let mut candidates = args.domain.clone();

            if let Some(path) = &args.file {
                let records = read_records(open(path)?)?;
                candidates.extend(records.iter().filter_map(|r| r.get(0).map(str::to_string)));
            }

            if args.use_stdin() {
                for line in io::stdin().lock().lines() {
                    candidates.push(line?);
                }
            }

            let domains = unique_domains(candidates);
            if domains.is_empty() {
                return Err(WpFinderError::ConfigError(
                    "No input provided. Use -f <file>, -d <domain>, or pipe domains to stdin".to_string(),
                ));
            }
            Ok(InputTable {
                domains,
                bindings: Vec::new(),
            })
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).input_context(|| format!("Error when opening the file {}", path.display()))
}

/// Reads a header-less CSV table. Rows must all have the same number of fields.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<StringRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(reader);

    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    debug!("Read {} input rows", records.len());
    Ok(records)
}

/// Turns `domain,ip,fronted` rows into bindings. A binding is fronted when
/// its third field is `true` in any letter case. Fields are already trimmed
/// by `read_records`, so `" true"` is fronted too; surrounding whitespace in
/// a hand-edited table is not treated as a different value.
pub fn parse_bindings(records: &[StringRecord]) -> Result<Vec<IpBinding>> {
    let mut bindings = Vec::with_capacity(records.len());

    for (line, record) in records.iter().enumerate() {
        if record.len() < 3 {
            return Err(WpFinderError::InputError(format!(
                "row {}: expected domain,ip,fronted but found {} field(s)",
                line + 1,
                record.len()
            )));
        }

        bindings.push(IpBinding {
            domain: record[0].to_string(),
            ip: record[1].to_string(),
            fronted: record[2].eq_ignore_ascii_case("true"),
        });
    }

    Ok(bindings)
}

/// Drops blank and repeated domains, keeping the first occurrence.
pub fn unique_domains<I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut domains = Vec::new();

    for candidate in candidates {
        let domain = candidate.trim();
        if domain.is_empty() {
            warn!("Skipping row with an empty domain");
            continue;
        }
        if seen.insert(domain.to_string()) {
            domains.push(domain.to_string());
        }
    }

    domains
}
