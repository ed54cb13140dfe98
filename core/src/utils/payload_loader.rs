use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::core::ScanType;
use crate::detectors::crlf;
use crate::error::ScanError;

pub const DEFAULT_PAYLOAD_DIR: &str = "payloads";
pub const DEFAULT_SQLI_DB: &str = "generic";

/// Where payload lists come from.
pub trait PayloadSource: Send + Sync {
    fn load_payloads(&self, scan_type: ScanType) -> Result<Vec<String>, ScanError>;

    /// Category name to the payload files in it.
    fn list_available(&self) -> Result<BTreeMap<String, Vec<String>>, ScanError>;
}

/// Payload files laid out under one directory:
///
/// ```text
/// payloads/
///   lfi-payloads.txt
///   or.txt
///   xss.txt
///   sqli/generic.txt   (or sqli/<db>.txt)
/// ```
#[derive(Debug, Clone)]
pub struct PayloadLoader {
    dir: PathBuf,
    sqli_db: String,
    overrides: HashMap<ScanType, PathBuf>,
}

impl PayloadLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), sqli_db: DEFAULT_SQLI_DB.to_string(), overrides: HashMap::new() }
    }

    /// Picks `sqli/<db>.txt` for SQLi scans.
    pub fn with_sqli_db(mut self, db: &str) -> Self {
        if !db.trim().is_empty() {
            self.sqli_db = db.trim().to_lowercase();
        }
        self
    }

    /// Uses `path` as-is instead of the directory layout for `scan_type`.
    pub fn with_file(mut self, scan_type: ScanType, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(scan_type, path.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `None` for CRLF, which has no payload file.
    pub fn file_for(&self, scan_type: ScanType) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&scan_type) {
            return Some(path.clone());
        }
        let relative = match scan_type {
            ScanType::Lfi => PathBuf::from("lfi-payloads.txt"),
            ScanType::OpenRedirect => PathBuf::from("or.txt"),
            ScanType::Xss => PathBuf::from("xss.txt"),
            ScanType::Sqli => Path::new("sqli").join(format!("{}.txt", self.sqli_db)),
            ScanType::Crlf => return None,
        };
        Some(self.dir.join(relative))
    }

    /// Number of payloads in a file under the payload directory; 0 if it
    /// cannot be read.
    pub fn payload_count(&self, relative: impl AsRef<Path>) -> usize {
        load_list_from_file(self.dir.join(relative)).map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for PayloadLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_DIR)
    }
}

impl PayloadSource for PayloadLoader {
    fn load_payloads(&self, scan_type: ScanType) -> Result<Vec<String>, ScanError> {
        let Some(path) = self.file_for(scan_type) else {
            return Ok(crlf::payloads());
        };
        let payloads = load_list_from_file(&path)?;
        if payloads.is_empty() {
            warn!("No {} payloads in {}", scan_type, path.display());
        } else {
            debug!("Loaded {} {} payload(s) from {}", payloads.len(), scan_type, path.display());
        }
        Ok(payloads)
    }

    fn list_available(&self) -> Result<BTreeMap<String, Vec<String>>, ScanError> {
        if !self.dir.is_dir() {
            return Err(ScanError::PayloadNotFound { path: self.dir.clone() });
        }
        let mut files = Vec::new();
        collect_txt_files(&self.dir, &mut files)
            .map_err(|source| ScanError::PayloadRead { path: self.dir.clone(), source })?;

        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in files {
            let relative = file.strip_prefix(&self.dir).unwrap_or(&file);
            let category = match relative.parent().and_then(|p| p.file_name()) {
                Some(name) => name.to_string_lossy().into_owned(),
                None => "root".to_string(),
            };
            categories
                .entry(category)
                .or_default()
                .push(relative.to_string_lossy().replace('\\', "/"));
        }
        for list in categories.values_mut() {
            list.sort();
        }
        Ok(categories)
    }
}

fn collect_txt_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_txt_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            out.push(path);
        }
    }
    Ok(())
}

/// Loads one payload per line, trimmed, skipping blank lines. Lines are
/// otherwise kept verbatim: `#` is a legitimate payload character.
pub fn load_list_from_file(path: impl AsRef<Path>) -> Result<Vec<String>, ScanError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ScanError::PayloadNotFound { path: path.to_path_buf() },
        _ => ScanError::PayloadRead { path: path.to_path_buf(), source },
    })?;

    let mut payloads = Vec::new();
    for line in io::BufReader::new(file).lines() {
        let line = line.map_err(|source| ScanError::PayloadRead {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            payloads.push(trimmed.to_string());
        }
    }
    Ok(payloads)
}
