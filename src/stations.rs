//! User station list (`name|url|genre|slogan` lines) and the read-only
//! curated catalog loaded from per-country JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{RadioError, Result};

pub const MAX_STATIONS: usize = 64;
pub const MAX_COUNTRIES: usize = 32;
pub const MAX_CURATED_STATIONS: usize = 256;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecord {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub slogan: String,
}

impl StationRecord {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// One registry line; name and url are required
    fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.trim_end_matches(&['\r', '\n'][..]).split('|');
        let name = fields.next()?.trim();
        let url = fields.next()?.trim();
        if name.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            url: url.to_string(),
            genre: fields.next().unwrap_or_default().trim().to_string(),
            slogan: fields.next().unwrap_or_default().trim().to_string(),
        })
    }

    fn to_line(&self) -> String {
        let clean = |s: &str| s.replace(&['|', '\n', '\r'][..], " ");
        format!(
            "{}|{}|{}|{}",
            clean(&self.name),
            clean(&self.url),
            clean(&self.genre),
            clean(&self.slogan)
        )
    }
}

/// Persistent user station list
#[derive(Debug, Default)]
pub struct StationRegistry {
    path: Option<PathBuf>,
    stations: Vec<StationRecord>,
}

impl StationRegistry {
    /// Registry without a backing file
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads `path`; a missing file is an empty registry
    pub fn load(path: &Path) -> Result<Self> {
        let mut registry = Self {
            path: Some(path.to_path_buf()),
            stations: Vec::new(),
        };
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(registry),
            Err(e) => return Err(e.into()),
        };
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match StationRecord::parse_line(line) {
                Some(record) if registry.stations.len() < MAX_STATIONS => {
                    registry.stations.push(record)
                }
                Some(_) => {
                    warn!(path = %path.display(), "station list truncated at {MAX_STATIONS}");
                    break;
                }
                None => warn!(line = lineno + 1, "skipping malformed station entry"),
            }
        }
        info!(count = registry.stations.len(), "stations loaded");
        Ok(registry)
    }

    /// Writes the registry back to its file, creating parent directories
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for s in &self.stations {
            text.push_str(&s.to_line());
            text.push('\n');
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    pub fn get(&self, index: usize) -> Option<&StationRecord> {
        self.stations.get(index)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.stations.iter().any(|s| s.url == url)
    }

    pub fn add(&mut self, record: StationRecord) -> Result<()> {
        if self.stations.len() >= MAX_STATIONS {
            return Err(RadioError::RegistryFull);
        }
        self.stations.push(record);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<StationRecord> {
        (index < self.stations.len()).then(|| self.stations.remove(index))
    }

    /// Removes every entry with `url`; returns whether any was removed
    pub fn remove_by_url(&mut self, url: &str) -> bool {
        let before = self.stations.len();
        self.stations.retain(|s| s.url != url);
        self.stations.len() != before
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CuratedCountry {
    pub name: String,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CuratedStation {
    pub name: String,
    pub url: String,
    pub genre: String,
    pub slogan: String,
    pub country_code: String,
}

impl From<&CuratedStation> for StationRecord {
    fn from(s: &CuratedStation) -> Self {
        Self {
            name: s.name.clone(),
            url: s.url.clone(),
            genre: s.genre.clone(),
            slogan: s.slogan.clone(),
        }
    }
}

#[derive(Deserialize)]
struct CountryFile {
    country: String,
    code: String,
    #[serde(default)]
    stations: Vec<StationEntry>,
}

#[derive(Deserialize)]
struct StationEntry {
    name: Option<String>,
    url: Option<String>,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    slogan: String,
}

/// Read-only station catalog grouped by country
#[derive(Debug, Default)]
pub struct CuratedCatalog {
    countries: Vec<CuratedCountry>,
    stations: Vec<CuratedStation>,
}

impl CuratedCatalog {
    /// Loads every `*.json` file of the first existing directory in `dirs`
    pub fn load_dirs(dirs: &[PathBuf]) -> Self {
        let Some(dir) = dirs.iter().find(|d| d.is_dir()) else {
            return Self::default();
        };
        let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
                })
                .collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read catalog directory");
                return Self::default();
            }
        };
        files.sort();

        let mut catalog = Self::default();
        for file in files {
            if let Err(e) = catalog.load_file(&file) {
                warn!(file = %file.display(), error = %e, "skipping catalog file");
            }
        }
        info!(
            dir = %dir.display(),
            countries = catalog.countries.len(),
            stations = catalog.stations.len(),
            "catalog loaded"
        );
        catalog
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let parsed: CountryFile = serde_json::from_str(&fs::read_to_string(path)?)?;
        if parsed.code.is_empty() {
            return Ok(());
        }

        if !self.countries.iter().any(|c| c.code == parsed.code) {
            if self.countries.len() >= MAX_COUNTRIES {
                return Ok(());
            }
            self.countries.push(CuratedCountry {
                name: parsed.country,
                code: parsed.code.clone(),
            });
        }

        for entry in parsed.stations {
            if self.stations.len() >= MAX_CURATED_STATIONS {
                break;
            }
            let (Some(name), Some(url)) = (entry.name, entry.url) else {
                continue;
            };
            if name.is_empty() || url.is_empty() {
                continue;
            }
            self.stations.push(CuratedStation {
                name,
                url,
                genre: entry.genre,
                slogan: entry.slogan,
                country_code: parsed.code.clone(),
            });
        }
        Ok(())
    }

    pub fn countries(&self) -> &[CuratedCountry] {
        &self.countries
    }

    pub fn stations(&self) -> &[CuratedStation] {
        &self.stations
    }

    pub fn stations_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a CuratedStation> + 'a {
        self.stations.iter().filter(move |s| s.country_code == code)
    }

    pub fn station_count(&self, code: &str) -> usize {
        self.stations_for(code).count()
    }
}
