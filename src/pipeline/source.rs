// src/pipeline/source.rs - Where master data and counselling rows come from
use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{FoundationData, InstitutionLocation, MasterInstitution, RawRowInput};

/// Read side of a run. Each call maps to one orchestrator stage; a failing call fails
/// that stage.
pub trait PipelineSource: Send + Sync {
    fn describe(&self) -> String;
    fn load_foundation(&self) -> Result<FoundationData>;
    fn load_locations(&self) -> Result<Vec<InstitutionLocation>>;
    fn load_institutions(&self) -> Result<Vec<MasterInstitution>>;
    fn load_counselling_rows(&self) -> Result<Vec<RawRowInput>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub foundation: FoundationData,
    pub locations: Vec<InstitutionLocation>,
    pub institutions: Vec<MasterInstitution>,
    pub rows: Vec<RawRowInput>,
}

impl InMemorySource {
    pub fn new(
        foundation: FoundationData,
        institutions: Vec<MasterInstitution>,
        rows: Vec<RawRowInput>,
    ) -> Self {
        Self {
            foundation,
            locations: Vec::new(),
            institutions,
            rows,
        }
    }

    pub fn with_locations(mut self, locations: Vec<InstitutionLocation>) -> Self {
        self.locations = locations;
        self
    }
}

impl PipelineSource for InMemorySource {
    fn describe(&self) -> String {
        format!(
            "in-memory source ({} institutions, {} rows)",
            self.institutions.len(),
            self.rows.len()
        )
    }

    fn load_foundation(&self) -> Result<FoundationData> {
        Ok(self.foundation.clone())
    }

    fn load_locations(&self) -> Result<Vec<InstitutionLocation>> {
        Ok(self.locations.clone())
    }

    fn load_institutions(&self) -> Result<Vec<MasterInstitution>> {
        Ok(self.institutions.clone())
    }

    fn load_counselling_rows(&self) -> Result<Vec<RawRowInput>> {
        Ok(self.rows.clone())
    }
}

pub const STATES_FILE: &str = "states.json";
pub const COURSES_FILE: &str = "courses.json";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const QUOTAS_FILE: &str = "quotas.json";
pub const LOCATIONS_FILE: &str = "locations.json";
pub const INSTITUTIONS_FILE: &str = "institutions.json";
pub const COUNSELLING_FILE: &str = "counselling.json";

/// A directory of JSON arrays, one file per data set. Categories, quotas and locations
/// are optional; the rest must exist.
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    dir: PathBuf,
}

impl JsonDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_required<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let items: Vec<T> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {} as a JSON array", path.display()))?;
        debug!("Read {} records from {}", items.len(), path.display());
        Ok(items)
    }

    fn read_optional<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        if self.dir.join(file).exists() {
            self.read_required(file)
        } else {
            info!("{} not present in {}, using an empty set", file, self.dir.display());
            Ok(Vec::new())
        }
    }
}

impl PipelineSource for JsonDirectorySource {
    fn describe(&self) -> String {
        format!("JSON directory {}", self.dir.display())
    }

    fn load_foundation(&self) -> Result<FoundationData> {
        Ok(FoundationData {
            states: self.read_required(STATES_FILE)?,
            courses: self.read_required(COURSES_FILE)?,
            categories: self.read_optional(CATEGORIES_FILE)?,
            quotas: self.read_optional(QUOTAS_FILE)?,
        })
    }

    fn load_locations(&self) -> Result<Vec<InstitutionLocation>> {
        self.read_optional(LOCATIONS_FILE)
    }

    fn load_institutions(&self) -> Result<Vec<MasterInstitution>> {
        self.read_required(INSTITUTIONS_FILE)
    }

    fn load_counselling_rows(&self) -> Result<Vec<RawRowInput>> {
        self.read_required(COUNSELLING_FILE)
    }
}
