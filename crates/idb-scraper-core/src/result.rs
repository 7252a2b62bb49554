//! Extraction result model
//!
//! Internally every database and store entry is an explicit
//! `Data | Failed` sum. Only serialization flattens a failure into the
//! `{"error": "..."}` marker of the output document, so a stored value that
//! happens to carry an `error` field is never mistaken for a failure here.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::ExtractError;
use crate::extractor::StoreRecords;

/// Stand-in for data that could not be retrieved
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorMarker {
    pub error: String,
}

impl ErrorMarker {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl From<&ExtractError> for ErrorMarker {
    fn from(err: &ExtractError) -> Self {
        ErrorMarker::new(err.message())
    }
}

impl From<ExtractError> for ErrorMarker {
    fn from(err: ExtractError) -> Self {
        ErrorMarker::from(&err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Data(T),
    Failed(ErrorMarker),
}

impl<T> Extracted<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Extracted::Failed(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Extracted::Data(data) => Some(data),
            Extracted::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Extracted::Data(_) => None,
            Extracted::Failed(marker) => Some(&marker.error),
        }
    }
}

impl<T> From<Result<T, ExtractError>> for Extracted<T> {
    fn from(result: Result<T, ExtractError>) -> Self {
        match result {
            Ok(data) => Extracted::Data(data),
            Err(err) => Extracted::Failed(err.into()),
        }
    }
}

impl<T: Serialize> Serialize for Extracted<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Extracted::Data(data) => data.serialize(serializer),
            Extracted::Failed(marker) => marker.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreExtraction {
    pub name: String,
    pub outcome: Extracted<StoreRecords>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseExtraction {
    pub name: String,
    pub outcome: Extracted<Vec<StoreExtraction>>,
}

impl DatabaseExtraction {
    pub fn store(&self, name: &str) -> Option<&StoreExtraction> {
        self.outcome
            .data()
            .and_then(|stores| stores.iter().find(|store| store.name == name))
    }
}

/// Serializes a list of named entries as a JSON object in list order
struct NamedEntries<'a, T>(&'a [T]);

impl Serialize for NamedEntries<'_, StoreExtraction> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for store in self.0 {
            map.serialize_entry(&store.name, &store.outcome)?;
        }
        map.end()
    }
}

impl Serialize for DatabaseExtraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.outcome {
            Extracted::Data(stores) => NamedEntries(stores).serialize(serializer),
            Extracted::Failed(marker) => marker.serialize(serializer),
        }
    }
}

/// Aggregate document for one run, in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    databases: Vec<DatabaseExtraction>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, database: DatabaseExtraction) {
        self.databases.push(database);
    }

    pub fn databases(&self) -> &[DatabaseExtraction] {
        &self.databases
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseExtraction> {
        self.databases.iter().find(|db| db.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            databases: self.databases.len(),
            ..RunSummary::default()
        };

        for db in &self.databases {
            match &db.outcome {
                Extracted::Failed(_) => summary.failed_databases += 1,
                Extracted::Data(stores) => {
                    summary.stores += stores.len();
                    for store in stores {
                        match &store.outcome {
                            Extracted::Failed(_) => summary.failed_stores += 1,
                            Extracted::Data(records) => summary.records += records.len(),
                        }
                    }
                }
            }
        }

        summary
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.databases.len()))?;
        for db in &self.databases {
            map.serialize_entry(&db.name, db)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub databases: usize,
    pub failed_databases: usize,
    pub stores: usize,
    pub failed_stores: usize,
    pub records: usize,
}
