use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

// The training pipeline writes either a bare column list or a meta object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaJson {
    Columns(Vec<String>),
    Meta { feat_list: Vec<String> },
}

/// Ordered feature-column names the classifier was trained on.
///
/// Defines both the vector's dimensionality and its column order. Immutable
/// once loaded; `position` is the name→index table used by the encoder.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            bail!("schema has no columns");
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                bail!("duplicate schema column {:?}", name);
            }
        }
        Ok(Self { columns, index })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema at {}", path.display()))?;
        Self::from_json(&txt).with_context(|| format!("invalid schema in {}", path.display()))
    }

    pub fn from_json(txt: &str) -> Result<Self> {
        let parsed: SchemaJson =
            serde_json::from_str(txt).context("expected a JSON array of column names")?;
        let columns = match parsed {
            SchemaJson::Columns(c) => c,
            SchemaJson::Meta { feat_list } => feat_list,
        };
        Self::new(columns)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
