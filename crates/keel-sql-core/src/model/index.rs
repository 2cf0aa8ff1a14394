//! Index declarations.

/// One index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Name derived from the column list.
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// Creates an index named after its columns.
    #[must_use]
    pub fn new<I, S>(columns: I, unique: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            name: columns.join("_"),
            columns,
            unique,
        }
    }

    /// Name of the index once created on `table`.
    #[must_use]
    pub fn qualified_name(&self, table: &str) -> String {
        format!("{table}_{}", self.name)
    }
}

/// Ordered collection of a model's indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indexes(Vec<IndexSpec>);

impl Indexes {
    /// Adds a plain index.
    pub fn add<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.push(IndexSpec::new(columns, false));
    }

    /// Adds a unique index.
    pub fn add_unique<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.push(IndexSpec::new(columns, true));
    }

    /// Iterates the indexes in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, IndexSpec> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Indexes {
    type Item = &'a IndexSpec;
    type IntoIter = std::slice::Iter<'a, IndexSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
