//! Export manifests.
//!
//! A manifest is a text object written by the service next to an export,
//! listing one output file per line.

/// The files written by one export, in service order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub files: Vec<String>,
}

impl Manifest {
    /// Parses manifest text, ignoring blank lines.
    pub fn parse(text: &str) -> Self {
        Self {
            files: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns the directory of the first file, with a trailing `/`.
    pub fn data_dir(&self) -> Option<String> {
        let first = self.files.first()?;
        first.rfind('/').map(|i| first[..=i].to_string())
    }
}
