//! Fully qualified table references.

use std::fmt;

/// A `project.dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    /// The reference quoted for use in GoogleSQL statement text.
    pub fn quoted(&self) -> String {
        format!("`{self}`")
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_quoting() {
        let table = TableRef::new("proj", "mdm", "Partnership_Master_List");
        assert_eq!(table.to_string(), "proj.mdm.Partnership_Master_List");
        assert_eq!(table.quoted(), "`proj.mdm.Partnership_Master_List`");
    }
}
