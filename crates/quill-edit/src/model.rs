use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of file-level change requested by an [`EditOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum OperationKind {
    Create,
    Edit,
    Delete,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Create, Self::Edit, Self::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Edit => "Edit",
            Self::Delete => "Delete",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic file change proposed by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EditOperation {
    /// Absolute path of the file to create, edit or delete.
    #[serde(alias = "file", alias = "path")]
    pub target_path: PathBuf,
    /// Exact text to replace. Multi-line allowed. Must appear verbatim in the
    /// current file. Empty for Create and Delete.
    #[serde(default)]
    pub search: String,
    /// Replacement text. Multi-line allowed. Empty for Delete.
    #[serde(default)]
    pub replace: String,
    /// One of Create, Edit, Delete.
    #[serde(alias = "type", alias = "kind")]
    pub operation_kind: OperationKind,
}

impl EditOperation {
    pub fn create(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            search: String::new(),
            replace: String::new(),
            operation_kind: OperationKind::Create,
        }
    }

    pub fn edit(
        target_path: impl Into<PathBuf>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            target_path: target_path.into(),
            search: search.into(),
            replace: replace.into(),
            operation_kind: OperationKind::Edit,
        }
    }

    pub fn delete(target_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            search: String::new(),
            replace: String::new(),
            operation_kind: OperationKind::Delete,
        }
    }

    pub fn path(&self) -> &Path {
        &self.target_path
    }
}

/// Ordered list of operations produced by one planning request.
///
/// Order matters: operations are applied strictly in sequence and a later
/// operation on the same path sees the file as the earlier one left it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EditBatch {
    /// Operations in application order.
    #[serde(alias = "edit_data_list")]
    pub edits: Vec<EditOperation>,
}

impl EditBatch {
    pub fn new(edits: Vec<EditOperation>) -> Self {
        Self { edits }
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditOperation> {
        self.edits.iter()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// JSON schema handed to the oracle as the structured-output contract.
    ///
    /// Subschemas are inlined so providers that only understand flat schemas
    /// can still constrain their output.
    pub fn json_schema() -> Result<serde_json::Value, serde_json::Error> {
        let generator = SchemaSettings::draft07()
            .with(|settings| settings.inline_subschemas = true)
            .into_generator();
        serde_json::to_value(generator.into_root_schema_for::<EditBatch>())
    }
}

impl From<Vec<EditOperation>> for EditBatch {
    fn from(edits: Vec<EditOperation>) -> Self {
        Self { edits }
    }
}

impl<'a> IntoIterator for &'a EditBatch {
    type Item = &'a EditOperation;
    type IntoIter = std::slice::Iter<'a, EditOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.iter()
    }
}

impl IntoIterator for EditBatch {
    type Item = EditOperation;
    type IntoIter = std::vec::IntoIter<EditOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{EditBatch, EditOperation, OperationKind};

    #[test]
    fn parses_canonical_field_names() {
        let batch = EditBatch::from_json(
            r#"{"edits":[{"target_path":"/tmp/a.py","search":"foo","replace":"bar","operation_kind":"Edit"}]}"#,
        )
        .expect("batch should parse");

        assert_eq!(
            batch.edits,
            vec![EditOperation::edit("/tmp/a.py", "foo", "bar")]
        );
    }

    #[test]
    fn accepts_legacy_field_names() {
        let batch = EditBatch::from_json(
            r#"{"edit_data_list":[{"file":"/tmp/b.txt","type":"Delete"}]}"#,
        )
        .expect("legacy names should parse");

        assert_eq!(batch.edits, vec![EditOperation::delete("/tmp/b.txt")]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = EditBatch::from_json(
            r#"{"edits":[{"target_path":"/tmp/a","operation_kind":"Rename"}]}"#,
        )
        .expect_err("closed enum must reject Rename");
        assert!(err.to_string().contains("unknown variant"));
    }

    #[test]
    fn missing_envelope_is_rejected() {
        let err = EditBatch::from_json("{}").expect_err("edits is required");
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn kind_parse_is_case_insensitive() {
        assert_eq!(OperationKind::parse(" DELETE "), Some(OperationKind::Delete));
        assert_eq!(OperationKind::parse("edit"), Some(OperationKind::Edit));
        assert_eq!(OperationKind::parse("move"), None);
    }

    #[test]
    fn schema_lists_closed_kinds() {
        let schema = EditBatch::json_schema().expect("schema should serialize");
        let rendered = schema.to_string();
        assert!(rendered.contains("\"edits\""));
        assert!(rendered.contains("\"target_path\""));
        for kind in OperationKind::ALL {
            assert!(rendered.contains(kind.as_str()), "missing {kind}");
        }
    }
}
