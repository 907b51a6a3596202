//! Subsheets: child sheets read separately and joined into their parent

use super::data_sheet::DataSheet;
use crate::expression::RelationPath;
use crate::meta_model::Relation;

/// A sheet on a related object living in another data source
///
/// It is read after its parent, filtered by the parent's key values, and
/// left-joined back where `parent_key_column` equals `child_key_column`.
#[derive(Debug, Clone)]
pub struct Subsheet {
    pub sheet: DataSheet,
    /// Relation hops from the parent's object to the subsheet's object
    pub relation_path: RelationPath,
    /// The hop crossing the data source boundary
    pub relation: Relation,
    /// Parent column holding the join key
    pub parent_key_column: String,
    /// Subsheet column holding the join key
    pub child_key_column: String,
}

impl Subsheet {
    /// One-to-many subsheets are read grouped by their key column
    pub fn is_reverse(&self) -> bool {
        self.relation.is_reverse()
    }

    pub fn object(&self) -> &str {
        self.sheet.object()
    }
}
