//! Relations between meta objects

/// Direction of a relation as seen from its left object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Many-to-one: the left object holds the foreign key
    Forward,
    /// One-to-many: the right object holds the foreign key
    Reverse,
}

/// A resolved relation hop from `left_object` to `right_object`
///
/// Rows match when `left.left_attribute == right.right_attribute`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub alias: String,
    pub kind: RelationKind,
    pub left_object: String,
    pub left_attribute: String,
    pub right_object: String,
    pub right_attribute: String,
    /// Right rows depend on the left row and go with it on delete.
    /// Only ever set on reverse relations.
    pub cascade_delete: bool,
}

impl Relation {
    pub fn is_forward(&self) -> bool {
        self.kind == RelationKind::Forward
    }

    pub fn is_reverse(&self) -> bool {
        self.kind == RelationKind::Reverse
    }
}
