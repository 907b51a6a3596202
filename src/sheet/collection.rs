//! Ordered, uniquely named set of columns

use super::column::Column;
use crate::expression::{Expression, RelationPath};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnCollection {
    columns: Vec<Column>,
}

impl ColumnCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// First column bound to exactly this expression
    pub fn find_by_expression(&self, expression: &Expression) -> Option<&Column> {
        self.columns.iter().find(|c| c.expression() == expression)
    }

    /// Add a column unless one with the same name exists.
    /// Returns true if the column was created.
    pub fn add(&mut self, column: Column) -> bool {
        if self.contains(column.name()) {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// The column with the incoming column's name, adding it if absent
    pub fn entry(&mut self, column: Column) -> &mut Column {
        let position = match self.position(column.name()) {
            Some(position) => position,
            None => {
                self.columns.push(column);
                self.columns.len() - 1
            }
        };
        &mut self.columns[position]
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let position = self.position(name)?;
        Some(self.columns.remove(position))
    }

    /// Rename a column in place. Returns false if `old` does not exist or
    /// `new` is taken by another column.
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> bool {
        if old != new && self.contains(new) {
            return false;
        }
        match self.get_mut(old) {
            Some(column) => {
                column.set_name(new);
                true
            }
            None => false,
        }
    }

    /// Import the columns of another collection under a relation prefix.
    ///
    /// Each imported column is matched by rebased expression against the
    /// existing columns; unmatched ones are added as hidden copies. Returns
    /// `(source name, target name)` pairs in the order of `other`.
    pub fn import_prefixed(&mut self, other: &ColumnCollection, prefix: &RelationPath) -> Vec<(String, String)> {
        let mut mapping = Vec::with_capacity(other.len());
        for column in other.iter() {
            let rebased = column.rebase(prefix);
            let target = match self.find_by_expression(rebased.expression()) {
                Some(existing) => existing.name().to_string(),
                None => {
                    let name = self.free_name(rebased.name());
                    let mut imported = rebased.hidden();
                    imported.set_name(name.clone());
                    self.add(imported);
                    name
                }
            };
            mapping.push((column.name().to_string(), target));
        }
        mapping
    }

    /// `base`, or `base_2`, `base_3`... if taken
    pub fn free_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|i| format!("{}_{}", base, i))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| base.to_string())
    }
}

impl<'a> IntoIterator for &'a ColumnCollection {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(expr: &str) -> Column {
        Column::from_expression(Expression::parse(expr).unwrap())
    }

    #[test]
    fn test_add_is_noop_for_existing_name() {
        let mut columns = ColumnCollection::new();
        assert!(columns.add(column("NAME")));
        assert!(!columns.add(column("NAME").hidden()));
        assert_eq!(columns.len(), 1);
        assert!(!columns.get("NAME").unwrap().is_hidden());
    }

    #[test]
    fn test_rename_refuses_taken_names() {
        let mut columns = ColumnCollection::new();
        columns.add(column("NAME"));
        columns.add(column("CODE"));
        assert!(!columns.rename("NAME", "CODE"));
        assert!(columns.rename("NAME", "LABEL"));
        assert_eq!(columns.names(), vec!["LABEL", "CODE"]);
    }

    #[test]
    fn test_import_prefixed_matches_existing() {
        let mut parent = ColumnCollection::new();
        parent.add(column("UID"));
        parent.add(column("CUSTOMER__NAME"));

        let mut child = ColumnCollection::new();
        child.add(column("NAME"));
        child.add(column("UID"));

        let mapping = parent.import_prefixed(&child, &RelationPath::single("CUSTOMER"));
        assert_eq!(
            mapping,
            vec![
                ("NAME".to_string(), "CUSTOMER__NAME".to_string()),
                ("UID".to_string(), "CUSTOMER__UID".to_string())
            ]
        );
        assert!(parent.get("CUSTOMER__UID").unwrap().is_hidden());
        assert_eq!(parent.len(), 3);
    }
}
