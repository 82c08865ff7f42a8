//! Change detection between two desired states

use std::collections::BTreeSet;
use std::fmt;

/// Desired state of one resource instance
pub trait Desired: Clone + Send + Sync + 'static {
    /// Field identifiers used for change detection
    type Field: Copy + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Human-readable unique name, when the caller chose one
    fn label(&self) -> Option<&str>;

    /// Fields whose value differs from `prior`
    fn changed_fields(&self, prior: &Self) -> ChangeSet<Self::Field>;

    /// Fields the remote system cannot modify in place
    fn requires_replacement(_field: Self::Field) -> bool {
        false
    }

    /// Field holding the evolvable table schema, if the type has one
    fn schema_field() -> Option<Self::Field> {
        None
    }
}

/// Set of fields that changed since the last read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<F> {
    fields: BTreeSet<F>,
}

impl<F: Copy + Ord> Default for ChangeSet<F> {
    fn default() -> Self {
        Self {
            fields: BTreeSet::new(),
        }
    }
}

impl<F: Copy + Ord> ChangeSet<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field` when `current` differs from `prior`
    pub fn track<T: PartialEq + ?Sized>(mut self, field: F, current: &T, prior: &T) -> Self {
        if current != prior {
            self.fields.insert(field);
        }
        self
    }

    pub fn insert(&mut self, field: F) {
        self.fields.insert(field);
    }

    pub fn has_changed(&self, field: F) -> bool {
        self.fields.contains(&field)
    }

    pub fn has_any(&self, fields: &[F]) -> bool {
        fields.iter().any(|f| self.fields.contains(f))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        self.fields.iter().copied()
    }

    /// Copy without `field`
    pub fn without(&self, field: F) -> Self {
        let mut fields = self.fields.clone();
        fields.remove(&field);
        Self { fields }
    }
}

impl<F: Copy + Ord> FromIterator<F> for ChangeSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<F: Copy + Ord + fmt::Display> fmt::Display for ChangeSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.fields.iter().map(|field| field.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}
