//! A plain named entity for pages whose subject is not a stored row.

use crate::web::Entity;

/// An id, a display name, and an optional parent for breadcrumbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    id: String,
    name: String,
    parent: Option<Box<Object>>,
}

impl Object {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
        }
    }

    /// Same id and name, used for senders.
    pub fn named(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id)
    }

    pub fn with_parent(mut self, parent: Object) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}

impl Entity for Object {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&dyn Entity> {
        self.parent.as_deref().map(|p| p as &dyn Entity)
    }
}
