//! Open views of an instance (lifecycle only, nothing is drawn).

use crate::error::{Error, Result};
use crate::types::ViewHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Tree,
    Text,
    Image,
    List,
    Toolbar,
}

impl ViewKind {
    /// Kinds limited to one open view per instance.
    pub fn is_unique(self) -> bool {
        matches!(self, ViewKind::Tree)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub handle: ViewHandle,
    pub kind: ViewKind,
    pub id: String,
    /// Bumped on every refresh.
    pub revision: u64,
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: Vec<View>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a view. Re-opening a unique kind returns the existing handle.
    pub fn open(&mut self, kind: ViewKind, id: &str) -> ViewHandle {
        if kind.is_unique() {
            if let Some(existing) = self.views.iter().find(|v| v.kind == kind) {
                return existing.handle;
            }
        }
        let handle = ViewHandle::allocate();
        self.views.push(View {
            handle,
            kind,
            id: id.to_owned(),
            revision: 0,
        });
        tracing::debug!(view = %handle, ?kind, id, "view opened");
        handle
    }

    pub fn close(&mut self, handle: ViewHandle) -> Result<View> {
        let pos = self
            .views
            .iter()
            .position(|v| v.handle == handle)
            .ok_or(Error::InvalidHandle)?;
        let view = self.views.remove(pos);
        tracing::debug!(view = %handle, kind = ?view.kind, "view closed");
        Ok(view)
    }

    pub fn refresh(&mut self) {
        for view in &mut self.views {
            view.revision += 1;
        }
    }

    pub fn get(&self, handle: ViewHandle) -> Option<&View> {
        self.views.iter().find(|v| v.handle == handle)
    }

    pub fn list(&self) -> Vec<View> {
        self.views.clone()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Close everything, returning the handles that were open.
    pub fn drain(&mut self) -> Vec<ViewHandle> {
        self.views.drain(..).map(|v| v.handle).collect()
    }
}
