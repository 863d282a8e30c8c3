use super::handle::Handle;

/// Handles of the currently active catch scopes, innermost last.
///
/// A rethrown exception appears twice: once for the scope that rethrew it and once for the scope
/// that catches it again.
#[derive(Debug, Default)]
pub struct CatchStack {
    handles: Vec<Handle>,
}

impl CatchStack {
    pub const fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    pub fn push(&mut self, handle: Handle) {
        self.handles.push(handle);
    }

    /// Pop the innermost scope, or return [`Handle::NULL`] if there is none.
    pub fn pop(&mut self) -> Handle {
        self.handles.pop().unwrap_or(Handle::NULL)
    }

    /// The innermost scope, or [`Handle::NULL`] if there is none.
    pub fn top(&self) -> Handle {
        self.handles.last().copied().unwrap_or(Handle::NULL)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
