/// Result window that grows one chunk at a time on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    chunk: usize,
    limit: usize,
}

impl Pagination {
    pub fn new(chunk: usize) -> Self {
        let chunk = chunk.max(1);
        Self { chunk, limit: chunk }
    }

    pub fn chunk(&self) -> usize { self.chunk }
    pub fn limit(&self) -> usize { self.limit }

    /// Back to one chunk; called when a dataset load begins.
    pub fn reset(&mut self) { self.limit = self.chunk; }

    pub fn increase(&mut self) { self.limit = self.limit.saturating_add(self.chunk); }
}
