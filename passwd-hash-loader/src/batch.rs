use crate::record::HashRecord;

/// Records collected by one worker run, flushed once `capacity` is reached.
#[derive(Debug)]
pub struct BatchAccumulator {
    records: Vec<HashRecord>,
    capacity: usize,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self { records: Vec::with_capacity(capacity), capacity }
    }

    /// Adds a record. Returns `true` once the batch is full and must be flushed.
    pub fn append(&mut self, record: HashRecord) -> bool {
        self.records.push(record);
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes the current contents, leaving an empty batch behind.
    pub fn drain_all(&mut self) -> Vec<HashRecord> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.capacity))
    }
}
