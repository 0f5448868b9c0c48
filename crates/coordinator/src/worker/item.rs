//! Work items placed on the coordinator queues

/// One pending API call for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItem<A> {
    pub argument: A,
    /// 1-based attempt number
    pub attempt: u32,
}

impl<A> FetchItem<A> {
    /// First attempt for a freshly seeded request
    pub fn initial(argument: A) -> Self {
        Self {
            argument,
            attempt: 1,
        }
    }

    /// The same request, one attempt later
    pub fn retry(self) -> Self {
        Self {
            argument: self.argument,
            attempt: self.attempt + 1,
        }
    }
}

/// A successful response waiting to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteItem<A, R> {
    pub argument: A,
    pub response: R,
}

/// Unit of work picked by a worker
#[derive(Debug)]
pub enum WorkItem<A, R> {
    Fetch(FetchItem<A>),
    Write(WriteItem<A, R>),
}
