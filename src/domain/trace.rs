use crate::api::trace_dto::TraceEntryDto;
use crate::domain::operation::Operation;

/// Wall-clock placement of a call in the original recording, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedTiming {
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl ObservedTiming {
    pub fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }
}

/// One parsed row of a recorded trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// Timestamp or sequence number of the observation.
    pub order: u64,
    pub operation: Operation,

    /// Explicit prerequisite positions. `Some(vec![])` explicitly marks a root.
    pub depends_on: Option<Vec<usize>>,
    pub package_id: Option<String>,
    pub observed: Option<ObservedTiming>,
}

impl TraceEntry {
    pub fn new(order: u64, kind: impl Into<String>, address: impl Into<String>) -> Self {
        TraceEntry { order, operation: Operation::new(kind, address), depends_on: None, package_id: None, observed: None }
    }

    pub fn with_dependencies(mut self, depends_on: Vec<usize>) -> Self {
        self.depends_on = Some(depends_on);
        self
    }

    pub fn with_package_id(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = Some(package_id.into());
        self
    }

    pub fn with_timing(mut self, start_ms: u64, duration_ms: u64) -> Self {
        self.observed = Some(ObservedTiming { start_ms, duration_ms });
        self
    }
}

impl From<TraceEntryDto> for TraceEntry {
    fn from(dto: TraceEntryDto) -> Self {
        let observed = dto.start_ms.map(|start_ms| ObservedTiming { start_ms, duration_ms: dto.duration_ms.unwrap_or(0) });

        TraceEntry {
            order: dto.order,
            operation: Operation::new(dto.kind, dto.address),
            depends_on: dto.depends_on,
            package_id: dto.package_id,
            observed,
        }
    }
}
