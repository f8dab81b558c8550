/// Identifier of a flow, unique within one clustering run.
pub type FlowId = u64;

/// A single parsed network flow.
///
/// The record is immutable once created; clusters take ownership of their members
/// and hand them over on merge.
///
/// # Fields
///
/// * `id` - Caller-supplied identifier, unique across the input.
/// * `total_bytes` - Bytes transferred over the lifetime of the flow.
/// * `duration` - Flow duration.
/// * `avg_inter_time` - Average packet inter-arrival time.
/// * `avg_inter_length` - Average packet length, `total_bytes / packet_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    id: FlowId,
    total_bytes: u64,
    duration: u64,
    avg_inter_time: f64,
    avg_inter_length: f64,
}

impl FlowRecord {
    /// Creates a flow from already derived features.
    pub fn new(
        id: FlowId,
        total_bytes: u64,
        duration: u64,
        avg_inter_time: f64,
        avg_inter_length: f64,
    ) -> FlowRecord {
        FlowRecord {
            id,
            total_bytes,
            duration,
            avg_inter_time,
            avg_inter_length,
        }
    }

    /// Creates a flow from raw counters, deriving the average packet length.
    ///
    /// Returns `None` when `packet_count` is zero, as the average length is undefined then.
    pub fn from_counters(
        id: FlowId,
        total_bytes: u64,
        duration: u64,
        packet_count: u64,
        avg_inter_time: f64,
    ) -> Option<FlowRecord> {
        if packet_count == 0 {
            return None;
        }
        let avg_inter_length = total_bytes as f64 / packet_count as f64;
        Some(FlowRecord::new(
            id,
            total_bytes,
            duration,
            avg_inter_time,
            avg_inter_length,
        ))
    }

    pub fn id(&self) -> FlowId {
        self.id
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn avg_inter_time(&self) -> f64 {
        self.avg_inter_time
    }

    pub fn avg_inter_length(&self) -> f64 {
        self.avg_inter_length
    }
}
