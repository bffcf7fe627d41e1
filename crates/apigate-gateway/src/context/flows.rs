use apigate_core::error::{ApiGateError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Flow started through the gateway, as reported by the dispatch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub flow_name: String,
    pub creator: String,
    pub robot_id: Option<String>,
}

/// Registry of started flows:
/// - `(client_id, flow_id) -> FlowRecord`
///
/// Robot routers with a `robot_id` only let callers read back flows tagged
/// with the same id.
#[derive(Default)]
pub struct FlowLedger {
    flows: DashMap<(String, String), FlowRecord>,
}

impl FlowLedger {
    pub fn new() -> Self {
        Self {
            flows: DashMap::new(),
        }
    }

    /// Record a started flow. A flow id is bound once: repeating the same
    /// registration is a no-op, anything else is refused.
    pub fn register(&self, client_id: &str, flow_id: &str, record: FlowRecord) -> Result<()> {
        match self.flows.entry((client_id.to_string(), flow_id.to_string())) {
            Entry::Occupied(existing) => {
                let current = existing.get();
                if current.robot_id == record.robot_id && current.flow_name == record.flow_name {
                    return Ok(());
                }
                tracing::warn!(
                    client = client_id,
                    flow = flow_id,
                    owner = ?current.robot_id,
                    claimant = ?record.robot_id,
                    "flow re-registration refused"
                );
                Err(ApiGateError::NotAllowed(format!(
                    "flow {client_id}/{flow_id} is already registered"
                )))
            }
            Entry::Vacant(slot) => {
                tracing::debug!(
                    client = client_id,
                    flow = flow_id,
                    flow_name = %record.flow_name,
                    "flow registered"
                );
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn get(&self, client_id: &str, flow_id: &str) -> Option<FlowRecord> {
        self.flows
            .get(&(client_id.to_string(), flow_id.to_string()))
            .map(|r| r.value().clone())
    }

    /// Whether the flow exists and carries `robot_id`.
    pub fn is_owned_by(&self, client_id: &str, flow_id: &str, robot_id: &str) -> bool {
        self.get(client_id, flow_id)
            .is_some_and(|r| r.robot_id.as_deref() == Some(robot_id))
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
