//! Service instance descriptors
use serde::{Deserialize, Serialize};

/// Liveness status reported by an instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
}

/// Descriptor for a single backend instance, as exchanged with the registry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    pub status: InstanceStatus,
}

impl ServiceInstance {
    /// Address string suitable for building upstream URLs
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
