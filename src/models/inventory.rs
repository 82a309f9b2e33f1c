use serde::{Deserialize, Serialize};

/// Inventory returned by the inventory collaborator for one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default, alias = "esxi_key")]
    pub region: String,
    #[serde(default)]
    pub vms: Vec<VmRecord>,
}

/// A discovered virtual machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub name: String,
    #[serde(default)]
    pub nics: Vec<NicRecord>,
}

/// A NIC attached to a discovered VM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicRecord {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_name: Option<String>,
}

impl NicRecord {
    /// First address without a colon, falling back to the first address
    pub fn primary_ip(&self) -> Option<&str> {
        self.ips
            .iter()
            .find(|ip| !ip.contains(':'))
            .or_else(|| self.ips.first())
            .map(String::as_str)
    }

    /// Every address except the primary one
    pub fn extra_ips(&self) -> Vec<&str> {
        let primary = self.primary_ip();
        self.ips
            .iter()
            .map(String::as_str)
            .filter(|ip| Some(*ip) != primary)
            .collect()
    }
}

impl VmRecord {
    pub fn has_nics(&self) -> bool {
        !self.nics.is_empty()
    }

    /// First IPv4-looking primary address across the VM's NICs
    pub fn primary_ip(&self) -> Option<&str> {
        self.nics
            .iter()
            .filter_map(NicRecord::primary_ip)
            .find(|ip| !ip.contains(':'))
    }
}

/// A VM eligible for assignment to a topology node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    /// Primary IPv4 address, empty when none is known
    #[serde(default)]
    pub primary_ip: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, primary_ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_ip: primary_ip.into(),
        }
    }
}

impl Inventory {
    /// VMs with at least one NIC, in inventory order, enriched with their primary IP
    pub fn candidates(&self) -> Vec<Candidate> {
        self.vms
            .iter()
            .filter(|vm| vm.has_nics())
            .map(|vm| Candidate::new(vm.name.clone(), vm.primary_ip().unwrap_or_default()))
            .collect()
    }

    /// Sort VMs NIC-bearing first, then by name
    pub fn sort_for_display(&mut self) {
        self.vms.sort_by(|a, b| {
            b.has_nics()
                .cmp(&a.has_nics())
                .then_with(|| a.name.cmp(&b.name))
        });
    }
}

/// NIC view with the primary/extra address split precomputed
#[derive(Debug, Clone, Serialize)]
pub struct NicView {
    #[serde(flatten)]
    pub nic: NicRecord,
    pub primary_ip: Option<String>,
    pub extra_ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VmView {
    pub name: String,
    pub nics: Vec<NicView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryView {
    pub region: String,
    pub vms: Vec<VmView>,
}

impl From<Inventory> for InventoryView {
    fn from(mut inventory: Inventory) -> Self {
        inventory.sort_for_display();
        let vms = inventory
            .vms
            .into_iter()
            .map(|vm| VmView {
                name: vm.name,
                nics: vm
                    .nics
                    .into_iter()
                    .map(|nic| NicView {
                        primary_ip: nic.primary_ip().map(str::to_string),
                        extra_ips: nic.extra_ips().into_iter().map(str::to_string).collect(),
                        nic,
                    })
                    .collect(),
            })
            .collect();
        Self {
            region: inventory.region,
            vms,
        }
    }
}

/// An inventory server known to the collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRecord {
    pub key: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub in_db: bool,
}
