use serde::{Deserialize, Serialize};

/// Hardware family the optimizer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    /// Multi-slot filament magazine; one slot may be shared by several
    /// colors through manual swaps.
    Magazine,
    /// Independent tool heads; each unit holds exactly one filament.
    Toolhead,
}

/// Captured hardware description used by the optimizer and the constraint
/// validator. The default is a single four-slot magazine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    pub kind: SystemKind,
    pub unit_count: u32,
    pub slots_per_unit: u32,
}

impl SystemConfiguration {
    pub fn magazine(unit_count: u32, slots_per_unit: u32) -> Self {
        Self {
            kind: SystemKind::Magazine,
            unit_count,
            slots_per_unit,
        }
    }

    pub fn toolhead(unit_count: u32) -> Self {
        Self {
            kind: SystemKind::Toolhead,
            unit_count,
            slots_per_unit: 1,
        }
    }

    pub fn total_slots(&self) -> u32 {
        match self.kind {
            SystemKind::Magazine => self.unit_count * self.slots_per_unit,
            SystemKind::Toolhead => self.unit_count,
        }
    }

    /// Map a flat slot index onto `(unit, slot-within-unit)`.
    pub fn locate(&self, flat: u32) -> (u32, u32) {
        match self.kind {
            SystemKind::Magazine => (flat / self.slots_per_unit, flat % self.slots_per_unit),
            SystemKind::Toolhead => (flat, 0),
        }
    }
}

impl Default for SystemConfiguration {
    fn default() -> Self {
        Self::magazine(1, 4)
    }
}
