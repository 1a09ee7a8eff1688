//! Fault plan: one-shot failure injection points

use ferry_core::EntityType;

/// Where an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// `read_all` of this entity type fails
    Read(EntityType),
    /// The `index`-th upsert (zero-based) of `entity` within one transaction fails
    Upsert {
        /// Entity type being written
        entity: EntityType,
        /// Zero-based position among that type's upserts in the transaction
        index: usize,
    },
    /// `commit` fails before anything is applied
    Commit,
}

impl FaultPoint {
    /// Message reported by the failing call
    pub fn message(&self) -> String {
        match self {
            FaultPoint::Read(entity) => format!("injected read failure on {}", entity),
            FaultPoint::Upsert { entity, index } => {
                format!("injected failure on {} upsert #{}", entity, index)
            }
            FaultPoint::Commit => "injected commit failure".to_string(),
        }
    }
}

/// Set of armed fault points
#[derive(Debug, Default, Clone)]
pub struct FaultPlan {
    armed: Vec<FaultPoint>,
}

impl FaultPlan {
    /// Empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fault point
    pub fn arm(&mut self, point: FaultPoint) {
        if !self.armed.contains(&point) {
            self.armed.push(point);
        }
    }

    /// Disarm everything
    pub fn clear(&mut self) {
        self.armed.clear();
    }

    /// Number of armed points
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    /// True when nothing is armed
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Fire `point` if armed; a fired point is disarmed
    pub fn take(&mut self, point: FaultPoint) -> bool {
        match self.armed.iter().position(|p| *p == point) {
            Some(pos) => {
                self.armed.remove(pos);
                true
            }
            None => false,
        }
    }
}
