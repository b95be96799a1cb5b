/// Capacity-bounded item containers for the simulated inventories
use serde::{Deserialize, Serialize};

use super::route::ContainerId;
use crate::config::InventoryConfig;
use crate::errors::{HarnessError, HarnessResult};

// ============================================================================
// Types
// ============================================================================

/// Largest quantity one stack can hold.
pub const MAX_STACK: u64 = i64::MAX as u64;

/// A quantity of one item id held in a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: String,
    pub quantity: u64,
}

/// What a mutation did. Failures come back as [HarnessError] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Units added; `stacked` is true when the id was already present.
    Added { quantity: u64, stacked: bool },
    /// Units taken out; `emptied` is true when the key was deleted.
    Removed { quantity: u64, emptied: bool },
    /// Non-positive quantity; nothing happened.
    Unchanged,
}

/// One simulated inventory.
///
/// Capacity limits the number of distinct item ids, not the number of units.
/// Stacks keep the order in which their ids were first added and never hold
/// more than [MAX_STACK] units, so every quantity fits the signed type the
/// market side works in.
#[derive(Debug, Clone)]
pub struct Container {
    id: ContainerId,
    capacity: usize,
    stacks: Vec<ItemStack>,
}

impl Container {
    pub fn new(id: ContainerId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            stacks: Vec::new(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.stacks.len())
    }

    /// Add `quantity` units of `item_id`.
    ///
    /// Existing ids always grow, up to [MAX_STACK]; the reported quantity is
    /// what was actually added. A new id needs a free slot; when there is
    /// none the add is dropped whole and a capacity error is returned.
    pub fn add(&mut self, item_id: &str, quantity: i64) -> HarnessResult<StoreOutcome> {
        if quantity <= 0 {
            return Ok(StoreOutcome::Unchanged);
        }
        let quantity = quantity as u64;

        if let Some(stack) = self.stacks.iter_mut().find(|s| s.item_id == item_id) {
            let added = quantity.min(MAX_STACK - stack.quantity);
            if added == 0 {
                return Ok(StoreOutcome::Unchanged);
            }
            stack.quantity += added;
            return Ok(StoreOutcome::Added {
                quantity: added,
                stacked: true,
            });
        }

        if self.stacks.len() >= self.capacity {
            return Err(HarnessError::Capacity {
                container: self.id.to_string(),
                capacity: self.capacity,
            });
        }

        self.stacks.push(ItemStack {
            item_id: item_id.to_string(),
            quantity,
        });
        Ok(StoreOutcome::Added {
            quantity,
            stacked: false,
        })
    }

    /// Remove `quantity` units of `item_id`; `0` means the whole stack.
    ///
    /// Taking as many units as are stored, or more, deletes the key.
    pub fn remove(&mut self, item_id: &str, quantity: i64) -> HarnessResult<StoreOutcome> {
        if quantity < 0 {
            return Ok(StoreOutcome::Unchanged);
        }

        let index = self
            .stacks
            .iter()
            .position(|s| s.item_id == item_id)
            .ok_or_else(|| HarnessError::NotFound(format!("no {} in {}", item_id, self.id)))?;

        let stored = self.stacks[index].quantity;
        let quantity = quantity as u64;
        if quantity == 0 || stored <= quantity {
            self.stacks.remove(index);
            Ok(StoreOutcome::Removed {
                quantity: stored,
                emptied: true,
            })
        } else {
            self.stacks[index].quantity = stored - quantity;
            Ok(StoreOutcome::Removed {
                quantity,
                emptied: false,
            })
        }
    }

    pub fn query(&self, item_id: &str) -> Option<u64> {
        self.stacks
            .iter()
            .find(|s| s.item_id == item_id)
            .map(|s| s.quantity)
    }

    /// Current contents in insertion order. Each call starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.stacks.iter().map(|s| (s.item_id.as_str(), s.quantity))
    }

}

/// The seven containers, created empty once and kept for the whole session.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    containers: [Container; 7],
}

impl ContainerStore {
    pub fn new(self_capacity: usize, neighbor_capacity: usize) -> Self {
        let containers = ContainerId::ALL.map(|id| {
            let capacity = if id == ContainerId::Local {
                self_capacity
            } else {
                neighbor_capacity
            };
            Container::new(id, capacity)
        });
        Self { containers }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(config.self_capacity, config.neighbor_capacity)
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.index()]
    }

    pub fn container_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.containers[id.index()]
    }

    pub fn free_slots(&self, id: ContainerId) -> usize {
        self.container(id).free_slots()
    }

    pub fn add(&mut self, id: ContainerId, item_id: &str, quantity: i64) -> HarnessResult<StoreOutcome> {
        self.container_mut(id).add(item_id, quantity)
    }

    pub fn remove(&mut self, id: ContainerId, item_id: &str, quantity: i64) -> HarnessResult<StoreOutcome> {
        self.container_mut(id).remove(item_id, quantity)
    }

    pub fn query(&self, id: ContainerId, item_id: &str) -> Option<u64> {
        self.container(id).query(item_id)
    }

    pub fn enumerate(&self, id: ContainerId) -> Vec<(String, u64)> {
        self.container(id)
            .iter()
            .map(|(item, qty)| (item.to_string(), qty))
            .collect()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
