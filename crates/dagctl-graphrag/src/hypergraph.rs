//! The capability hypergraph. Vertices are tools; hyperedges are
//! capabilities whose `members` are a mix of child tools and child
//! capabilities. The incidence relation is direct membership only: no
//! transitive closure.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{GraphRagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub child_tools: Vec<String>,
    pub child_capabilities: Vec<String>,
    /// `None` until [`Hypergraph::recompute_hierarchy`] runs.
    pub hierarchy_level: Option<u32>,
    pub success_rate: f64,
}

impl Capability {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), child_tools: Vec::new(), child_capabilities: Vec::new(), hierarchy_level: None, success_rate: 1.0 }
    }
}

#[derive(Debug, Default)]
pub struct Hypergraph {
    capabilities: HashMap<String, Capability>,
    dirty: bool,
}

impl Hypergraph {
    pub fn new() -> Self {
        Self { capabilities: HashMap::new(), dirty: true }
    }

    pub fn insert(&mut self, mut capability: Capability) {
        capability.hierarchy_level = None;
        self.capabilities.insert(capability.id.clone(), capability);
        self.dirty = true;
    }

    pub fn get(&self, id: &str) -> Option<&Capability> {
        self.capabilities.get(id)
    }

    pub fn capability_ids(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    pub fn record_outcome(&mut self, id: &str, success: bool) -> Result<()> {
        let cap = self.capabilities.get_mut(id).ok_or_else(|| GraphRagError::UnknownCapability(id.to_string()))?;
        // Exponential moving average so recent outcomes dominate without
        // a full outcome history.
        let alpha = 0.2;
        let observed = if success { 1.0 } else { 0.0 };
        cap.success_rate = (1.0 - alpha) * cap.success_rate + alpha * observed;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Level-0 capabilities contain only tools; level-k contains at
    /// least one capability of level k-1 as a child; mixed children take
    /// `max(child level) + 1`. Recomputed lazily, memoized on each
    /// capability until the graph is dirtied again.
    pub fn recompute_hierarchy(&mut self) -> Result<u32> {
        let ids: Vec<String> = self.capabilities.keys().cloned().collect();
        let mut resolved: HashMap<String, u32> = HashMap::new();
        for id in &ids {
            self.resolve_level(id, &mut resolved, &mut HashSet::new())?;
        }
        let mut max_level = 0;
        for (id, level) in resolved {
            if let Some(cap) = self.capabilities.get_mut(&id) {
                cap.hierarchy_level = Some(level);
            }
            max_level = max_level.max(level);
        }
        self.dirty = false;
        Ok(max_level)
    }

    fn resolve_level(&self, id: &str, resolved: &mut HashMap<String, u32>, visiting: &mut HashSet<String>) -> Result<u32> {
        if let Some(&level) = resolved.get(id) {
            return Ok(level);
        }
        if !visiting.insert(id.to_string()) {
            return Err(GraphRagError::HierarchyCycle(id.to_string()));
        }
        let cap = self.capabilities.get(id).ok_or_else(|| GraphRagError::UnknownCapability(id.to_string()))?;
        let level = if cap.child_capabilities.is_empty() {
            0
        } else {
            let mut max_child = 0u32;
            for child in &cap.child_capabilities {
                max_child = max_child.max(self.resolve_level(child, resolved, visiting)?);
            }
            max_child + 1
        };
        visiting.remove(id);
        resolved.insert(id.to_string(), level);
        Ok(level)
    }

    /// All capabilities directly containing `tool` (direct membership,
    /// no transitive closure).
    pub fn capabilities_for_tool(&self, tool: &str) -> Vec<&Capability> {
        self.capabilities.values().filter(|c| c.child_tools.iter().any(|t| t == tool)).collect()
    }

    pub fn max_hierarchy_level(&self) -> u32 {
        self.capabilities.values().filter_map(|c| c.hierarchy_level).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_max_child_level_plus_one() {
        let mut hg = Hypergraph::new();
        let mut leaf = Capability::new("leaf");
        leaf.child_tools.push("a:op".into());
        hg.insert(leaf);

        let mut parent = Capability::new("parent");
        parent.child_capabilities.push("leaf".into());
        hg.insert(parent);

        hg.recompute_hierarchy().unwrap();
        assert_eq!(hg.get("leaf").unwrap().hierarchy_level, Some(0));
        assert_eq!(hg.get("parent").unwrap().hierarchy_level, Some(1));
    }

    #[test]
    fn cyclic_capability_membership_is_rejected() {
        let mut hg = Hypergraph::new();
        let mut a = Capability::new("a");
        a.child_capabilities.push("b".into());
        hg.insert(a);
        let mut b = Capability::new("b");
        b.child_capabilities.push("a".into());
        hg.insert(b);

        assert!(hg.recompute_hierarchy().is_err());
    }
}
