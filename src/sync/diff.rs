use crate::api::{Trade, TradeId};
use std::collections::HashSet;

/// Change in the active trade set between two successive polls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeDiff {
    pub opened: Vec<TradeId>,
    pub closed: Vec<TradeId>,
}

impl TradeDiff {
    /// Ids are reported in the order they appear in their snapshot
    pub fn between(previous: &[Trade], current: &[Trade]) -> Self {
        let before: HashSet<TradeId> = previous.iter().map(|t| t.id).collect();
        let after: HashSet<TradeId> = current.iter().map(|t| t.id).collect();

        Self {
            opened: current
                .iter()
                .map(|t| t.id)
                .filter(|id| !before.contains(id))
                .collect(),
            closed: previous
                .iter()
                .map(|t| t.id)
                .filter(|id| !after.contains(id))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}
