//! Per-cycle exit accounting (§4.6.4).

use mqk_schemas::ExitReasonCategory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitCounters {
    pub stop_loss: u32,
    pub rotation: u32,
    pub normal: u32,
}

impl ExitCounters {
    pub fn record(&mut self, reason: &str) {
        match ExitReasonCategory::classify(reason) {
            ExitReasonCategory::StopLoss => self.stop_loss += 1,
            ExitReasonCategory::Rotation => self.rotation += 1,
            ExitReasonCategory::Normal => self.normal += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.stop_loss + self.rotation + self.normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_and_tallies_each_category() {
        let mut counters = ExitCounters::default();
        counters.record("stop loss reached (90.0 <= 95.0)");
        counters.record("rotation replace: ETH-USD (score=0.3) -> SOL-USD (score=0.9)");
        counters.record("target reached (110.0 >= 105.0)");
        assert_eq!(counters.stop_loss, 1);
        assert_eq!(counters.rotation, 1);
        assert_eq!(counters.normal, 1);
        assert_eq!(counters.total(), 3);
    }
}
