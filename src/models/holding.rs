use serde::{Deserialize, Serialize};

/// A stock held in the portfolio watch list. Unlike a Trade it has no
/// lifecycle, only a static classification of whether the acquisition cost
/// sits inside the stop-loss / target band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub id: i64,
    pub stock_name: String,
    /// Acquisition date, "%Y-%m-%d".
    pub date: String,
    pub stop_loss: f64,
    pub target: f64,
    pub actual_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHoldingInput {
    pub stock_name: String,
    pub date: String,
    pub stop_loss: f64,
    pub target: f64,
    pub actual_cost: f64,
}

impl Holding {
    /// True when the acquisition cost lies within the stop-loss / target band.
    /// The band is taken as [low, high] regardless of which side stop-loss
    /// was entered on.
    pub fn cost_in_band(&self) -> bool {
        let low = self.stop_loss.min(self.target);
        let high = self.stop_loss.max(self.target);
        self.actual_cost >= low && self.actual_cost <= high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(stop_loss: f64, target: f64, cost: f64) -> Holding {
        Holding {
            id: 1,
            stock_name: "TCS".to_string(),
            date: "2025-04-01".to_string(),
            stop_loss,
            target,
            actual_cost: cost,
        }
    }

    #[test]
    fn test_cost_inside_band() {
        assert!(holding(90.0, 120.0, 100.0).cost_in_band());
        assert!(holding(90.0, 120.0, 90.0).cost_in_band());
        assert!(holding(90.0, 120.0, 120.0).cost_in_band());
    }

    #[test]
    fn test_cost_outside_band() {
        assert!(!holding(90.0, 120.0, 89.99).cost_in_band());
        assert!(!holding(90.0, 120.0, 121.0).cost_in_band());
    }

    #[test]
    fn test_band_order_does_not_matter() {
        // Supply-style entry where stop-loss sits above target.
        assert!(holding(55.0, 40.0, 50.0).cost_in_band());
        assert!(!holding(55.0, 40.0, 60.0).cost_in_band());
    }
}
