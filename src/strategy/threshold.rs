use crate::config::StrategyConfig;

/// Highest price observed since the trailing stop activated.
/// Zero means "not activated yet".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdState {
    pub highest_price_seen: f64,
}

/// Computes the effective trigger price.
///
/// With dynamic mode off this is just `initial_threshold`. With dynamic mode
/// on, once price clears `initial_threshold + trail_gap` the trigger trails
/// the best price seen by exactly `trail_gap`, never dropping below
/// `initial_threshold`.
///
/// Prices must be finite and non-negative; callers validate them.
#[derive(Debug, Clone)]
pub struct ThresholdTracker {
    initial_threshold: f64,
    trail_gap: f64,
    dynamic_enabled: bool,
    state: ThresholdState,
}

impl ThresholdTracker {
    pub fn new(initial_threshold: f64, trail_gap: f64, dynamic_enabled: bool) -> Self {
        Self {
            initial_threshold,
            trail_gap,
            dynamic_enabled,
            state: ThresholdState::default(),
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            config.initial_threshold,
            config.threshold_trail_gap,
            config.dynamic_enabled,
        )
    }

    /// Feed the latest price and get the threshold to compare it against
    pub fn update(&mut self, current_price: f64) -> f64 {
        if !self.dynamic_enabled {
            return self.initial_threshold;
        }

        let activation = self.initial_threshold + self.trail_gap;
        if current_price <= activation {
            return self.initial_threshold;
        }

        let highest = self.state.highest_price_seen;
        if highest == 0.0 || current_price > highest + self.trail_gap {
            self.state.highest_price_seen = current_price;
            tracing::debug!(
                highest = current_price,
                threshold = current_price - self.trail_gap,
                "New high, raising trailing threshold"
            );
            return current_price - self.trail_gap;
        }

        if highest > activation {
            (highest - self.trail_gap).max(self.initial_threshold)
        } else {
            self.initial_threshold
        }
    }

    pub fn state(&self) -> ThresholdState {
        self.state
    }

    pub fn initial_threshold(&self) -> f64 {
        self.initial_threshold
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic_enabled
    }
}
