//! Trailing stop state machines for buys (follow the price down, fire on a
//! rebound) and sells (follow the price up, fire on a pullback).

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopEvent {
    Idle,
    Trailed { stop_price: f64 },
    Triggered { stop_price: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StopState {
    Inactive,
    Active { stop_price: f64, armed_on: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingStop {
    side: StopSide,
    distance: f64,
    state: StopState,
}

impl TrailingStop {
    pub fn new(side: StopSide, distance: f64) -> Self {
        Self {
            side,
            distance,
            state: StopState::Inactive,
        }
    }

    fn stop_for(&self, price: f64) -> f64 {
        match self.side {
            StopSide::Buy => price * (1.0 + self.distance),
            StopSide::Sell => price * (1.0 - self.distance),
        }
    }

    pub fn activate(&mut self, price: f64, date: NaiveDate) -> f64 {
        let stop_price = self.stop_for(price);
        self.state = StopState::Active {
            stop_price,
            armed_on: date,
        };
        stop_price
    }

    pub fn cancel(&mut self) {
        self.state = StopState::Inactive;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, StopState::Active { .. })
    }

    pub fn stop_price(&self) -> Option<f64> {
        match self.state {
            StopState::Active { stop_price, .. } => Some(stop_price),
            StopState::Inactive => None,
        }
    }

    pub fn armed_on(&self) -> Option<NaiveDate> {
        match self.state {
            StopState::Active { armed_on, .. } => Some(armed_on),
            StopState::Inactive => None,
        }
    }

    /// Feed the day's price. The stop only ever moves in the favourable
    /// direction; triggering leaves it active so the caller decides whether
    /// the fill happened.
    pub fn update(&mut self, price: f64) -> StopEvent {
        let StopState::Active {
            stop_price,
            armed_on,
        } = self.state
        else {
            return StopEvent::Idle;
        };

        let candidate = self.stop_for(price);
        match self.side {
            StopSide::Buy => {
                if price >= stop_price {
                    StopEvent::Triggered { stop_price }
                } else if candidate < stop_price {
                    self.state = StopState::Active {
                        stop_price: candidate,
                        armed_on,
                    };
                    StopEvent::Trailed {
                        stop_price: candidate,
                    }
                } else {
                    StopEvent::Idle
                }
            }
            StopSide::Sell => {
                if price <= stop_price {
                    StopEvent::Triggered { stop_price }
                } else if candidate > stop_price {
                    self.state = StopState::Active {
                        stop_price: candidate,
                        armed_on,
                    };
                    StopEvent::Trailed {
                        stop_price: candidate,
                    }
                } else {
                    StopEvent::Idle
                }
            }
        }
    }
}
