//! Pointer travel between clicks.
//!
//! Relative motion is summed into a distance that is reported with the next
//! button release and then cleared. Wheel motion is reported by direction
//! only. Absolute pointer coordinates are never reported.

use crate::collector::types::PointerSample;
use crate::core::metrics::{Metric, MouseRecord};
use crate::platform::ModifierKeyQuery;

/// Distances above this are treated as corrupt device data.
pub const DISTANCE_CEILING: f64 = 65535.0;

/// Accumulated pointer state between reportable events.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Position integrated from relative deltas; `None` until the first sample
    pub last_position: Option<(i64, i64)>,
    pub accumulated_distance: f64,
}

#[derive(Debug, Default)]
pub struct PointerMotionAggregator {
    state: PointerState,
}

impl PointerMotionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    /// Process one pointer sample, returning the records it completes.
    ///
    /// Injected samples are ignored.
    pub fn process(
        &mut self,
        sample: &PointerSample,
        modifiers: &dyn ModifierKeyQuery,
    ) -> Vec<Metric> {
        if sample.device_is_synthetic {
            return Vec::new();
        }

        self.accumulate(sample);

        let mut records = Vec::new();
        for (released, button) in [(sample.left_released(), 1), (sample.right_released(), 2)] {
            if released {
                let distance = self.state.accumulated_distance.round() as u32;
                self.state.accumulated_distance = 0.0;
                records.push(Metric::Mouse(MouseRecord {
                    button: Some(button),
                    wheel: None,
                    distance: Some(distance),
                    modifier_keys: modifiers.held_modifiers().non_empty(),
                }));
            }
        }

        if let Some(direction) = sample.wheel_direction() {
            records.push(Metric::Mouse(MouseRecord {
                button: None,
                wheel: Some(direction),
                distance: None,
                modifier_keys: modifiers.held_modifiers().non_empty(),
            }));
        }

        records
    }

    fn accumulate(&mut self, sample: &PointerSample) {
        let dx = i64::from(sample.delta_x);
        let dy = i64::from(sample.delta_y);

        let Some((x, y)) = self.state.last_position else {
            self.state.last_position = Some((dx, dy));
            return;
        };
        self.state.last_position = Some((x.saturating_add(dx), y.saturating_add(dy)));

        if (dx.abs() + dy.abs()) as f64 > DISTANCE_CEILING {
            tracing::debug!(dx, dy, "discarding implausible pointer delta");
            self.state.accumulated_distance = 0.0;
            return;
        }

        self.state.accumulated_distance += (dx as f64).hypot(dy as f64);
        if self.state.accumulated_distance > DISTANCE_CEILING {
            tracing::debug!("pointer distance exceeded ceiling; resetting");
            self.state.accumulated_distance = 0.0;
        }
    }
}
