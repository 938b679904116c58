//! Two-phase connector geometry
//!
//! Phase one derives every connector from data alone. Phase two, run once
//! the view has painted, lets the host report measured card boxes; each
//! connector then ends at the measured centre of its card.

use crate::layout::{Point, SerpentineLayout};
use crate::position::{card_position, Connector, PositionOverrides};

/// A card's rendered bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredCard {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl MeasuredCard {
    /// Centre of the box
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Measures rendered cards; implemented by the UI host
pub trait GeometryProbe {
    /// Bounding box of the card for `node_index`, if it is on screen
    fn measure(&self, node_index: usize) -> Option<MeasuredCard>;
}

/// Phase one: connectors for every data node from computed positions
#[must_use]
pub fn default_connectors(layout: &SerpentineLayout, overrides: &PositionOverrides) -> Vec<Connector> {
    layout
        .data_nodes()
        .map(|(index, _)| Connector {
            node_index: index,
            from: layout.node_anchors[index],
            to: card_position(layout, overrides, index).point(),
        })
        .collect()
}

/// Phase two: move endpoints to measured card centres
///
/// Returns the number of connectors that changed.
pub fn apply_measurements(connectors: &mut [Connector], probe: &dyn GeometryProbe) -> usize {
    let mut corrected = 0;
    for connector in connectors.iter_mut() {
        if let Some(card) = probe.measure(connector.node_index) {
            let center = card.center();
            if center != connector.to {
                connector.to = center;
                corrected += 1;
            }
        }
    }
    corrected
}
