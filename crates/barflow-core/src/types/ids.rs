//! Index handles used across the engine.
//!
//! Feeds, nodes, orders and trades are owned by arenas; everything else refers to
//! them by these handles. Membership checks compare handles, never values.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Position of this handle in its arena.
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

handle!(
    /// A data feed (and the instrument it carries).
    FeedId,
    "feed#"
);
handle!(
    /// A compute node in the graph arena.
    NodeId,
    "node#"
);
handle!(
    /// A single line in the line store.
    LineId,
    "line#"
);
handle!(
    /// An order known to the market simulator.
    OrderId,
    "order#"
);
handle!(
    /// A trade (open to flat cycle) known to the market simulator.
    TradeId,
    "trade#"
);
