pub mod event;
pub mod fvg;
pub mod snapshot;
pub mod state_machine;
pub mod swing;

pub use event::{Direction, EventKind, Significance, StructureEvent};
pub use fvg::{FairValueGap, FvgParams, FvgTracker};
pub use snapshot::{MarketStructure, StructureSnapshot};
pub use state_machine::{StructureParams, StructureState, StructureStateMachine};
pub use swing::{SwingDetector, SwingKind, SwingPoint};
