//! Timer state module
//!
//! Snapshot contracts, the derived display, the clock capability and the
//! reconciler that ties them together.

pub mod app_state;
pub mod clock;
pub mod display;
pub mod reconciler;
pub mod snapshot;

// Re-export main types
pub use app_state::AppState;
pub use clock::{Clock, SystemClock, TokioClock};
pub use display::{format_elapsed, DisplayState, TimerView};
pub use reconciler::TimerReconciler;
pub use snapshot::{StartReceipt, StopReceipt, TimerPhase, TimerSnapshot};
