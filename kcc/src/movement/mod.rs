/*!
Movement stages run by the motor each tick, in order:

- rotation:   validate and shrink the orientation delta
- horizontal: planar deflection (push-back, step-over, slopes, glide, bounce, props)
- ground:     ceilings, ground snapping, grounded state and the slope factor
- platform:   rigid carry and attachment bookkeeping
- forces:     throttle, external force, soft forces and their decay

Stages share a read-only [`StageContext`] and write into an explicit [`TickScratch`].
*/

pub mod forces;
pub mod ground;
pub mod horizontal;
pub mod platform;
pub mod rotation;
pub mod scratch;

pub use forces::{ForceMode, ForceModel, ForceOptions, ForceSpace, SoftForceRing};
pub use ground::{VerticalOutcome, deflect_vertical, slope_factor};
pub use horizontal::{HorizontalOutcome, deflect_horizontal};
pub use platform::{PlatformAttachment, PlatformTracker};
pub use rotation::resolve_rotation;
pub use scratch::{PropPush, StageContext, TickScratch};
