/*!
Collision root module.

Shape queries for the character motor, built on parry (through `rapier3d`):

- types:        shared data types (ShapeHit, ContactRecord, Penetration)
- narrow_phase: thin wrappers over parry queries (casts, contacts, rays) against one collider
- query:        multi-volume body casts, overlaps and penetration resolution
- gate:         scoped exclusion of the body's own colliders during queries
*/

pub mod gate;
pub mod narrow_phase;
pub mod query;
pub mod types;

// Re-export commonly used types and functions.
pub use gate::ColliderGate;
pub use query::{HitList, Overlap, QueryFilter, cast_body, overlap_body, resolve_penetration};
pub use types::{ContactRecord, Iso, Penetration, PenetrationOutcome, Quat, ShapeHit, Vec3};
