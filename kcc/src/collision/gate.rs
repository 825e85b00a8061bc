use std::ops::{Deref, DerefMut};

use crate::bitmask_flags::CollisionLayer;
use crate::scene::{ColliderHandle, Scene};

/// Scoped exclusion of a body's own colliders from scene queries.
///
/// While the gate is inactive every gated collider sits on [`CollisionLayer::Ignored`]; the
/// original layers are saved and written back on [`ColliderGate::set_active`]`(true)` or when
/// the gate is dropped, including during unwinding. Toggling to the current state is a no-op.
///
/// The gate owns the scene borrow for its lifetime and dereferences to it, so every query made
/// during a movement entry point goes through the gate.
pub struct ColliderGate<'a> {
    scene: &'a mut Scene,
    handles: Vec<ColliderHandle>,
    saved: Vec<(ColliderHandle, CollisionLayer)>,
    active: bool,
}

impl<'a> ColliderGate<'a> {
    /// Wrap `scene` with the given colliders still participating in queries.
    pub fn new(scene: &'a mut Scene, handles: impl IntoIterator<Item = ColliderHandle>) -> Self {
        Self {
            scene,
            handles: handles.into_iter().collect(),
            saved: Vec::new(),
            active: true,
        }
    }

    /// Wrap `scene` with the given colliders already excluded.
    pub fn closed(scene: &'a mut Scene, handles: impl IntoIterator<Item = ColliderHandle>) -> Self {
        let mut gate = Self::new(scene, handles);
        gate.set_active(false);
        gate
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        if active {
            for (handle, layer) in self.saved.drain(..) {
                self.scene.set_layer(handle, layer);
            }
        } else {
            self.saved.clear();
            for &handle in &self.handles {
                if let Some(layer) = self.scene.layer(handle) {
                    self.saved.push((handle, layer));
                    self.scene.set_layer(handle, CollisionLayer::Ignored);
                }
            }
        }
        self.active = active;
    }
}

impl Deref for ColliderGate<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for ColliderGate<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for ColliderGate<'_> {
    fn drop(&mut self) {
        self.set_active(true);
    }
}
