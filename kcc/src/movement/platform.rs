/*!
Moving platform attachment.

A body is attached to at most one platform frame. While attached:
- its pose is stored in the platform frame after every tick,
- the next tick first composes the platform's motion into the body pose (rigid carry),
- only the twist of the platform rotation about the body up axis is carried, so a rolling
  platform never tips the body over.

Detaching hands back the last platform velocity so the caller can keep the momentum.
*/

use crate::collision::types::{Iso, Quat, Vec3};
use crate::scene::{PlatformId, Scene};
use crate::utils::twist_about;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformAttachment {
    pub platform: PlatformId,
    /// Body pose in the platform frame.
    pub local: Iso,
    /// Platform velocity at the body origin, as of the last carry or record.
    pub last_velocity: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct PlatformTracker {
    attachment: Option<PlatformAttachment>,
    overridden: bool,
}

impl PlatformTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn platform(&self) -> Option<PlatformId> {
        self.attachment.map(|a| a.platform)
    }

    #[inline]
    pub fn attachment(&self) -> Option<&PlatformAttachment> {
        self.attachment.as_ref()
    }

    /// An explicit override is in place; ground contact does not change the attachment.
    #[inline]
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Attach to `id` at `pose`, replacing any previous attachment.
    ///
    /// Returns false (and stays detached) if the platform does not exist.
    pub fn attach(&mut self, scene: &Scene, id: PlatformId, pose: &Iso) -> bool {
        let Some(platform) = scene.platform(id) else {
            log::debug!("Cannot attach to missing platform {id:?}");
            self.attachment = None;
            return false;
        };
        self.attachment = Some(PlatformAttachment {
            platform: id,
            local: platform.pose().inverse() * pose,
            last_velocity: platform.point_velocity(&pose.translation.vector),
        });
        true
    }

    pub fn detach(&mut self) -> Option<PlatformAttachment> {
        self.attachment.take()
    }

    /// Incremental translation and rotation that keep the body fixed in the platform frame.
    ///
    /// Behavior:
    /// - `None` when detached, or when the platform has been removed (which also detaches).
    /// - The rotation is the twist about `up` of the platform's rotation since the last record.
    pub fn carry(&mut self, scene: &Scene, pose: &Iso, up: &Vec3) -> Option<(Vec3, Quat)> {
        let attachment = self.attachment.as_mut()?;
        let Some(platform) = scene.platform(attachment.platform) else {
            log::debug!("Platform {:?} was removed; detaching", attachment.platform);
            self.attachment = None;
            self.overridden = false;
            return None;
        };

        let target = platform.pose() * attachment.local;
        let translation = target.translation.vector - pose.translation.vector;
        let rotation = twist_about(&(target.rotation * pose.rotation.inverse()), up);
        attachment.last_velocity = platform.point_velocity(&target.translation.vector);
        Some((translation, rotation))
    }

    /// Store `pose` in the platform frame after the body has moved.
    pub fn record(&mut self, scene: &Scene, pose: &Iso) {
        let Some(attachment) = self.attachment.as_mut() else {
            return;
        };
        match scene.platform(attachment.platform) {
            Some(platform) => {
                attachment.local = platform.pose().inverse() * pose;
                attachment.last_velocity = platform.point_velocity(&pose.translation.vector);
            }
            None => {
                self.attachment = None;
                self.overridden = false;
            }
        }
    }

    /// Force the attachment. `Some` pins the body to that platform until cleared with `None`.
    ///
    /// Returns the attachment that was replaced, if any.
    pub fn override_with(
        &mut self,
        scene: &Scene,
        platform: Option<PlatformId>,
        pose: &Iso,
    ) -> Option<PlatformAttachment> {
        let previous = self.detach();
        self.overridden = false;
        if let Some(id) = platform {
            self.overridden = self.attach(scene, id, pose);
        }
        previous
    }
}
