//! Correlation records owned by the control-panel queues.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use facelink_core::proto::{ControlObjectPart, ImagePart};
use facelink_core::types::{FaceData, FacialFeaturesVector, ImageControlObject};

/// An image proposed to the consoles, awaiting an operator decision.
///
/// `image_control_objects[i]` and `facial_features_vectors[i]` describe the
/// same face; the submit path matches the operator's reply to an index by
/// exact face-box equality.
#[derive(Debug, Clone)]
pub struct AwaitingControl {
    /// Address of the camera that submitted the image.
    pub src_addr: String,
    pub img_buff: String,
    pub image_control_objects: Vec<ImageControlObject>,
    pub facial_features_vectors: Vec<FacialFeaturesVector>,
}

/// Everything needed to commit a completed enrollment, extracted from the
/// session under its lock so the store I/O can run after release.
#[derive(Debug)]
pub struct CommitBundle {
    pub control_object_part: ControlObjectPart,
    /// Image parts by child-image UUID (for archiving the raw bytes).
    pub images: HashMap<Uuid, ImagePart>,
    /// One recognized face per child-image UUID.
    pub faces: Vec<(Uuid, FaceData)>,
}

/// Outcome of a state change on an enrollment session.
#[derive(Debug)]
pub enum SessionProgress {
    /// More pieces are still expected.
    Pending,
    /// All pieces arrived; the caller owns the commit now. Returned to
    /// exactly one caller per session.
    Ready(Box<CommitBundle>),
}

#[derive(Debug, Default)]
struct SessionState {
    control_object: Option<ControlObjectPart>,
    /// Image parts received so far, by child-image UUID.
    images: HashMap<Uuid, ImagePart>,
    /// Worker results received so far, by child-image UUID.
    faces: HashMap<Uuid, FaceData>,
    /// Children dropped because the worker found no face (or dispatch
    /// failed); each drop lowers the expected image count.
    removed: u64,
    committing: bool,
}


/// A multi-image enrollment session.
///
/// Consoles deliver the identity part and each photo as separate messages
/// under one session UUID; workers call back once per photo under a fresh
/// child-image UUID. All of those arrive concurrently, so every mutation
/// goes through the per-session lock. No I/O happens under the lock.
#[derive(Debug)]
pub struct EnrollmentSession {
    pub uuid: Uuid,
    /// Address of the console that opened the session.
    pub src_addr: String,
    state: Mutex<SessionState>,
}

impl EnrollmentSession {
    pub fn new(uuid: Uuid, src_addr: String) -> Self {
        Self {
            uuid,
            src_addr,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether this session owns the given child-image UUID. Secondary key
    /// for locating a session from a worker callback.
    pub fn has_child(&self, child: &Uuid) -> bool {
        self.lock().images.contains_key(child)
    }

    /// Attach the identity part. Completes the session immediately when all
    /// expected faces (possibly zero) have already arrived.
    pub fn attach_control_object(&self, part: ControlObjectPart) -> SessionProgress {
        let mut state = self.lock();
        state.control_object = Some(part);
        Self::take_if_complete(&mut state)
    }

    /// Register an enrollment photo under its fresh child-image UUID.
    pub fn register_image(&self, child: Uuid, part: ImagePart) {
        self.lock().images.insert(child, part);
    }

    /// Record a worker callback for one child image.
    ///
    /// An empty result drops the child and lowers the expected count --
    /// the remaining photos can still complete the session. Otherwise only
    /// the first detected face is kept: enrollment photos are expected to
    /// contain exactly one subject.
    pub fn record_faces(&self, child: Uuid, mut faces: Vec<FaceData>) -> SessionProgress {
        let mut state = self.lock();

        if faces.is_empty() {
            if state.images.remove(&child).is_some() {
                state.removed += 1;
                tracing::warn!(
                    session = %self.uuid,
                    child = %child,
                    "no faces found on enrollment image, dropping it"
                );
            }
        } else {
            if faces.len() > 1 {
                tracing::warn!(
                    session = %self.uuid,
                    child = %child,
                    found = faces.len(),
                    "multiple faces on enrollment image, keeping the first"
                );
            }
            state.faces.insert(child, faces.swap_remove(0));
        }

        Self::take_if_complete(&mut state)
    }

    /// Drop a child whose processing request could not be dispatched.
    pub fn drop_child(&self, child: Uuid) -> SessionProgress {
        let mut state = self.lock();
        if state.images.remove(&child).is_some() {
            state.removed += 1;
            state.faces.remove(&child);
        }
        Self::take_if_complete(&mut state)
    }

    fn take_if_complete(state: &mut SessionState) -> SessionProgress {
        if state.committing {
            return SessionProgress::Pending;
        }
        let Some(control_object_part) = state.control_object.clone() else {
            return SessionProgress::Pending;
        };
        let expected = control_object_part.images_num.saturating_sub(state.removed);
        if expected != state.faces.len() as u64 {
            return SessionProgress::Pending;
        }

        state.committing = true;
        let images = std::mem::take(&mut state.images);
        let faces = std::mem::take(&mut state.faces).into_iter().collect();

        SessionProgress::Ready(Box::new(CommitBundle {
            control_object_part,
            images,
            faces,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelink_core::types::{ControlObject, FaceBox};

    fn part(images_num: u64) -> ControlObjectPart {
        ControlObjectPart {
            control_object: ControlObject::unknown(),
            images_num,
        }
    }

    fn image_part() -> ImagePart {
        ImagePart {
            img_buff: "aGVsbG8=".to_string(),
            face_box: None,
        }
    }

    fn face() -> FaceData {
        FaceData {
            face_box: FaceBox([1, 2, 3, 4]),
            facial_features_vector: FacialFeaturesVector(vec![0.1, 0.2]),
        }
    }

    #[test]
    fn completes_when_all_faces_and_part_arrived() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
        session.register_image(c1, image_part());
        session.register_image(c2, image_part());

        assert!(matches!(
            session.attach_control_object(part(2)),
            SessionProgress::Pending
        ));
        assert!(matches!(
            session.record_faces(c1, vec![face()]),
            SessionProgress::Pending
        ));

        match session.record_faces(c2, vec![face()]) {
            SessionProgress::Ready(bundle) => {
                assert_eq!(bundle.faces.len(), 2);
                assert_eq!(bundle.images.len(), 2);
            }
            SessionProgress::Pending => panic!("session should be complete"),
        }
    }

    #[test]
    fn identity_part_may_arrive_last() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        let child = Uuid::new_v4();
        session.register_image(child, image_part());
        assert!(matches!(
            session.record_faces(child, vec![face()]),
            SessionProgress::Pending
        ));

        assert!(matches!(
            session.attach_control_object(part(1)),
            SessionProgress::Ready(_)
        ));
    }

    #[test]
    fn zero_face_child_lowers_expected_count() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
        session.register_image(c1, image_part());
        session.register_image(c2, image_part());
        session.attach_control_object(part(2));

        assert!(matches!(
            session.record_faces(c1, Vec::new()),
            SessionProgress::Pending
        ));

        // The remaining child still completes the session.
        match session.record_faces(c2, vec![face()]) {
            SessionProgress::Ready(bundle) => assert_eq!(bundle.faces.len(), 1),
            SessionProgress::Pending => panic!("session should be complete"),
        }
    }

    #[test]
    fn zero_images_session_commits_on_identity_part() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        match session.attach_control_object(part(0)) {
            SessionProgress::Ready(bundle) => assert!(bundle.faces.is_empty()),
            SessionProgress::Pending => panic!("empty session should commit immediately"),
        }
    }

    #[test]
    fn only_first_face_is_kept() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        let child = Uuid::new_v4();
        session.register_image(child, image_part());
        session.attach_control_object(part(1));

        let first = face();
        let mut second = face();
        second.face_box = FaceBox([9, 9, 9, 9]);

        match session.record_faces(child, vec![first.clone(), second]) {
            SessionProgress::Ready(bundle) => {
                assert_eq!(bundle.faces.len(), 1);
                assert_eq!(bundle.faces[0].1.face_box, first.face_box);
            }
            SessionProgress::Pending => panic!("session should be complete"),
        }
    }

    #[test]
    fn ready_is_returned_exactly_once() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        let child = Uuid::new_v4();
        session.register_image(child, image_part());
        session.record_faces(child, vec![face()]);

        assert!(matches!(
            session.attach_control_object(part(1)),
            SessionProgress::Ready(_)
        ));
        // A late duplicate of the identity part must not re-trigger commit.
        assert!(matches!(
            session.attach_control_object(part(1)),
            SessionProgress::Pending
        ));
    }

    #[test]
    fn has_child_tracks_registered_images() {
        let session = EnrollmentSession::new(Uuid::new_v4(), "http://panel:9101".into());
        let child = Uuid::new_v4();
        assert!(!session.has_child(&child));
        session.register_image(child, image_part());
        assert!(session.has_child(&child));
    }
}
