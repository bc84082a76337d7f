//! Notification fan-out to the configured control panels.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use facelink_core::config::ControlPanelsConfig;
use facelink_core::peer::{PeerAddr, PeerAddrError};
use facelink_core::proto::{AddControlObjectResp, NotifyControlReq};
use facelink_core::transport::{HttpTransport, TransportError};
use facelink_core::ttl_queue::TtlQueue;

use crate::session::{AwaitingControl, EnrollmentSession};

const API_NOTIFY_CONTROL: &str = "/api/v1/notify_control";
const API_NOTIFY_ADD_CONTROL_OBJECT: &str = "/api/v1/notify_add_control_object";

/// Who a console notification is for.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Every configured console; succeeds if at least one acknowledges.
    Broadcast,
    /// One specific console, e.g. the originator of an enrollment.
    To(&'a PeerAddr),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no control panels are configured")]
    NoPanels,

    #[error("\"{endpoint}\" was not accepted by any of {count} control panels")]
    AllPanelsUnreachable {
        endpoint: &'static str,
        count: usize,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Fan-out scheduler for the console fleet. Also owns the two queues whose
/// records wait on console activity.
pub struct PanelScheduler {
    panels: Vec<PeerAddr>,
    transport: Arc<HttpTransport>,
    /// Enrollment sessions (ACOQ), keyed by session UUID and secondarily
    /// indexed by the child-image UUIDs inside each session.
    pub enrollments: Arc<TtlQueue<EnrollmentSession>>,
    /// Images awaiting an operator decision (ACQ), keyed by correlation UUID.
    pub awaiting_controls: Arc<TtlQueue<AwaitingControl>>,
}

impl PanelScheduler {
    pub fn new(
        cfg: &ControlPanelsConfig,
        transport: Arc<HttpTransport>,
    ) -> Result<Self, PeerAddrError> {
        let panels = cfg
            .control_panels
            .iter()
            .map(|url| PeerAddr::parse(url))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            panels,
            transport,
            enrollments: Arc::new(TtlQueue::new(
                "awaiting_control_objects",
                cfg.aco_q_clean_ms,
                cfg.aco_q_max_size,
            )),
            awaiting_controls: Arc::new(TtlQueue::new(
                "awaiting_controls",
                cfg.ac_q_clean_ms,
                cfg.ac_q_max_size,
            )),
        })
    }

    /// Number of configured consoles. Zero means callers commit directly
    /// instead of asking an operator.
    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    /// Ask console(s) for an operator decision about an image.
    pub async fn notify_control(
        &self,
        req: &NotifyControlReq,
        target: Target<'_>,
    ) -> Result<(), NotifyError> {
        self.send(req, API_NOTIFY_CONTROL, target).await
    }

    /// Tell console(s) that an enrollment has been committed.
    pub async fn send_add_control_object_resp(
        &self,
        resp: &AddControlObjectResp,
        target: Target<'_>,
    ) -> Result<(), NotifyError> {
        self.send(resp, API_NOTIFY_ADD_CONTROL_OBJECT, target).await
    }

    async fn send<T: Serialize>(
        &self,
        body: &T,
        endpoint: &'static str,
        target: Target<'_>,
    ) -> Result<(), NotifyError> {
        match target {
            Target::To(peer) => {
                self.transport.put_json(peer, endpoint, body).await?;
                Ok(())
            }
            Target::Broadcast => self.broadcast(body, endpoint).await,
        }
    }

    /// PUT to every console in parallel, one task per console, and wait for
    /// all of them. Succeeds iff at least one console acknowledged.
    async fn broadcast<T: Serialize>(
        &self,
        body: &T,
        endpoint: &'static str,
    ) -> Result<(), NotifyError> {
        if self.panels.is_empty() {
            return Err(NotifyError::NoPanels);
        }

        // Serialize once; each task reuses the same JSON value.
        let payload = serde_json::to_value(body).map_err(TransportError::from)?;

        let tasks = self.panels.iter().cloned().map(|panel| {
            let transport = Arc::clone(&self.transport);
            let payload = payload.clone();
            tokio::spawn(async move {
                match transport.put_json(&panel, endpoint, &payload).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(panel = %panel, endpoint, error = %e, "console notification failed");
                        false
                    }
                }
            })
        });

        let delivered = join_all(tasks)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok(true)))
            .count();

        if delivered == 0 {
            return Err(NotifyError::AllPanelsUnreachable {
                endpoint,
                count: self.panels.len(),
            });
        }

        tracing::debug!(endpoint, delivered, total = self.panels.len(), "broadcast delivered");
        Ok(())
    }
}
