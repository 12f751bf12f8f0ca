use tokio::sync::mpsc;

use crate::scan::SessionReport;

/// Receives one report per closed scan session.
///
/// Called outside every orchestrator lock, from whichever task finished
/// last. Implementations should return quickly.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, report: SessionReport);
}

impl<F> NotificationSink for F
where
    F: Fn(SessionReport) + Send + Sync,
{
    fn notify(&self, report: SessionReport) {
        self(report)
    }
}

/// Forwards reports into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SessionReport>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionReport>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, report: SessionReport) {
        if self.sender.send(report).is_err() {
            tracing::debug!("session report dropped: receiver closed");
        }
    }
}
