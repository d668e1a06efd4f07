//! Engine: runs snapshot loader, live channel, clock announcer and panel

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelStats, LiveChannel};
use crate::clock::ClockAnnouncer;
use crate::panel::StatusPanel;
use crate::snapshot::{SnapshotLoader, SnapshotOutcome};

/// What a finished engine run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    /// `None` when shutdown came before the snapshot response
    pub snapshot: Option<SnapshotOutcome>,
    pub channel: Option<ChannelStats>,
}

pub struct Engine {
    snapshot: SnapshotLoader,
    channel: Option<Arc<LiveChannel>>,
    clock: Option<ClockAnnouncer>,
    panel: Option<StatusPanel>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        snapshot: SnapshotLoader,
        channel: Option<Arc<LiveChannel>>,
        clock: Option<ClockAnnouncer>,
        panel: Option<StatusPanel>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            snapshot,
            channel,
            clock,
            panel,
            cancel,
        }
    }

    pub fn channel(&self) -> Option<&Arc<LiveChannel>> {
        self.channel.as_ref()
    }

    /// Run every component concurrently. Returns once the cancellation
    /// token is triggered and all of them have stopped.
    ///
    /// No ordering is enforced between the snapshot and the live channel.
    pub async fn run(&self) -> EngineReport {
        let snapshot = async {
            tokio::select! {
                outcome = self.snapshot.load() => Some(outcome),
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Snapshot abandoned on shutdown");
                    None
                }
            }
        };

        let live = async {
            if let Some(channel) = &self.channel {
                channel.run().await;
            }
        };

        let clock = async {
            if let Some(clock) = &self.clock {
                clock.run(self.cancel.clone()).await;
            }
        };

        let panel = async {
            if let Some(panel) = &self.panel {
                let channel = self.channel.clone();
                panel
                    .run(
                        move || channel.as_ref().map(|c| c.state()),
                        self.cancel.clone(),
                    )
                    .await;
            }
        };

        let (snapshot, _, _, _, _) =
            tokio::join!(snapshot, live, clock, panel, self.cancel.cancelled());

        EngineReport {
            snapshot,
            channel: self.channel.as_ref().map(|c| c.stats()),
        }
    }
}
