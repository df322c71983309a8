use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time,
};
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    events::{BotStatus, LogLevel},
    sweep::engine::{SweepEngine, SweepJob, SweepResult},
};

const COMMAND_CAPACITY: usize = 16;

enum Command {
    Start {
        job: SweepJob,
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
}

/// Control handle for the sweep worker.
///
/// Cheap to clone; the worker exits once every handle is dropped.
#[derive(Clone)]
pub struct BotHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<BotStatus>,
}

impl BotHandle {
    pub fn spawn(engine: Arc<SweepEngine>, pace: Duration) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(BotStatus::default());

        let worker = BotWorker {
            engine,
            pace,
            commands: commands_rx,
            status: status_tx,
            state: BotState::default(),
            job: None,
        };

        let handle = tokio::spawn(worker.run());
        (
            Self {
                commands: commands_tx,
                status: status_rx,
            },
            handle,
        )
    }

    /// `Ok(false)` when the bot was already running
    pub async fn start(&self, job: SweepJob) -> AppResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { job, reply }).await?;
        rx.await
            .map_err(|_| AppError::Internal("Sweep worker dropped the request".to_string()))
    }

    /// `Ok(false)` when the bot was already stopped
    pub async fn stop(&self) -> AppResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        rx.await
            .map_err(|_| AppError::Internal("Sweep worker dropped the request".to_string()))
    }

    pub fn status(&self) -> BotStatus {
        self.status.borrow().clone()
    }

    /// Resolves on the next status change
    pub async fn changed(&mut self) -> AppResult<BotStatus> {
        self.status
            .changed()
            .await
            .map_err(|_| AppError::Internal("Sweep worker is gone".to_string()))?;
        Ok(self.status.borrow_and_update().clone())
    }

    async fn send(&self, command: Command) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::Internal("Sweep worker is not running".to_string()))
    }
}

#[derive(Debug, Default)]
struct BotState {
    running: bool,
    cursor: usize,
    /// Bumped on every start so a result from a previous run never moves the cursor
    generation: u64,
    cycles_completed: u64,
}

/// Single owner of the bot state; processes one account at a time
struct BotWorker {
    engine: Arc<SweepEngine>,
    pace: Duration,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<BotStatus>,
    state: BotState,
    job: Option<Arc<SweepJob>>,
}

impl BotWorker {
    async fn run(mut self) {
        loop {
            if !self.state.running {
                match self.commands.recv().await {
                    Some(command) => self.apply(command),
                    None => break,
                }
                continue;
            }

            let Some(job) = self.job.clone() else {
                self.state.running = false;
                self.publish();
                continue;
            };

            let index = self.state.cursor;
            let generation = self.state.generation;

            // commands are applied while the account is in flight; the step itself is never cancelled
            let engine = self.engine.clone();
            let step = async move { engine.process_wallet(&job, index).await };
            tokio::pin!(step);

            let mut handles_dropped = false;
            let result = loop {
                tokio::select! {
                    result = &mut step => break result,
                    command = self.commands.recv(), if !handles_dropped => match command {
                        Some(command) => self.apply(command),
                        None => handles_dropped = true,
                    },
                }
            };
            log_result(index, &result);

            if handles_dropped {
                break;
            }
            if !self.state.running || self.state.generation != generation {
                continue;
            }

            self.advance();

            let pause = time::sleep(self.pace);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    _ = &mut pause => break,
                    command = self.commands.recv() => match command {
                        Some(command) => {
                            self.apply(command);
                            if !self.state.running {
                                break;
                            }
                        }
                        None => return,
                    },
                }
            }
        }

        info!("Sweep worker exiting");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start { job, reply } => {
                let started = self.start(job);
                let _ = reply.send(started);
            }
            Command::Stop { reply } => {
                let stopped = self.stop();
                let _ = reply.send(stopped);
            }
        }
    }

    fn start(&mut self, job: SweepJob) -> bool {
        if self.state.running {
            return false;
        }

        info!(
            "Starting bot with {} account(s), recipient {}",
            job.account_count(),
            job.recipient()
        );
        self.state.running = true;
        self.state.cursor = 0;
        self.state.generation += 1;
        self.job = Some(Arc::new(job));

        self.engine.notifier().notify("🚀 *Bot Started*".to_string());
        self.engine.events().log(LogLevel::Info, "Bot started");
        self.publish();
        true
    }

    fn stop(&mut self) -> bool {
        if !self.state.running {
            return false;
        }

        info!("Stopping bot...");
        self.state.running = false;

        self.engine.notifier().notify("⏹️ *Bot Stopped*".to_string());
        self.engine.events().log(LogLevel::Info, "Bot stopped");
        self.publish();
        true
    }

    fn advance(&mut self) {
        let len = self.job.as_ref().map(|job| job.account_count()).unwrap_or(1).max(1);
        self.state.cursor = (self.state.cursor + 1) % len;

        if self.state.cursor == 0 {
            self.state.cycles_completed += 1;
            info!("Cycle complete, restarting from the first wallet after a short pause...");
            self.engine.events().log(
                LogLevel::Info,
                format!("Cycle {} complete", self.state.cycles_completed),
            );
        }
        self.publish();
    }

    fn publish(&self) {
        let status = BotStatus {
            is_running: self.state.running,
            cursor: self.state.cursor,
            accounts: self.job.as_ref().map(|job| job.account_count()).unwrap_or(0),
            cycles_completed: self.state.cycles_completed,
        };
        self.status.send_replace(status.clone());
        self.engine.events().status(status);
    }
}

fn log_result(index: usize, result: &SweepResult) {
    match result {
        SweepResult::Swept(receipt) => info!(
            "Wallet #{} swept ({}): {}",
            index + 1,
            receipt.mode.label(),
            receipt.hash
        ),
        SweepResult::NothingToDo => info!("Wallet #{}: nothing to sweep", index + 1),
        SweepResult::Failed { error, reporting } => warn!(
            "Wallet #{} failed ({:?}): {}",
            index + 1,
            reporting,
            error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::EventBroadcaster,
        notify::recording::RecordingNotifier,
        sweep::{composer::TransactionComposer, testing::MockLedger},
    };

    const RECIPIENT: &str = "GDRXE2BQUC3AZNPVFSCEZ76NJ3WWL25FYFK6RGZGIEKWE4SOOHSUJUJ6";
    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn spawn_bot(pace: Duration) -> (BotHandle, Arc<RecordingNotifier>, Arc<MockLedger>) {
        // balance too low to send: every step is a quiet no-op
        spawn_bot_with(MockLedger::new("1"), pace)
    }

    fn spawn_bot_with(
        ledger: MockLedger,
        pace: Duration,
    ) -> (BotHandle, Arc<RecordingNotifier>, Arc<MockLedger>) {
        let ledger = Arc::new(ledger);
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Arc::new(SweepEngine::new(
            ledger.clone(),
            notifier.clone(),
            EventBroadcaster::new(),
            "https://explorer.test/tx",
        ));
        let (handle, _join) = BotHandle::spawn(engine, pace);
        (handle, notifier, ledger)
    }

    fn job(accounts: usize) -> SweepJob {
        let composer = TransactionComposer::new("Pi Network", RECIPIENT, "memo").unwrap();
        SweepJob::new(vec![PHRASE.to_string(); accounts], composer).unwrap()
    }

    async fn wait_for<F: Fn(&BotStatus) -> bool>(handle: &mut BotHandle, predicate: F) -> BotStatus {
        loop {
            let status = handle.status();
            if predicate(&status) {
                return status;
            }
            handle.changed().await.unwrap();
        }
    }

    async fn wait_for_loads(ledger: &MockLedger, count: usize) {
        time::timeout(Duration::from_secs(5), async {
            while ledger.load_count() < count {
                time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_start_stop_status() {
        let (handle, notifier, _ledger) = spawn_bot(Duration::from_secs(3600));

        assert!(!handle.status().is_running);
        assert!(handle.start(job(2)).await.unwrap());
        assert!(handle.status().is_running);

        assert!(handle.stop().await.unwrap());
        assert!(!handle.status().is_running);

        assert_eq!(notifier.count_containing("Bot Started"), 1);
        assert_eq!(notifier.count_containing("Bot Stopped"), 1);
    }

    #[tokio::test]
    async fn test_double_start_and_double_stop_are_noops() {
        let (handle, notifier, _ledger) = spawn_bot(Duration::from_secs(3600));

        assert!(!handle.stop().await.unwrap());
        assert!(handle.start(job(1)).await.unwrap());
        assert!(!handle.start(job(3)).await.unwrap());
        assert_eq!(handle.status().accounts, 1);

        assert!(handle.stop().await.unwrap());
        assert!(!handle.stop().await.unwrap());

        assert_eq!(notifier.count_containing("Bot Started"), 1);
        assert_eq!(notifier.count_containing("Bot Stopped"), 1);
    }

    #[tokio::test]
    async fn test_cursor_wraps_and_counts_cycles() {
        let (mut handle, _notifier, _ledger) = spawn_bot(Duration::from_millis(1));
        handle.start(job(3)).await.unwrap();

        let status = wait_for(&mut handle, |s| s.cycles_completed >= 2).await;
        assert!(status.cursor < 3);
        assert_eq!(status.accounts, 3);
        assert!(status.is_running);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_then_start_resets_cursor() {
        let (mut handle, _notifier, _ledger) = spawn_bot(Duration::from_secs(3600));
        handle.start(job(3)).await.unwrap();

        // first account done, now parked in the long pause
        wait_for(&mut handle, |s| s.cursor == 1).await;
        handle.stop().await.unwrap();
        assert_eq!(handle.status().cursor, 1);

        handle.start(job(3)).await.unwrap();
        assert_eq!(handle.status().cursor, 0);
        assert!(handle.status().is_running);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_halts_processing() {
        let (mut handle, _notifier, ledger) = spawn_bot(Duration::from_secs(3600));
        handle.start(job(2)).await.unwrap();

        wait_for(&mut handle, |s| s.cursor == 1).await;
        handle.stop().await.unwrap();
        let loads = ledger.load_count();

        tokio::task::yield_now().await;
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ledger.load_count(), loads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_accounts() {
        let (mut handle, _notifier, ledger) = spawn_bot(Duration::from_millis(200));
        handle.start(job(2)).await.unwrap();

        // discovery plus the fresh read before the plain plan
        wait_for(&mut handle, |s| s.cursor == 1).await;
        assert_eq!(ledger.load_count(), 2);

        // second account only after the pause elapses
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ledger.load_count(), 2);

        let status = wait_for(&mut handle, |s| s.cursor == 0).await;
        assert_eq!(status.cycles_completed, 1);
        assert_eq!(ledger.load_count(), 4);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_while_in_flight_keeps_cursor() {
        let (ledger, gate) = MockLedger::new("1").gated();
        let (handle, notifier, ledger) = spawn_bot_with(ledger, Duration::from_secs(3600));
        handle.start(job(2)).await.unwrap();
        wait_for_loads(&ledger, 1).await;

        assert!(handle.stop().await.unwrap());
        assert!(!handle.status().is_running);

        // the blocked step finishes after the stop; nothing advances
        gate.add_permits(2);
        wait_for_loads(&ledger, 2).await;
        time::sleep(Duration::from_millis(20)).await;

        let status = handle.status();
        assert!(!status.is_running);
        assert_eq!(status.cursor, 0);
        assert_eq!(ledger.load_count(), 2);
        assert_eq!(notifier.count_containing("Bot Stopped"), 1);
    }

    #[tokio::test]
    async fn test_restart_while_in_flight_ignores_stale_result() {
        let (ledger, gate) = MockLedger::new("1").gated();
        let (mut handle, _notifier, ledger) = spawn_bot_with(ledger, Duration::from_secs(3600));
        handle.start(job(2)).await.unwrap();
        wait_for_loads(&ledger, 1).await;

        // account 0 of the first run is still blocked on the ledger
        assert!(handle.stop().await.unwrap());
        assert!(handle.start(job(2)).await.unwrap());
        assert_eq!(handle.status().cursor, 0);

        // the stale step completes and the new run begins at account 0
        gate.add_permits(2);
        wait_for_loads(&ledger, 3).await;
        let status = handle.status();
        assert!(status.is_running);
        assert_eq!(status.cursor, 0);
        assert_eq!(status.cycles_completed, 0);

        // the new run's own result advances the cursor
        gate.add_permits(2);
        let status = time::timeout(
            Duration::from_secs(5),
            wait_for(&mut handle, |s| s.cursor == 1),
        )
        .await
        .unwrap();
        assert!(status.is_running);
        assert_eq!(ledger.load_count(), 4);

        handle.stop().await.unwrap();
    }
}
