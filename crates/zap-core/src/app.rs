//! Everything that runs once the session client is connected.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    config::Config,
    console::Console,
    dispatcher::Dispatcher,
    messaging::{bus::EventBus, port::SessionClient},
    scheduler::{Clock, DailyScheduler},
    supervisor::TaskSupervisor,
};

pub struct App {
    pub config: Config,
    pub client: Arc<dyn SessionClient>,
    pub bus: Arc<EventBus>,
    pub console: Console,
    pub clock: Arc<dyn Clock>,
}

impl App {
    /// Start the daily scheduler, run the dispatcher over `lines`, then shut
    /// down: cancel, wait up to the grace period for tasks, close the client.
    ///
    /// `cancel` is the root token; signal handlers cancel it from outside.
    pub async fn serve(self, cancel: CancellationToken, lines: mpsc::Receiver<String>) {
        let supervisor = TaskSupervisor::new(self.config.reply_concurrency, cancel.clone());

        if self.config.daily.enabled {
            match DailyScheduler::new(&self.config.daily, self.client.clone(), self.clock.clone()) {
                Ok(scheduler) => {
                    let cancel = cancel.clone();
                    supervisor.spawn_long_running("daily-scheduler", async move {
                        scheduler.run(cancel).await;
                        Ok(())
                    });
                }
                Err(e) => error!("daily scheduler disabled: {e}"),
            }
        }

        Dispatcher::new(
            self.client.clone(),
            self.bus.clone(),
            supervisor.clone(),
            self.console.clone(),
        )
        .run(lines)
        .await;

        self.console.line("Shutting down client...");
        let grace = self.config.shutdown_grace;
        if !supervisor.shutdown(grace).await {
            warn!(
                in_flight = supervisor.in_flight(),
                "tasks still running after {}ms",
                grace.as_millis()
            );
        }
        self.client.close().await;
        self.console.line("Client closed. Goodbye!");
    }
}
