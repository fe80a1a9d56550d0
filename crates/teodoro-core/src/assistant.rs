//! Main-loop helpers around the dispatcher: greeting, the repeat round, connectivity and the
//! periodic tick.

use crate::dispatcher::Dispatcher;
use crate::error::CoreResult;
use crate::outcome::DispatchOutcome;
use chrono::NaiveDateTime;
use std::time::{Duration, Instant};

pub const NO_CONNECTION_DISPLAY: &str = "No tiene acceso \na Internet";

pub struct Assistant {
    dispatcher: Dispatcher,
    http: reqwest::Client,
    check_interval: Duration,
    last_check: Option<Instant>,
}

impl Assistant {
    pub fn new(dispatcher: Dispatcher) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(dispatcher.config().io_timeout())
            .build()?;
        let check_interval = dispatcher.config().check_interval();
        Ok(Self {
            dispatcher,
            http,
            check_interval,
            last_check: None,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn is_shutting_down(&self) -> bool {
        self.dispatcher.is_shutting_down()
    }

    /// Announces missing tables, runs the first login and greets the user.
    pub async fn start(&mut self) -> CoreResult<()> {
        let collab = self.dispatcher.collaborators().clone();
        for missing in self.dispatcher.lexicon().missing_tables() {
            collab.screen.show(missing.notice());
        }
        let reply = self.dispatcher.login(true).await?;
        if let Some(text) = reply.display.as_deref() {
            collab.screen.show(text);
        }
        collab.speech.speak(&format!(
            "Hola {}, aquí estoy para lo que necesite.",
            self.dispatcher.session().user
        ));
        Ok(())
    }

    /// One command, plus the single repeat round when nothing matched.
    pub async fn handle_command(&mut self, transcript: &str) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(transcript).await;
        if !outcome.is_retry() {
            return outcome;
        }
        let transcriber = self.dispatcher.collaborators().transcriber.clone();
        let repeat = match tokio::task::spawn_blocking(move || transcriber.listen_for_repeat()).await {
            Ok(repeat) => repeat,
            Err(e) => {
                tracing::warn!(target: "teodoro::assistant", error = %e, "Repeat listener failed");
                None
            }
        };
        self.dispatcher.dispatch_repeat(repeat.as_deref()).await
    }

    /// Probes the configured URL. On failure the user is told and `false` is returned.
    pub async fn connectivity_ok(&self) -> bool {
        let url = &self.dispatcher.config().connectivity_url;
        match self.http.get(url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(target: "teodoro::assistant", url = %url, error = %e, "No connectivity");
                self.dispatcher
                    .collaborators()
                    .screen
                    .show(NO_CONNECTION_DISPLAY);
                false
            }
        }
    }

    /// Whether a periodic check is due at `now`. The first call is always due.
    pub fn check_due(&self, now: Instant) -> bool {
        match self.last_check {
            Some(last) => now.duration_since(last) >= self.check_interval,
            None => true,
        }
    }

    /// Runs the reminder and phone checks when the interval has elapsed.
    pub async fn periodic_check_if_due(&mut self, now: Instant, wall_clock: NaiveDateTime) -> bool {
        if !self.check_due(now) {
            return false;
        }
        self.last_check = Some(now);
        let handled = self.dispatcher.periodic_check(wall_clock).await;
        tracing::debug!(target: "teodoro::assistant", handled = handled, "Periodic check");
        true
    }

    /// Off-macro and goodbye. Safe to call after the farewell intent already spoke.
    pub async fn shutdown(&mut self, already_said_goodbye: bool) {
        self.dispatcher.run_off_macro().await;
        if !already_said_goodbye {
            let user = self.dispatcher.session().user.clone();
            self.dispatcher
                .collaborators()
                .speech
                .speak(&format!("Adiós {}, que tenga un buen día", user));
        }
        tracing::info!(target: "teodoro::assistant", "Assistant stopped");
    }
}
