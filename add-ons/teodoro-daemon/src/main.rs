//! Teodoro assistant daemon
//!
//! Console front end for the dispatch core: typed lines play the role of transcribed speech,
//! replies are printed. Periodic checks (reminders, phone codes) run between commands.

mod system;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use system::{ShellMediaPlayer, ShellPower, SystemBrowser};
use teodoro_core::actions::search::HttpSearch;
use teodoro_core::actions::weather::WttrWeather;
use teodoro_core::{
    bootstrap, Assistant, AssistantConfig, Collaborators, CoreError, DispatchStatus, Dispatcher,
    Intent, KnowledgeStore, Lexicon, SpeechOutput, Transcriber,
};
use teodoro_voice::{ConsoleInput, ConsolePrompter, ConsoleScreen, ConsoleSpeech, ConsoleTranscriber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long a wake word waits for its command, and a retry for its repeat.
const FOLLOW_UP_TIMEOUT: Duration = Duration::from_secs(15);
/// Granularity of the periodic-check ticker; the configured interval still applies.
const TICK: Duration = Duration::from_secs(1);

enum Exit {
    Farewell,
    PowerAction,
    Interrupted,
    InputClosed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[teodoro] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AssistantConfig::load().context("load assistant configuration")?;
    let timeout = config.io_timeout();

    let store = Arc::new(
        KnowledgeStore::open_path(&config.storage_path)
            .with_context(|| format!("open knowledge base at {}", config.storage_path))?,
    );
    bootstrap::seed_if_empty(store.as_ref(), Path::new(&config.seed_path))
        .context("seed knowledge base")?;
    bootstrap::ensure_default_user(store.as_ref(), &config.default_user)?;

    let lexicon = match Lexicon::load(store.as_ref(), &config.assistant_name) {
        Ok(lexicon) => Arc::new(lexicon),
        Err(e @ CoreError::FatalConfig(_)) => {
            tracing::error!(error = %e, "Command table unusable; cannot start");
            eprintln!("No se encuentran los comandos del asistente: {}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("load lexicon"),
    };
    for missing in lexicon.missing_tables() {
        tracing::warn!(table = ?missing, "Lexicon table missing");
    }

    let input = ConsoleInput::spawn().context("start console input")?;
    let speech: Arc<dyn SpeechOutput> = Arc::new(ConsoleSpeech::new());
    let transcriber = Arc::new(ConsoleTranscriber::new(
        Arc::clone(&input),
        lexicon.names(),
        Arc::clone(&speech),
        FOLLOW_UP_TIMEOUT,
    ));
    let mut collab = Collaborators::with_placeholders(
        transcriber.clone(),
        speech,
        Arc::new(ConsoleScreen),
        Arc::new(ConsolePrompter::new(Arc::clone(&input))),
    );
    if let Some(actions) = lexicon.spotify_actions() {
        collab.media = Arc::new(ShellMediaPlayer::new(actions.clone(), timeout));
    }
    collab.browser = Arc::new(SystemBrowser);
    collab.search = Arc::new(HttpSearch::new(timeout)?);
    collab.weather = Arc::new(WttrWeather::new(config.weather_base_url.clone(), timeout)?);
    collab.power = Arc::new(ShellPower::from_env(timeout));

    let dispatcher = Dispatcher::new(Arc::clone(&lexicon), store, collab, config.clone())?;
    let mut assistant = Assistant::new(dispatcher)?;
    assistant.start().await?;

    tracing::info!(
        user = %assistant.dispatcher().session().user,
        storage_path = %config.storage_path,
        check_interval_secs = config.check_interval_secs,
        "Teodoro started"
    );

    let mut ticker = tokio::time::interval(TICK);
    let mut heard = listen(transcriber.clone());
    let exit = loop {
        tokio::select! {
            command = &mut heard => {
                match command {
                    Ok(Some(command)) => {
                        if assistant.connectivity_ok().await {
                            let outcome = assistant.handle_command(&command).await;
                            if outcome.status == DispatchStatus::Terminate {
                                break Exit::Farewell;
                            }
                            let powered_off = matches!(
                                outcome.intent,
                                Some(Intent::Shutdown) | Some(Intent::Restart)
                            ) && outcome.status == DispatchStatus::Handled;
                            if powered_off {
                                break Exit::PowerAction;
                            }
                        }
                    }
                    Ok(None) if input.is_closed() => break Exit::InputClosed,
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "Listener task failed"),
                }
                heard = listen(transcriber.clone());
            }
            _ = ticker.tick() => {
                let wall_clock = chrono::Local::now().naive_local();
                assistant.periodic_check_if_due(Instant::now(), wall_clock).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down");
                break Exit::Interrupted;
            }
        }
    };

    match exit {
        Exit::Farewell => assistant.shutdown(true).await,
        Exit::PowerAction => tracing::info!("Power action applied; exiting"),
        Exit::Interrupted | Exit::InputClosed => assistant.shutdown(false).await,
    }
    Ok(())
}

fn listen(transcriber: Arc<ConsoleTranscriber>) -> tokio::task::JoinHandle<Option<String>> {
    tokio::task::spawn_blocking(move || transcriber.listen_for_command())
}
