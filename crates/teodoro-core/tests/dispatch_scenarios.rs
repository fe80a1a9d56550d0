use chrono::{Duration as ChronoDuration, Local};
use std::sync::Arc;
use std::time::Duration;
use teodoro_core::actions::calendar::CALENDAR_FAILURE_SPEECH;
use teodoro_core::actions::media::MediaCommand;
use teodoro_core::actions::reminder::{Reminder, ReminderBook};
use teodoro_core::actions::users::UserDirectory;
use teodoro_core::bootstrap::{seed_from_str, DEFAULT_SEED};
use teodoro_core::extract::DEFAULT_DURATION_SECS;
use teodoro_core::outcome::{DENIAL_MESSAGE, REPEAT_REQUEST, RETRY_SPEECH, UNRECOGNIZED_SPEECH};
use teodoro_core::placeholder::{PlaceholderCalendar, PlaceholderMedia};
use teodoro_core::store::{Filter, GENERAL, REMINDERS};
use teodoro_core::{
    AssistantConfig, Collaborators, CoreResult, DispatchState, DispatchStatus, Dispatcher,
    DocumentStore, ErrorCode, Intent, KnowledgeStore, Lexicon, LoginForm, MediaPlayer,
    PromptKind, PromptReply, SpeechOutput, WeatherService,
};
use teodoro_voice::{RecordingScreen, RecordingSpeech, ScriptedPrompter, ScriptedTranscriber};

struct Harness {
    dispatcher: Dispatcher,
    store: Arc<KnowledgeStore>,
    speech: Arc<RecordingSpeech>,
    screen: Arc<RecordingScreen>,
    media: Arc<PlaceholderMedia>,
    prompter: Arc<ScriptedPrompter>,
    _dir: tempfile::TempDir,
}

struct Setup {
    transcriber: ScriptedTranscriber,
    prompter: ScriptedPrompter,
    media: PlaceholderMedia,
    calendar: PlaceholderCalendar,
    player: Option<Arc<dyn MediaPlayer>>,
    weather: Option<Arc<dyn WeatherService>>,
    with_applications: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            transcriber: ScriptedTranscriber::new(),
            prompter: ScriptedPrompter::new(),
            media: PlaceholderMedia::new(),
            calendar: PlaceholderCalendar::new(),
            player: None,
            weather: None,
            with_applications: true,
        }
    }
}

/// Weather service that never answers.
struct StalledWeather;

#[async_trait::async_trait]
impl WeatherService for StalledWeather {
    async fn current(&self, _place: &str) -> CoreResult<String> {
        std::future::pending().await
    }
}

/// Player that reports playback but never completes a command.
struct StalledPlayer;

#[async_trait::async_trait]
impl MediaPlayer for StalledPlayer {
    async fn run(&self, command: MediaCommand) -> CoreResult<String> {
        match command {
            MediaCommand::Status => Ok("Playing".to_string()),
            _ => std::future::pending().await,
        }
    }
}

fn harness(setup: Setup) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("teodoro=debug")
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(KnowledgeStore::open_path(dir.path().join("kb")).unwrap());
    seed_from_str(store.as_ref(), DEFAULT_SEED).unwrap();

    let lexicon = if setup.with_applications {
        Lexicon::load(store.as_ref(), "Teodoro").unwrap()
    } else {
        let general = store.find_many(GENERAL, &Filter::all()).unwrap();
        Lexicon::from_documents(&general, &[], "Teodoro").unwrap()
    };

    let speech = Arc::new(RecordingSpeech::new());
    let screen = Arc::new(RecordingScreen::new());
    let media = Arc::new(setup.media);
    let prompter = Arc::new(setup.prompter);
    let mut collab = Collaborators::with_placeholders(
        Arc::new(setup.transcriber),
        speech.clone(),
        screen.clone(),
        prompter.clone(),
    );
    collab.media = match setup.player {
        Some(player) => player,
        None => media.clone(),
    };
    collab.calendar = Arc::new(setup.calendar);
    if let Some(weather) = setup.weather {
        collab.weather = weather;
    }

    let dispatcher = Dispatcher::new(
        Arc::new(lexicon),
        store.clone(),
        collab,
        AssistantConfig::default(),
    )
    .unwrap();
    Harness {
        dispatcher,
        store,
        speech,
        screen,
        media,
        prompter,
        _dir: dir,
    }
}

#[tokio::test]
async fn time_request_speaks_current_hour_and_minute() {
    let mut h = harness(Setup::default());
    let before = Local::now().naive_local();
    let outcome = h.dispatcher.dispatch("Qué hora es").await;
    let after = Local::now().naive_local();

    assert_eq!(outcome.status, DispatchStatus::Handled);
    assert_eq!(outcome.intent, Some(Intent::Time));
    let expected: Vec<String> = [before, after]
        .iter()
        .map(|t| format!("Son las {} horas y {} minutos", t.format("%H"), t.format("%M")))
        .collect();
    let speech = outcome.speech.clone().unwrap();
    assert!(expected.contains(&speech), "unexpected speech {:?}", speech);
    assert_eq!(h.speech.spoken(), vec![speech]);
    assert_eq!(h.dispatcher.state(), DispatchState::Idle);
}

#[tokio::test(start_paused = true)]
async fn alarm_of_five_minutes_fires_after_300_seconds() {
    let mut h = harness(Setup::default());
    let outcome = h.dispatcher.dispatch("pon una alarma de 5 minutos").await;

    assert_eq!(outcome.status, DispatchStatus::Handled);
    assert_eq!(outcome.intent, Some(Intent::Alarm));
    assert!(outcome.display.unwrap().contains("300 segundos"));

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(!h.speech.spoken().iter().any(|s| s.starts_with("Riii")));

    tokio::time::sleep(Duration::from_secs(2)).await;
    let spoken = h.speech.spoken();
    assert!(spoken
        .iter()
        .any(|s| s == "Riiiiiiiiiing riiiiiiiiiing. Fin de la alarma de nombre Alarma"));
    assert!(h.screen.shown().iter().any(|s| s.contains("Fin de la alarma")));
    // The player was stopped, so playback is left alone.
    assert!(h.media.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn alarm_pauses_and_resumes_playing_music() {
    let mut h = harness(Setup {
        media: PlaceholderMedia::playing(),
        ..Setup::default()
    });
    h.dispatcher.dispatch("pon una alarma de 10 segundos").await;
    tokio::time::sleep(Duration::from_secs(11)).await;

    use teodoro_core::actions::media::MediaCommand;
    assert_eq!(h.media.commands(), vec![MediaCommand::Pause, MediaCommand::Play]);
}

#[tokio::test]
async fn play_without_player_table_is_denied_without_invoking_handler() {
    let mut h = harness(Setup {
        with_applications: false,
        ..Setup::default()
    });
    let first = h.dispatcher.dispatch("pon música").await;
    let second = h.dispatcher.dispatch("pon música").await;

    assert_eq!(first.intent, Some(Intent::Play));
    match &first.status {
        DispatchStatus::AuthDenied { missing } => {
            assert_eq!(missing, &vec!["spotify actions".to_string()])
        }
        other => panic!("expected denial, got {:?}", other),
    }
    assert_eq!(first, second);
    assert_eq!(first.display.as_deref(), Some(DENIAL_MESSAGE));
    assert!(h.media.commands().is_empty());
    assert_eq!(h.dispatcher.state(), DispatchState::Idle);
}

#[tokio::test]
async fn unmatched_command_is_retried_once_then_unrecognized() {
    let mut h = harness(Setup::default());

    let first = h.dispatcher.dispatch("xyzzy").await;
    assert_eq!(first.status, DispatchStatus::Retry);
    assert_eq!(h.dispatcher.state(), DispatchState::Retrying);

    let second = h.dispatcher.dispatch_repeat(Some("plugh")).await;
    assert_eq!(second.status, DispatchStatus::Unrecognized);
    assert_eq!(h.dispatcher.state(), DispatchState::Idle);

    assert_eq!(
        h.speech.spoken(),
        vec![RETRY_SPEECH, REPEAT_REQUEST, UNRECOGNIZED_SPEECH]
    );
}

#[tokio::test]
async fn silent_repeat_is_unrecognized() {
    let mut h = harness(Setup::default());
    h.dispatcher.dispatch("xyzzy").await;
    let outcome = h.dispatcher.dispatch_repeat(None).await;
    assert_eq!(outcome.status, DispatchStatus::Unrecognized);
}

#[tokio::test]
async fn matching_repeat_is_dispatched() {
    let mut h = harness(Setup::default());
    h.dispatcher.dispatch("xyzzy").await;
    let outcome = h.dispatcher.dispatch_repeat(Some("dime la hora")).await;
    assert_eq!(outcome.intent, Some(Intent::Time));
    assert_eq!(outcome.status, DispatchStatus::Handled);
}

#[tokio::test]
async fn due_reminder_fires_once_and_is_deleted() {
    let h = harness(Setup::default());
    let now = Local::now().naive_local();
    let today = now.date().format("%Y-%m-%d").to_string();
    let tomorrow = (now.date() + ChronoDuration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    let book = ReminderBook::new(h.store.as_ref());
    for (name, date) in [("cita", today.as_str()), ("mañana", tomorrow.as_str())] {
        book.create(&Reminder {
            owner: "usuario".to_string(),
            name: name.to_string(),
            date: date.to_string(),
            time: "00:00".to_string(),
        })
        .unwrap();
    }

    assert_eq!(h.dispatcher.check_reminders(now), 1);
    assert_eq!(
        h.speech.spoken(),
        vec!["Tienes un recordatorio para esta hora de nombre cita"]
    );
    assert_eq!(h.dispatcher.check_reminders(now), 0);
    assert_eq!(h.speech.spoken().len(), 1);
    assert_eq!(h.store.count(REMINDERS).unwrap(), 1);
}

#[tokio::test]
async fn farewell_terminates_and_rejects_later_commands() {
    let mut h = harness(Setup::default());
    let bye = h.dispatcher.dispatch("adiós").await;
    assert_eq!(bye.status, DispatchStatus::Terminate);
    assert_eq!(bye.speech.as_deref(), Some("Adiós usuario, que tenga un buen día"));
    assert!(h.dispatcher.is_shutting_down());

    let after = h.dispatcher.dispatch("qué hora es").await;
    assert_eq!(after.status, DispatchStatus::Terminate);
    assert_eq!(after.intent, None);
    assert_eq!(h.speech.spoken().len(), 1);
}

#[tokio::test]
async fn secret_is_whispered_and_voice_restored() {
    let mut h = harness(Setup::default());
    h.dispatcher.dispatch("cuéntame un secreto").await;
    let spoken = h.speech.spoken_with_voice();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].1, "spanish+whisper");
    assert_eq!(h.speech.current_voice(), "spanish+m3");
}

#[tokio::test]
async fn invalid_user_action_reports_code_one() {
    let mut h = harness(Setup::default());
    let outcome = h.dispatcher.dispatch("usuario de nombre ana").await;
    assert_eq!(outcome.status, DispatchStatus::Failed(ErrorCode::InvalidUserAction));
    assert!(outcome.display.unwrap().contains("'Nuevo' usuario"));
}

#[tokio::test]
async fn math_is_evaluated() {
    let mut h = harness(Setup::default());
    let outcome = h.dispatcher.dispatch("cuánto es 2 más 3").await;
    assert_eq!(outcome.speech.as_deref(), Some("5"));
}

#[tokio::test]
async fn calendar_failures_map_to_messages() {
    let mut h = harness(Setup {
        calendar: PlaceholderCalendar::unavailable(),
        ..Setup::default()
    });
    h.dispatcher.session_mut().calendars.personal = Some("primary".to_string());

    let malformed = h.dispatcher.dispatch("muéstrame mis eventos").await;
    assert_eq!(
        malformed.status,
        DispatchStatus::Failed(ErrorCode::MalformedCalendarRequest)
    );

    let too_far = h
        .dispatcher
        .dispatch("muéstrame mis eventos de las próximas 20000000 semanas")
        .await;
    assert_eq!(
        too_far.status,
        DispatchStatus::Failed(ErrorCode::MalformedCalendarRequest)
    );

    let denied_api = h.dispatcher.dispatch("muéstrame mis eventos para mañana").await;
    assert_eq!(
        denied_api.status,
        DispatchStatus::Failed(ErrorCode::ServiceUnavailable)
    );
    assert_eq!(denied_api.speech.as_deref(), Some(CALENDAR_FAILURE_SPEECH));
    assert_eq!(h.dispatcher.state(), DispatchState::Idle);
}

#[tokio::test]
async fn calendar_without_ids_is_denied() {
    let mut h = harness(Setup::default());
    let outcome = h.dispatcher.dispatch("muéstrame mis eventos para mañana").await;
    assert!(matches!(outcome.status, DispatchStatus::AuthDenied { .. }));
}

#[tokio::test]
async fn failing_player_reports_code_five() {
    let mut h = harness(Setup {
        media: PlaceholderMedia::new().failing(),
        ..Setup::default()
    });
    let outcome = h.dispatcher.dispatch("siguiente canción").await;
    assert_eq!(outcome.status, DispatchStatus::Failed(ErrorCode::MediaPlayer));
}

#[tokio::test]
async fn login_switches_session_and_new_information_is_stored() {
    let setup = Setup {
        prompter: ScriptedPrompter::with_replies([
            PromptReply::Login(LoginForm {
                name: "ana".to_string(),
                password: "clave".to_string(),
                phone: false,
            }),
            PromptReply::Text("color".to_string()),
            PromptReply::Text("azul".to_string()),
        ]),
        ..Setup::default()
    };
    let mut h = harness(setup);
    {
        let users = UserDirectory::new(h.store.as_ref());
        users.create("ana").unwrap();
        users.set_password("ana", "clave").unwrap();
    }

    let reply = h.dispatcher.login(true).await.unwrap();
    assert_eq!(h.dispatcher.session().user, "ana");
    assert!(reply.display.unwrap().contains("Bienvenido ana"));

    let outcome = h.dispatcher.dispatch("apunta una nueva información").await;
    assert_eq!(outcome.status, DispatchStatus::Handled);
    let info = UserDirectory::new(h.store.as_ref()).public_info("ana").unwrap();
    assert!(info.contains(&("color".to_string(), "azul".to_string())));
}

#[tokio::test]
async fn failed_first_login_falls_back_to_default_user() {
    let setup = Setup {
        prompter: ScriptedPrompter::with_replies([PromptReply::Login(LoginForm {
            name: "nadie".to_string(),
            password: "x".to_string(),
            phone: false,
        })]),
        ..Setup::default()
    };
    let mut h = harness(setup);
    let reply = h.dispatcher.login(true).await.unwrap();
    assert_eq!(h.dispatcher.session().user, "usuario");
    assert!(reply.display.unwrap().starts_with("Has inicializado como usuario"));
}

#[tokio::test]
async fn default_user_cannot_set_password() {
    let setup = Setup {
        prompter: ScriptedPrompter::with_replies([PromptReply::Text("contraseña".to_string())]),
        ..Setup::default()
    };
    let mut h = harness(setup);
    let outcome = h.dispatcher.dispatch("apunta").await;
    assert_eq!(
        outcome.status,
        DispatchStatus::Failed(ErrorCode::DefaultUserPassword)
    );
}

#[tokio::test]
async fn assistant_runs_the_repeat_round() {
    let setup = Setup {
        transcriber: ScriptedTranscriber::new().with_repeats([Some("qué hora es")]),
        ..Setup::default()
    };
    let h = harness(setup);
    let mut assistant = teodoro_core::Assistant::new(h.dispatcher).unwrap();
    let outcome = assistant.handle_command("xyzzy").await;
    assert_eq!(outcome.intent, Some(Intent::Time));
    assert_eq!(h.speech.spoken()[..2], [RETRY_SPEECH, REPEAT_REQUEST]);
}

#[tokio::test(start_paused = true)]
async fn alarm_without_duration_asks_for_one() {
    let mut h = harness(Setup {
        prompter: ScriptedPrompter::with_replies([PromptReply::Duration {
            amount: 2,
            unit_seconds: 60,
        }]),
        ..Setup::default()
    });
    let outcome = h.dispatcher.dispatch("pon una alarma").await;
    assert_eq!(outcome.status, DispatchStatus::Handled);
    assert!(outcome.display.unwrap().contains("120 segundos"));

    let kinds: Vec<PromptKind> = h.prompter.requests().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![PromptKind::Duration, PromptKind::Text]);

    tokio::time::sleep(Duration::from_secs(121)).await;
    assert!(h
        .speech
        .spoken()
        .iter()
        .any(|s| s.ends_with("Fin de la alarma de nombre Alarma")));
}

#[tokio::test(start_paused = true)]
async fn cancelled_duration_prompt_uses_default() {
    let mut h = harness(Setup::default());
    let outcome = h.dispatcher.dispatch("pon un temporizador").await;
    assert_eq!(outcome.status, DispatchStatus::Handled);
    let expected = format!("{} segundos", DEFAULT_DURATION_SECS);
    assert!(outcome.display.unwrap().contains(&expected));
}

#[tokio::test(start_paused = true)]
async fn reminder_without_date_asks_for_one() {
    let day = chrono::NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
    let mut h = harness(Setup {
        prompter: ScriptedPrompter::with_replies([
            PromptReply::Text("comprar pan".to_string()),
            PromptReply::Hour("18:30".to_string()),
            PromptReply::Date(day),
        ]),
        ..Setup::default()
    });
    let outcome = h.dispatcher.dispatch("recuérdame algo").await;
    assert_eq!(outcome.status, DispatchStatus::Handled);

    let kinds: Vec<PromptKind> = h.prompter.requests().iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![PromptKind::Text, PromptKind::Hour, PromptKind::Date]);
    let stored = ReminderBook::new(h.store.as_ref()).for_user("usuario").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "comprar pan");
    assert_eq!(stored[0].date, "2030-01-02");
    assert_eq!(stored[0].time, "18:30");
}

#[tokio::test(start_paused = true)]
async fn stalled_service_times_out_as_service_failure() {
    let mut h = harness(Setup {
        weather: Some(Arc::new(StalledWeather)),
        ..Setup::default()
    });
    let outcome = h.dispatcher.dispatch("qué tiempo hace en madrid").await;
    assert_eq!(
        outcome.status,
        DispatchStatus::Failed(ErrorCode::ServiceUnavailable)
    );
    assert_eq!(h.dispatcher.state(), DispatchState::Idle);

    let next = h.dispatcher.dispatch("qué hora es").await;
    assert_eq!(next.status, DispatchStatus::Handled);
}

#[tokio::test(start_paused = true)]
async fn alarm_fires_even_when_the_player_stalls() {
    let mut h = harness(Setup {
        player: Some(Arc::new(StalledPlayer)),
        ..Setup::default()
    });
    h.dispatcher.dispatch("pon una alarma de 10 segundos").await;

    // Pause and resume each wait out the I/O timeout.
    let timeout = AssistantConfig::default().io_timeout();
    tokio::time::sleep(Duration::from_secs(11) + timeout * 2).await;
    assert!(h
        .speech
        .spoken()
        .iter()
        .any(|s| s.ends_with("Fin de la alarma de nombre Alarma")));
    assert!(h.screen.shown().iter().any(|s| s.contains("Fin de la alarma")));
}
