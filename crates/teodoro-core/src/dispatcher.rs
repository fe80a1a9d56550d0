//! Command dispatcher.
//!
//! Drives one transcript through Matching, Authorizing, Extracting, Executing and Reporting,
//! with at most one Retrying round for transcripts that match nothing. Every failure below the
//! dispatcher is turned into a [`DispatchOutcome`]; nothing here ends the main loop except the
//! farewell intent.

use crate::actions::alarm::{self, AlarmSpec, DEFAULT_ALARM_NAME};
use crate::actions::calendar::{self, CalendarKind, CalendarQuery, DEFAULT_EVENT_NAME};
use crate::actions::clock;
use crate::actions::math;
use crate::actions::media::{self, MediaCommand, MEDIA_ERROR_DISPLAY};
use crate::actions::phone::{PhoneCode, PhoneListener, EMERGENCY_SPEECH, PHONE_RELAY_SPEECH};
use crate::actions::reminder::{Reminder, ReminderBook, DEFAULT_REMINDER_NAME};
use crate::actions::search::{self, SearchEngine};
use crate::actions::system::PowerAction;
use crate::actions::users::{user_name_in, UserAction, UserDirectory, PASSWORD_FIELD};
use crate::actions::voice;
use crate::actions::weather;
use crate::collab::{Collaborators, NewEvent, PromptKind, PromptReply, PromptRequest};
use crate::config::AssistantConfig;
use crate::error::{CoreError, CoreResult};
use crate::extract::{tokenize, ArgumentResolver};
use crate::lexicon::{Intent, Lexicon, MissingTable};
use crate::matcher::match_intent;
use crate::outcome::{DispatchOutcome, DispatchStatus, ErrorCode, Reply, REPEAT_REQUEST};
use crate::session::{authorize, Authorization, SessionContext, UserRecord};
use crate::store::DocumentStore;
use chrono::{NaiveDateTime, NaiveTime};
use std::future::Future;
use std::sync::Arc;

const SECRET_SPEECH: &str = "En realidad, soy un extraterrestre en misión oficial, para poder estudiar a los humanos y observar su comportamiento";
const NOTHING_SPEECH: &str = "Vale, aquí no ha pasado nada";
const SERVICE_FAILURE_SPEECH: &str = "Parece que ha habido un problema, inténtelo más tarde";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Matching,
    /// Nothing matched; one repeat transcript is accepted.
    Retrying,
    Authorizing,
    Extracting,
    Executing,
    Reporting,
    /// Terminal. Every later command is rejected.
    ShuttingDown,
}

impl DispatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchState::Idle => "idle",
            DispatchState::Matching => "matching",
            DispatchState::Retrying => "retrying",
            DispatchState::Authorizing => "authorizing",
            DispatchState::Extracting => "extracting",
            DispatchState::Executing => "executing",
            DispatchState::Reporting => "reporting",
            DispatchState::ShuttingDown => "shutting_down",
        }
    }
}

/// Arguments of one intent, resolved before anything is executed.
#[derive(Debug)]
enum Action {
    Names,
    Greet,
    CheerUp,
    Secret,
    Today,
    Time,
    User { action: UserAction, name: String },
    NewInformation,
    Information,
    DelInformation,
    ChgInformation,
    ChangeVoice,
    Search { engine: SearchEngine, query: String, first_video: bool },
    Media(MediaCommand),
    Song,
    Weather { place: String },
    Alarm(AlarmSpec),
    Reminder(Reminder),
    Math { transcript: String },
    Phone { key: String },
    EmergencyCall,
    GetCalendar(CalendarQuery),
    SetCalendar(NewEvent),
    Power(PowerAction),
    Nothing,
}

/// A handler either replies or fails with a user-facing code.
enum Executed {
    Reply(Reply),
    Failed(ErrorCode),
}

impl From<Reply> for Executed {
    fn from(reply: Reply) -> Self {
        Executed::Reply(reply)
    }
}

pub struct Dispatcher {
    lexicon: Arc<Lexicon>,
    store: Arc<dyn DocumentStore>,
    collab: Collaborators,
    config: AssistantConfig,
    session: SessionContext,
    state: DispatchState,
    phone: Option<PhoneListener>,
}

impl Dispatcher {
    /// Starts logged in as the configured default user.
    pub fn new(
        lexicon: Arc<Lexicon>,
        store: Arc<dyn DocumentStore>,
        collab: Collaborators,
        config: AssistantConfig,
    ) -> CoreResult<Self> {
        let record = UserDirectory::new(store.as_ref())
            .find(&config.default_user)?
            .unwrap_or_else(|| UserRecord::new_default(config.default_user.clone()));
        let session = SessionContext::from_record(&record, false, Arc::clone(&lexicon));
        Ok(Self {
            lexicon,
            store,
            collab,
            config,
            session,
            state: DispatchState::Idle,
            phone: None,
        })
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == DispatchState::ShuttingDown
    }

    fn transition(&mut self, next: DispatchState) {
        if self.state != next {
            tracing::debug!(
                target: "teodoro::dispatch",
                from = self.state.as_str(),
                to = next.as_str(),
                "State transition"
            );
            self.state = next;
        }
    }

    /// Handles one command transcript and reports the result.
    pub async fn dispatch(&mut self, transcript: &str) -> DispatchOutcome {
        if self.is_shutting_down() {
            tracing::warn!(target: "teodoro::dispatch", "Command rejected while shutting down");
            return DispatchOutcome::rejected();
        }
        let outcome = self.run(transcript, false).await;
        self.report(&outcome);
        outcome
    }

    /// Handles the single repeat allowed after a `Retry`. A missing or unmatched repeat ends
    /// the attempt as `Unrecognized`.
    pub async fn dispatch_repeat(&mut self, transcript: Option<&str>) -> DispatchOutcome {
        if self.is_shutting_down() {
            return DispatchOutcome::rejected();
        }
        if self.state != DispatchState::Retrying {
            tracing::warn!(
                target: "teodoro::dispatch",
                state = self.state.as_str(),
                "Repeat submitted without a pending retry"
            );
        }
        let outcome = match transcript {
            Some(text) => self.run(text, true).await,
            None => DispatchOutcome::unrecognized(),
        };
        self.report(&outcome);
        outcome
    }

    async fn run(&mut self, transcript: &str, is_repeat: bool) -> DispatchOutcome {
        self.transition(DispatchState::Matching);
        let Some(intent) = match_intent(transcript, &self.lexicon) else {
            tracing::info!(
                target: "teodoro::dispatch",
                repeat = is_repeat,
                "Transcript matched no intent"
            );
            if is_repeat {
                return DispatchOutcome::unrecognized();
            }
            self.transition(DispatchState::Retrying);
            return DispatchOutcome::retry();
        };
        tracing::info!(target: "teodoro::dispatch", intent = %intent, "Intent matched");

        if intent == Intent::Del {
            self.transition(DispatchState::ShuttingDown);
            return DispatchOutcome::terminate(format!(
                "Adiós {}, que tenga un buen día",
                self.session.user
            ));
        }

        self.transition(DispatchState::Authorizing);
        if let Authorization::Denied { missing } = authorize(intent, &self.session) {
            let missing: Vec<String> = missing.iter().map(|f| f.name().to_string()).collect();
            tracing::info!(
                target: "teodoro::dispatch",
                intent = %intent,
                missing = ?missing,
                "Intent denied"
            );
            return DispatchOutcome::denied(intent, missing);
        }

        self.transition(DispatchState::Extracting);
        let action = match self.extract(intent, transcript) {
            Ok(action) => action,
            Err(code) => {
                tracing::info!(
                    target: "teodoro::dispatch",
                    intent = %intent,
                    code = code.code(),
                    "Arguments rejected"
                );
                return DispatchOutcome::failed(intent, code, Reply::default());
            }
        };

        self.transition(DispatchState::Executing);
        match self.execute(action).await {
            Ok(Executed::Reply(reply)) => DispatchOutcome::handled(intent, reply),
            Ok(Executed::Failed(code)) => DispatchOutcome::failed(intent, code, Reply::default()),
            Err(e) => self.failure(intent, e),
        }
    }

    /// Speaks and shows an outcome, then settles the state for the next command.
    fn report(&mut self, outcome: &DispatchOutcome) {
        let settled = match outcome.status {
            DispatchStatus::Retry => DispatchState::Retrying,
            DispatchStatus::Terminate => DispatchState::ShuttingDown,
            _ => DispatchState::Idle,
        };
        if settled != DispatchState::ShuttingDown {
            self.transition(DispatchState::Reporting);
        }
        let speech = self.collab.speech.as_ref();
        if let Some(text) = outcome.speech.as_deref() {
            if outcome.whisper {
                let previous = speech.current_voice();
                speech.set_voice(&speech.whisper_voice());
                speech.speak(text);
                speech.set_voice(&previous);
            } else {
                speech.speak(text);
            }
        }
        if outcome.status == DispatchStatus::Retry {
            speech.speak(REPEAT_REQUEST);
        }
        if let Some(text) = outcome.display.as_deref() {
            self.collab.screen.show(text);
        }
        self.transition(settled);
    }

    fn failure(&self, intent: Intent, error: CoreError) -> DispatchOutcome {
        tracing::error!(
            target: "teodoro::dispatch",
            intent = %intent,
            error = %error,
            handler = error.is_handler_failure(),
            "Intent execution failed"
        );
        match intent {
            Intent::Play
            | Intent::Next
            | Intent::Previous
            | Intent::Pause
            | Intent::Stop
            | Intent::Song => DispatchOutcome::failed(
                intent,
                ErrorCode::MediaPlayer,
                Reply::display(MEDIA_ERROR_DISPLAY),
            ),
            Intent::GetCalendar | Intent::SetCalendar => DispatchOutcome::failed(
                intent,
                ErrorCode::ServiceUnavailable,
                calendar::failure_reply(),
            ),
            _ => DispatchOutcome::failed(
                intent,
                ErrorCode::ServiceUnavailable,
                Reply::speech(SERVICE_FAILURE_SPEECH),
            ),
        }
    }

    /// Bounds a collaborator call by the configured I/O timeout.
    async fn bounded<T>(&self, call: impl Future<Output = CoreResult<T>>) -> CoreResult<T> {
        let limit = self.config.io_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout(limit)),
        }
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn extract(&self, intent: Intent, transcript: &str) -> Result<Action, ErrorCode> {
        let tokens = tokenize(transcript);
        let resolver = ArgumentResolver::new(&self.lexicon, self.collab.prompter.as_ref(), Self::now());
        let action = match intent {
            Intent::Name => Action::Names,
            Intent::Greetings => Action::Greet,
            Intent::CheerUp => Action::CheerUp,
            Intent::Secret => Action::Secret,
            Intent::Today => Action::Today,
            Intent::Time => Action::Time,
            Intent::Users => {
                let action = UserAction::parse(&tokens).ok_or(ErrorCode::InvalidUserAction)?;
                let name = match user_name_in(&tokens) {
                    Some(name) => name,
                    None => resolver.text("Introduce el nombre del usuario", None),
                };
                if name.is_empty() {
                    return Err(ErrorCode::InvalidUserAction);
                }
                Action::User { action, name }
            }
            Intent::NewInformation => Action::NewInformation,
            Intent::Information => Action::Information,
            Intent::DelInformation => Action::DelInformation,
            Intent::ChgInformation => Action::ChgInformation,
            Intent::ChangeVoice => Action::ChangeVoice,
            Intent::Google | Intent::Wikipedia | Intent::Youtube => {
                let engine = SearchEngine::for_intent(intent).ok_or(ErrorCode::ServiceUnavailable)?;
                let query = if search::needs_prompt(transcript, engine) {
                    resolver.text("Introduce tu búsqueda", None)
                } else {
                    search::clean_query(transcript, engine)
                };
                Action::Search {
                    engine,
                    query,
                    first_video: search::opens_first_video(transcript, engine),
                }
            }
            Intent::Play | Intent::Next | Intent::Previous | Intent::Pause | Intent::Stop => {
                Action::Media(MediaCommand::for_intent(intent).ok_or(ErrorCode::MediaPlayer)?)
            }
            Intent::Song => Action::Song,
            Intent::Weather => {
                let place = match weather::place_in(transcript) {
                    Some(place) => place,
                    None => resolver.text(
                        "Introduce la localización",
                        Some(&self.config.default_location),
                    ),
                };
                Action::Weather { place }
            }
            Intent::Alarm => {
                let delay = resolver.duration(&tokens);
                let name = resolver.name(&tokens, "Introduce el nombre de la alarma", DEFAULT_ALARM_NAME);
                Action::Alarm(AlarmSpec::new(delay, &name))
            }
            Intent::Reminder => {
                let name = resolver.name(
                    &tokens,
                    "Introduce el nombre del recordatorio",
                    DEFAULT_REMINDER_NAME,
                );
                let time = resolver.hour("Introduce la hora del recordatorio");
                let date = resolver.date(&tokens, "para", "Introduce la fecha del recordatorio");
                Action::Reminder(Reminder {
                    owner: self.session.user.clone(),
                    name,
                    date: date.format("%Y-%m-%d").to_string(),
                    time,
                })
            }
            Intent::Math => Action::Math {
                transcript: transcript.to_string(),
            },
            Intent::Phone => Action::Phone {
                key: self.session.phone_macro.clone().unwrap_or_default(),
            },
            Intent::EmergencyCall => Action::EmergencyCall,
            Intent::GetCalendar => {
                let query = calendar::parse_query(
                    transcript,
                    self.lexicon.numbers(),
                    self.lexicon.months(),
                    resolver.now().date(),
                )
                .ok_or(ErrorCode::MalformedCalendarRequest)?;
                Action::GetCalendar(query)
            }
            Intent::SetCalendar => Action::SetCalendar(self.event_draft(&resolver, &tokens)),
            Intent::Shutdown | Intent::Suspend | Intent::Restart => {
                Action::Power(PowerAction::for_intent(intent).ok_or(ErrorCode::ServiceUnavailable)?)
            }
            Intent::Nothing => Action::Nothing,
            // Handled before authorization.
            Intent::Del => Action::Nothing,
        };
        Ok(action)
    }

    fn event_draft(&self, resolver: &ArgumentResolver<'_>, tokens: &[String]) -> NewEvent {
        let date = resolver.date(tokens, "para", "Introduce la fecha del evento");
        let hour = resolver.hour("Introduce la hora del evento");
        let time = NaiveTime::parse_from_str(&hour, "%H:%M").unwrap_or_else(|_| resolver.now().time());
        let summary = calendar::title_case(&resolver.name(
            tokens,
            "Introduce el nombre del evento",
            DEFAULT_EVENT_NAME,
        ));
        let request = PromptRequest::new(PromptKind::EventDetails, "Detalles del evento", None);
        let (description, location) = match self.collab.prompter.prompt(request) {
            PromptReply::EventDetails {
                description,
                location,
            } => (description, location),
            _ => (String::new(), String::new()),
        };
        NewEvent {
            summary,
            start: date.and_time(time),
            description,
            location,
        }
    }

    async fn execute(&mut self, action: Action) -> CoreResult<Executed> {
        let user = self.session.user.clone();
        let executed: Executed = match action {
            Action::Names => clock::tell_names(self.lexicon.names()).into(),
            Action::Greet => {
                Reply::speech(format!("Hola {}, aquí estoy para lo que necesite.", user)).into()
            }
            Action::CheerUp => {
                Reply::speech(format!("Ánimo {}, no se preocupe", user)).into()
            }
            Action::Secret => Reply::speech(SECRET_SPEECH).whispered().into(),
            Action::Today => {
                let today = Self::now().date();
                let reply = match (self.lexicon.days(), self.lexicon.months()) {
                    (Some(days), Some(months)) => clock::tell_day(today, days, months),
                    _ => None,
                };
                reply
                    .unwrap_or_else(|| Reply::display(MissingTable::Days.notice()))
                    .into()
            }
            Action::Time => clock::tell_time(Self::now()).into(),
            Action::User { action, name } => self.user_action(action, &name).await?,
            Action::NewInformation => self.new_information()?,
            Action::Information => self.information()?,
            Action::DelInformation => self.delete_information()?,
            Action::ChgInformation => self.change_information()?,
            Action::ChangeVoice => {
                let speech = self.collab.speech.as_ref();
                speech.speak(&format!(
                    "Perfecto. Tiene {} voces para poder elegir",
                    self.config.max_voices
                ));
                let choice =
                    voice::choose_voice(speech, self.collab.transcriber.as_ref(), self.config.max_voices);
                voice::choice_reply(&choice).into()
            }
            Action::Search {
                engine,
                query,
                first_video,
            } => {
                let mut url = engine.results_url(&query)?;
                if first_video {
                    let page = self.bounded(self.collab.search.fetch(&url)).await?;
                    match search::first_video_id(&page) {
                        Some(id) => url = search::video_url(&id),
                        None => tracing::debug!(
                            target: "teodoro::dispatch",
                            "No video in results page; opening the results"
                        ),
                    }
                }
                self.bounded(self.collab.browser.open(&url)).await?;
                Reply::display(format!("Búsqueda en {}:\n{}", engine.name(), query)).into()
            }
            Action::Media(command) => {
                self.bounded(media::control(self.collab.media.as_ref(), command)).await?;
                Reply::default().into()
            }
            Action::Song => self.bounded(media::song_info(self.collab.media.as_ref())).await?.into(),
            Action::Weather { place } => {
                let raw = self.bounded(self.collab.weather.current(&place)).await?;
                weather::report_reply(&place, &weather::parse_report(&raw)).into()
            }
            Action::Alarm(spec) => {
                let reply = Reply::display(format!(
                    "Alarma programada\nen {} segundos",
                    spec.delay.as_secs()
                ));
                alarm::schedule(
                    spec,
                    self.collab.clone(),
                    self.lexicon.spotify_actions().is_some(),
                    self.config.io_timeout(),
                );
                reply.into()
            }
            Action::Reminder(reminder) => {
                ReminderBook::new(self.store.as_ref()).create(&reminder)?;
                reminder.created_reply().into()
            }
            Action::Math { transcript } => {
                let operations = self.lexicon.math_operations().unwrap_or_default();
                math::evaluate(&transcript, operations, self.lexicon.numbers()).into()
            }
            Action::Phone { key } => {
                self.bounded(self.collab.phone.send_key(&key)).await?;
                Reply::speech(PHONE_RELAY_SPEECH).into()
            }
            Action::EmergencyCall => {
                if let Some(url) = self.session.emergency_macro.url() {
                    self.bounded(self.collab.browser.open(url)).await?;
                }
                Reply::speech(EMERGENCY_SPEECH).into()
            }
            Action::GetCalendar(query) => {
                let id = query
                    .kind
                    .calendar_id(&self.session.calendars)
                    .ok_or_else(|| CoreError::handler("calendar", "no calendar id for request"))?
                    .to_string();
                let Some((from, to)) = query.window(Self::now().date()) else {
                    return Ok(Executed::Failed(ErrorCode::MalformedCalendarRequest));
                };
                let events = self.bounded(self.collab.calendar.events(&id, from, to)).await?;
                calendar::events_reply(&query, &events).into()
            }
            Action::SetCalendar(event) => {
                let calendars = &self.session.calendars;
                let id = CalendarKind::Events
                    .calendar_id(calendars)
                    .or_else(|| CalendarKind::Tasks.calendar_id(calendars))
                    .ok_or_else(|| CoreError::handler("calendar", "no calendar id for event"))?
                    .to_string();
                self.bounded(self.collab.calendar.create_event(&id, event)).await?;
                Reply::new("Evento creado correctamente", "Evento creado").into()
            }
            Action::Power(action) => {
                self.collab.speech.speak(action.speech());
                if action.ends_session() {
                    self.run_off_macro().await;
                }
                self.bounded(self.collab.power.apply(action)).await?;
                Reply::default().into()
            }
            Action::Nothing => Reply::speech(NOTHING_SPEECH).whispered().into(),
        };
        Ok(executed)
    }

    async fn user_action(&mut self, action: UserAction, name: &str) -> CoreResult<Executed> {
        let reply = match action {
            UserAction::New => {
                UserDirectory::new(self.store.as_ref()).create(name)?;
                Reply::new(
                    "Nuevo usuario creado",
                    format!("Nuevo usuario de nombre: {}\ncreado correctamente", name),
                )
            }
            UserAction::Change => self.login_as(name, false).await?,
            UserAction::Remove => {
                if UserDirectory::new(self.store.as_ref()).remove(name)? {
                    Reply::new("Usuario borrado", format!("Usuario: {}\nborrado", name))
                } else {
                    Reply::new("Ese usuario no existe", format!("Usuario: {}\nno encontrado", name))
                }
            }
        };
        Ok(reply.into())
    }

    fn new_information(&self) -> CoreResult<Executed> {
        let resolver = ArgumentResolver::new(&self.lexicon, self.collab.prompter.as_ref(), Self::now());
        let user = self.session.user.as_str();
        self.collab
            .speech
            .speak("Perfecto, dime primero cómo vamos a llamar esta nueva información");
        let field = resolver.text("Introduce el campo", None).to_lowercase();
        if field.is_empty() {
            return Ok(Executed::Failed(ErrorCode::EmptyFieldName));
        }
        let users = UserDirectory::new(self.store.as_ref());
        if field == PASSWORD_FIELD {
            if user == self.config.default_user {
                return Ok(Executed::Failed(ErrorCode::DefaultUserPassword));
            }
            let Some(password) = resolver.secret("Introduce la nueva contraseña") else {
                return Ok(Executed::Failed(ErrorCode::EmptyFieldName));
            };
            users.set_password(user, &password)?;
            return Ok(Reply::new("Contraseña cambiada", "Contraseña cambiada\ncorrectamente").into());
        }
        if field.starts_with('_') || field == "nombre" {
            return Ok(Executed::Failed(ErrorCode::UnknownField));
        }
        self.collab.speech.speak(&format!(
            "Bien, y ahora dime qué quieres que apunte sobre {}",
            field
        ));
        let value = resolver.text("Introduce el valor del campo", None);
        users.set_field(user, &field, &value)?;
        Ok(Reply::new("Nueva información guardada", "Información guardada").into())
    }

    fn information(&self) -> CoreResult<Executed> {
        let info = UserDirectory::new(self.store.as_ref()).public_info(&self.session.user)?;
        let speech = self.collab.speech.as_ref();
        speech.speak("Lo que sé de ti es: ");
        let mut lines = Vec::with_capacity(info.len());
        for (field, value) in &info {
            speech.speak(&format!("{} {}", field, value));
            lines.push(format!("{}: {}", field, value));
        }
        if lines.is_empty() {
            return Ok(Reply::new("Nada todavía", "Sin información").into());
        }
        Ok(Reply::display(lines.join("\n")).into())
    }

    fn delete_information(&self) -> CoreResult<Executed> {
        let users = UserDirectory::new(self.store.as_ref());
        let user = self.session.user.as_str();
        let fields: Vec<String> = users.public_info(user)?.into_iter().map(|(k, _)| k).collect();
        if fields.is_empty() {
            return Ok(Reply::speech("No hay campos que se puedan eliminar de tu usuario").into());
        }
        self.collab
            .speech
            .speak("Esta es la información que se puede eliminar de tu usuario");
        self.collab.screen.show(&fields.join("\n"));
        let resolver = ArgumentResolver::new(&self.lexicon, self.collab.prompter.as_ref(), Self::now());
        let field = resolver.text("¿Qué información deseas eliminar?", None).to_lowercase();
        if !fields.contains(&field) {
            return Ok(Executed::Failed(ErrorCode::UnknownField));
        }
        users.unset_field(user, &field)?;
        Ok(Reply::new("Información eliminada", "Información eliminada\ncorrectamente").into())
    }

    fn change_information(&self) -> CoreResult<Executed> {
        let users = UserDirectory::new(self.store.as_ref());
        let user = self.session.user.as_str();
        let info = users.public_info(user)?;
        if info.is_empty() {
            return Ok(Reply::speech("No hay campos que se puedan cambiar de tu usuario").into());
        }
        self.collab
            .speech
            .speak("Esta es la información que se puede cambiar de tu usuario");
        let listing: Vec<String> = info.iter().map(|(k, v)| format!("{} : {}", k, v)).collect();
        self.collab.screen.show(&listing.join("\n"));
        let resolver = ArgumentResolver::new(&self.lexicon, self.collab.prompter.as_ref(), Self::now());
        let field = resolver.text("¿Qué información deseas cambiar?", None).to_lowercase();
        if !info.iter().any(|(k, _)| *k == field) {
            return Ok(Executed::Failed(ErrorCode::UnknownField));
        }
        let value = resolver.text(&format!("Introduce aquí el nuevo valor de\n{}", field), None);
        users.set_field(user, &field, &value)?;
        Ok(Reply::new("Información cambiada", "Información cambiada\ncorrectamente").into())
    }

    /// Runs the login form. A failed first login falls back to the default user.
    pub async fn login(&mut self, first: bool) -> CoreResult<Reply> {
        let default_user = self.config.default_user.clone();
        self.login_as(&default_user, first).await
    }

    async fn login_as(&mut self, suggested: &str, first: bool) -> CoreResult<Reply> {
        let request = PromptRequest::new(PromptKind::Login, "Inicio de sesión", Some(suggested));
        let form = match self.collab.prompter.prompt(request) {
            PromptReply::Login(form) => Some(form),
            _ => None,
        };
        let users = UserDirectory::new(self.store.as_ref());
        let accepted = match &form {
            Some(form) => users
                .authenticate(&form.name, &form.password)?
                .map(|record| (record, form.phone)),
            None => None,
        };

        let Some((record, phone_requested)) = accepted else {
            if !first {
                return Ok(Reply::new(
                    "No se ha podido realizar el cambio de usuario",
                    "Operación denegada",
                ));
            }
            let record = users
                .find(&self.config.default_user)?
                .unwrap_or_else(|| UserRecord::new_default(self.config.default_user.clone()));
            self.start_session(&record, false).await;
            return Ok(Reply::display(format!(
                "Has inicializado como {}.\nBienvenido!",
                record.name
            )));
        };

        self.start_session(&record, phone_requested).await;
        if first {
            Ok(Reply::display(format!(
                "Inicialización correcta.\nBienvenido {}!",
                record.name
            )))
        } else {
            Ok(Reply::new("Cambio de usuario realizado", "Operación aceptada"))
        }
    }

    async fn start_session(&mut self, record: &UserRecord, phone_requested: bool) {
        self.session = SessionContext::from_record(record, phone_requested, Arc::clone(&self.lexicon));
        self.phone = None;
        tracing::info!(
            target: "teodoro::dispatch",
            user = %self.session.user,
            phone = self.session.phone_functions,
            "Session started"
        );
        if !self.session.phone_functions {
            return;
        }
        match PhoneListener::bind(self.config.phone_port).await {
            Ok(listener) => self.phone = Some(listener),
            Err(e) => {
                tracing::warn!(target: "teodoro::dispatch", error = %e, "Phone listener unavailable");
                self.session.phone_functions = false;
                return;
            }
        }
        if let Some(url) = self.session.on_macro.url().map(str::to_string) {
            if let Err(e) = self.bounded(self.collab.browser.open(&url)).await {
                tracing::warn!(target: "teodoro::dispatch", error = %e, "On-macro failed");
            }
        }
    }

    /// Opens the off-macro when phone functions are active.
    pub async fn run_off_macro(&self) {
        if !self.session.phone_functions {
            return;
        }
        if let Some(url) = self.session.off_macro.url() {
            if let Err(e) = self.bounded(self.collab.browser.open(url)).await {
                tracing::warn!(target: "teodoro::dispatch", error = %e, "Off-macro failed");
            }
        }
    }

    /// Announces and removes the reminders of the current user that are due at `now`.
    pub fn check_reminders(&self, now: NaiveDateTime) -> usize {
        let due = match ReminderBook::new(self.store.as_ref()).check_due(&self.session.user, now) {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(target: "teodoro::dispatch", error = %e, "Reminder check failed");
                return 0;
            }
        };
        for reminder in &due {
            let reply = reminder.due_reply();
            if let Some(text) = reply.speech.as_deref() {
                self.collab.speech.speak(text);
            }
            if let Some(text) = reply.display.as_deref() {
                self.collab.screen.show(text);
            }
        }
        due.len()
    }

    /// Handles every phone code received since the last poll.
    pub async fn poll_phone(&mut self) -> usize {
        if !self.session.phone_functions {
            return 0;
        }
        let codes = match &self.phone {
            Some(listener) => listener.drain(),
            None => return 0,
        };
        for code in &codes {
            match code {
                PhoneCode::On(key) => {
                    tracing::info!(target: "teodoro::dispatch", "Phone unlock key received");
                    self.session.phone_macro = Some(key.clone());
                }
                PhoneCode::LowBattery | PhoneCode::Charged => {
                    if let Some(notice) = code.notice(&self.session.user) {
                        self.collab.speech.speak(&notice);
                    }
                }
                PhoneCode::Emergency => {
                    if let Err(e) = self.bounded(self.collab.phone.play_emergency_audio()).await {
                        tracing::error!(target: "teodoro::dispatch", error = %e, "Emergency audio failed");
                    }
                }
                PhoneCode::Unknown(raw) => {
                    tracing::debug!(target: "teodoro::dispatch", code = %raw, "Unknown phone code");
                }
            }
        }
        codes.len()
    }

    /// Reminder and phone checks of one periodic tick.
    pub async fn periodic_check(&mut self, now: NaiveDateTime) -> usize {
        self.check_reminders(now) + self.poll_phone().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_are_stable() {
        assert_eq!(DispatchState::Idle.as_str(), "idle");
        assert_eq!(DispatchState::ShuttingDown.as_str(), "shutting_down");
        assert_ne!(DispatchState::Retrying, DispatchState::Matching);
    }
}
