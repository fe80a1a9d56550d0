//! Structured result of one dispatch.

use crate::lexicon::Intent;

pub const RETRY_SPEECH: &str = "Lo siento, no te he entendido";
pub const REPEAT_REQUEST: &str = "¿Puede repetir su petición?";
pub const UNRECOGNIZED_SPEECH: &str = "No he reconocido lo que ha dicho, lo siento";
pub const DENIAL_MESSAGE: &str = "Usted no tiene permiso \npara acceder a estas funcionalidades";

/// User-facing failure codes of handled-but-failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUserAction = 1,
    EmptyFieldName = 2,
    DefaultUserPassword = 3,
    UnknownField = 4,
    MediaPlayer = 5,
    MalformedCalendarRequest = 6,
    /// An external service failed or timed out.
    ServiceUnavailable = 7,
}

impl ErrorCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn title(self) -> &'static str {
        match self {
            ErrorCode::InvalidUserAction => "Petición de acción sobre usuario incorrecta.",
            ErrorCode::EmptyFieldName | ErrorCode::DefaultUserPassword => {
                "Petición de nueva información en usuario incorrecta."
            }
            ErrorCode::UnknownField => {
                "Petición de cambiar/eliminar información en usuario incorrecta."
            }
            ErrorCode::MediaPlayer => "Petición de acción sobre Spotify incorrecta.",
            ErrorCode::MalformedCalendarRequest => {
                "Petición de mostrar eventos del calendario incorrecta."
            }
            ErrorCode::ServiceUnavailable => "Servicio no disponible.",
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            ErrorCode::InvalidUserAction => {
                "Las acciones posibles son:\n - 'Nuevo' usuario\n - 'Cambiar' de usuario\n - 'Eliminar' usuario"
            }
            ErrorCode::EmptyFieldName => {
                "No se puede introducir un campo vacío\n en la Base de Conocimiento"
            }
            ErrorCode::DefaultUserPassword => {
                "No se puede poner una contraseña\n al usuario por defecto"
            }
            ErrorCode::UnknownField => "Debe especificar uno de los campos\n existentes en el usuario",
            ErrorCode::MediaPlayer => {
                "Parece haber algún problema con Spotify.\n Comprueba tu acceso a Spotify"
            }
            ErrorCode::MalformedCalendarRequest => {
                "La estructura debe ser:\n\n(Enséñame/muéstrame mis/mi) eventos/calendario/tareas\npara hoy/mañana/pasado mañana/'fecha'/\nesta-e/próxima-o/siguiente/X siguientes\nsemana/semanas/mes/meses"
            }
            ErrorCode::ServiceUnavailable => "Inténtelo de nuevo más tarde",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Handled,
    Unrecognized,
    AuthDenied { missing: Vec<String> },
    /// The transcript matched nothing; the caller may submit one repeat.
    Retry,
    Terminate,
    Failed(ErrorCode),
}

/// What a handler wants said and shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub speech: Option<String>,
    pub display: Option<String>,
    /// Speak with the whisper voice, then restore the current one.
    pub whisper: bool,
}

impl Reply {
    pub fn new(speech: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            speech: Some(speech.into()),
            display: Some(display.into()),
            whisper: false,
        }
    }

    pub fn speech(speech: impl Into<String>) -> Self {
        Self {
            speech: Some(speech.into()),
            ..Self::default()
        }
    }

    pub fn display(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
            ..Self::default()
        }
    }

    pub fn whispered(mut self) -> Self {
        self.whisper = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    pub intent: Option<Intent>,
    pub speech: Option<String>,
    pub display: Option<String>,
    pub whisper: bool,
}

impl DispatchOutcome {
    pub fn handled(intent: Intent, reply: Reply) -> Self {
        Self {
            status: DispatchStatus::Handled,
            intent: Some(intent),
            speech: reply.speech,
            display: reply.display,
            whisper: reply.whisper,
        }
    }

    pub fn retry() -> Self {
        Self {
            status: DispatchStatus::Retry,
            intent: None,
            speech: Some(RETRY_SPEECH.to_string()),
            display: None,
            whisper: false,
        }
    }

    pub fn unrecognized() -> Self {
        Self {
            status: DispatchStatus::Unrecognized,
            intent: None,
            speech: Some(UNRECOGNIZED_SPEECH.to_string()),
            display: None,
            whisper: false,
        }
    }

    pub fn denied(intent: Intent, missing: Vec<String>) -> Self {
        Self {
            status: DispatchStatus::AuthDenied { missing },
            intent: Some(intent),
            speech: None,
            display: Some(DENIAL_MESSAGE.to_string()),
            whisper: false,
        }
    }

    pub fn failed(intent: Intent, code: ErrorCode, reply: Reply) -> Self {
        Self {
            status: DispatchStatus::Failed(code),
            intent: Some(intent),
            speech: reply.speech,
            display: reply
                .display
                .or_else(|| Some(format!("{}\n{}", code.title(), code.detail()))),
            whisper: false,
        }
    }

    pub fn terminate(speech: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::Terminate,
            intent: Some(Intent::Del),
            speech: Some(speech.into()),
            display: None,
            whisper: false,
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: DispatchStatus::Terminate,
            intent: None,
            speech: None,
            display: None,
            whisper: false,
        }
    }

    pub fn is_retry(&self) -> bool {
        self.status == DispatchStatus::Retry
    }
}
