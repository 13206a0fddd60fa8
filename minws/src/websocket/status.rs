use std::{collections::HashMap, sync::OnceLock};

/// Close status codes from RFC 6455 section 7.4.1 and the IANA registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum CloseReason {
    Normal = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    NotAcceptable = 1003,
    Reserved = 1004,
    NoStatusCode = 1005,
    AbnormalClosure = 1006,
    InconsistentData = 1007,
    PolicyViolation = 1008,
    TooLarge = 1009,
    MissingExtension = 1010,
    UnexpectedCondition = 1011,
    ServiceRestart = 1012,
    TryAgainLater = 1013,
    BadGateway = 1014,
    TlsHandshakeFailure = 1015,
}

impl CloseReason {
    pub const ALL: [CloseReason; 16] = [
        CloseReason::Normal,
        CloseReason::GoingAway,
        CloseReason::ProtocolError,
        CloseReason::NotAcceptable,
        CloseReason::Reserved,
        CloseReason::NoStatusCode,
        CloseReason::AbnormalClosure,
        CloseReason::InconsistentData,
        CloseReason::PolicyViolation,
        CloseReason::TooLarge,
        CloseReason::MissingExtension,
        CloseReason::UnexpectedCondition,
        CloseReason::ServiceRestart,
        CloseReason::TryAgainLater,
        CloseReason::BadGateway,
        CloseReason::TlsHandshakeFailure,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.code() == code)
    }

    /// Gets the raw code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn text(&self) -> &'static str {
        match self {
            CloseReason::Normal => "Normal Closure",
            CloseReason::GoingAway => "Going Away",
            CloseReason::ProtocolError => "Protocol Error",
            CloseReason::NotAcceptable => "Not Acceptable",
            CloseReason::Reserved => "Reserved",
            CloseReason::NoStatusCode => "No Status Code",
            CloseReason::AbnormalClosure => "Abnormal Closure",
            CloseReason::InconsistentData => "Inconsistent Message Type",
            CloseReason::PolicyViolation => "Policy Violation",
            CloseReason::TooLarge => "Too Large",
            CloseReason::MissingExtension => "No Extension",
            CloseReason::UnexpectedCondition => "Unexpected Condition",
            CloseReason::ServiceRestart => "Service Restart",
            CloseReason::TryAgainLater => "Try Again Later",
            CloseReason::BadGateway => "Bad Gateway",
            CloseReason::TlsHandshakeFailure => "TLS Handshake Failure",
        }
    }
}

///Range the close code falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRange {
    /// Codes with a meaning in the registry
    Defined(CloseReason),

    /// Protocol range (1000-2999) without an assigned meaning
    Unassigned(u16),

    /// Codes registered with IANA by libraries and frameworks
    Registered(u16),

    /// Range reserved for private use
    Custom(u16),

    /// Below 1000 or above 4999, never valid on the wire
    Invalid(u16),
}

impl CodeRange {
    pub fn classify(code: u16) -> Self {
        match code {
            1000..=2999 => CloseReason::from_code(code)
                .map(Self::Defined)
                .unwrap_or(Self::Unassigned(code)),
            3000..=3999 => Self::Registered(code),
            4000..=4999 => Self::Custom(code),
            _ => Self::Invalid(code),
        }
    }

    /// Gets the raw code
    pub fn code(&self) -> u16 {
        match self {
            CodeRange::Defined(close_reason) => close_reason.code(),
            CodeRange::Unassigned(code)
            | CodeRange::Registered(code)
            | CodeRange::Custom(code)
            | CodeRange::Invalid(code) => *code,
        }
    }
}

/// Read-only lookup from close status code to its reason phrase.
///
/// Built once per process by [`StatusRegistry::global`] and shared by every connection.
#[derive(Debug)]
pub struct StatusRegistry {
    texts: HashMap<u16, &'static str>,
}

impl StatusRegistry {
    fn new() -> Self {
        Self {
            texts: CloseReason::ALL
                .into_iter()
                .map(|reason| (reason.code(), reason.text()))
                .collect(),
        }
    }

    pub fn global() -> &'static StatusRegistry {
        static REGISTRY: OnceLock<StatusRegistry> = OnceLock::new();
        REGISTRY.get_or_init(StatusRegistry::new)
    }

    /// Reason phrase for `code`, `None` when the registry doesn't know it
    pub fn text_for(&self, code: u16) -> Option<&'static str> {
        self.texts.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Shorthand for [`StatusRegistry::text_for`] on the global registry
pub fn status_text(code: u16) -> Option<&'static str> {
    StatusRegistry::global().text_for(code)
}
