//! REST error codes: semantic failures that carry their own code next to a status.

use http::StatusCode;

macro_rules! rest_error_kinds {
    ($($variant:ident => $status:literal;)*) => {
        /// A REST error class.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum RestErrorKind {
            $($variant,)*
        }

        impl RestErrorKind {
            pub const ALL: &'static [RestErrorKind] = &[$(RestErrorKind::$variant,)*];

            pub const fn status_code(self) -> u16 {
                match self {
                    $(RestErrorKind::$variant => $status,)*
                }
            }

            /// REST code, e.g. `ResourceNotFound`.
            pub const fn rest_code(self) -> &'static str {
                match self {
                    $(RestErrorKind::$variant => stringify!($variant),)*
                }
            }

            /// Class name, e.g. `ResourceNotFoundError`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(RestErrorKind::$variant => concat!(stringify!($variant), "Error"),)*
                }
            }

            /// Parse a REST code as found in an error body.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $(stringify!($variant) => Some(RestErrorKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

rest_error_kinds! {
    BadDigest => 400;
    BadMethod => 405;
    Internal => 500;
    InvalidArgument => 409;
    InvalidContent => 400;
    InvalidCredentials => 401;
    InvalidHeader => 400;
    InvalidVersion => 400;
    MissingParameter => 409;
    NotAuthorized => 403;
    PreconditionFailed => 412;
    RequestExpired => 400;
    RequestThrottled => 429;
    ResourceNotFound => 404;
    WrongAccept => 406;
}

impl RestErrorKind {
    pub fn status(self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
