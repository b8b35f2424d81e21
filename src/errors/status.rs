//! Status-code error classes, one per 4xx/5xx status the framework names.

use http::StatusCode;

macro_rules! http_error_kinds {
    ($($variant:ident => $status:literal;)*) => {
        /// A definite HTTP status error class.
        ///
        /// `code()` is the class name without the `Error` suffix and is what
        /// goes into the `code` field of an error body.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum HttpErrorKind {
            $($variant,)*
        }

        impl HttpErrorKind {
            /// Every status class, in status order.
            pub const ALL: &'static [HttpErrorKind] = &[$(HttpErrorKind::$variant,)*];

            /// Numeric status code.
            pub const fn status_code(self) -> u16 {
                match self {
                    $(HttpErrorKind::$variant => $status,)*
                }
            }

            /// Machine-readable code, e.g. `NotFound`.
            pub const fn code(self) -> &'static str {
                match self {
                    $(HttpErrorKind::$variant => stringify!($variant),)*
                }
            }

            /// Class name, e.g. `NotFoundError`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(HttpErrorKind::$variant => concat!(stringify!($variant), "Error"),)*
                }
            }

            /// Look up the class for a status code.
            pub fn from_status(status: u16) -> Option<Self> {
                match status {
                    $($status => Some(HttpErrorKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

http_error_kinds! {
    BadRequest => 400;
    Unauthorized => 401;
    PaymentRequired => 402;
    Forbidden => 403;
    NotFound => 404;
    MethodNotAllowed => 405;
    NotAcceptable => 406;
    ProxyAuthenticationRequired => 407;
    RequestTimeout => 408;
    Conflict => 409;
    Gone => 410;
    LengthRequired => 411;
    RequestEntityTooLarge => 413;
    RequesturiTooLarge => 414;
    UnsupportedMediaType => 415;
    RequestedRangeNotSatisfiable => 416;
    ExpectationFailed => 417;
    ImATeapot => 418;
    UnprocessableEntity => 422;
    Locked => 423;
    FailedDependency => 424;
    UnorderedCollection => 425;
    UpgradeRequired => 426;
    PreconditionRequired => 428;
    TooManyRequests => 429;
    RequestHeaderFieldsTooLarge => 431;
    InternalServer => 500;
    NotImplemented => 501;
    BadGateway => 502;
    ServiceUnavailable => 503;
    GatewayTimeout => 504;
    HttpVersionNotSupported => 505;
    VariantAlsoNegotiates => 506;
    InsufficientStorage => 507;
    BandwidthLimitExceeded => 509;
    NotExtended => 510;
    NetworkAuthenticationRequired => 511;
}

impl HttpErrorKind {
    /// Status as an [`http::StatusCode`].
    pub fn status(self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
