//! Authentication: login records, the cookie jar and the token exchange.
//!
//! The WebDAV session is identified by the `GDCAuthTT` cookie. In token mode
//! that cookie comes from exchanging the long-lived `GDCAuthSST` token at the
//! token endpoint; see [`TokenAuthenticator`].

mod cookies;
mod error;
mod login;
mod policy;
mod token;

pub use cookies::{Cookie, CookieJar};
pub use error::AuthenticationError;
pub use login::UserLogin;
pub use policy::{CookieOrigin, CookiePolicy, DefaultCookiePolicy, TokenPathCookiePolicy};
pub use token::{
    Authenticator, LONG_LIVED_TOKEN_COOKIE, LONG_LIVED_TOKEN_COOKIE_PATH, SESSION_TOKEN_COOKIE,
    TOKEN_PATH, TokenAuthenticator,
};
