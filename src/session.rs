//! Shared session state: authentication mode and the current login.
//!
//! A [`Session`] is shared (`Arc`) by every upload running against the same
//! account. It owns the one mutable piece of authentication state, the
//! current [`UserLogin`], and coalesces concurrent refreshes so a burst of
//! expired-session responses causes a single token exchange.
//!
//! Every stored login gets a generation number. A caller remembers the
//! generation it sent a request with; when that request comes back 401 it asks
//! for a refresh *past* that generation. If another task already refreshed,
//! the newer login is returned without a second exchange.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument};

use crate::auth::{AuthenticationError, Authenticator, TokenAuthenticator, UserLogin};
use crate::config::{AuthMode, ConfigError};

/// A login together with the generation it was stored under.
#[derive(Debug, Clone)]
pub struct LoginSnapshot {
    /// Monotonically increasing, starting at 1 for the first stored login.
    pub generation: u64,
    /// The login itself.
    pub login: Arc<UserLogin>,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<LoginSnapshot, AuthenticationError>>>;

struct InFlightRefresh {
    id: u64,
    future: RefreshFuture,
}

enum Credentials {
    Basic {
        username: String,
        password: String,
    },
    Token {
        long_lived_token: String,
        authenticator: Arc<dyn Authenticator>,
    },
}

// Lock order: `inflight` before `current`. Neither lock is held across an await.
#[derive(Default)]
struct LoginState {
    current: RwLock<Option<LoginSnapshot>>,
    inflight: Mutex<Option<InFlightRefresh>>,
    generations: AtomicU64,
    exchanges: AtomicU64,
    refresh_ids: AtomicU64,
}

impl LoginState {
    fn read_current(&self) -> Option<LoginSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, login: UserLogin) -> LoginSnapshot {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = LoginSnapshot {
            generation,
            login: Arc::new(login),
        };
        *current = Some(snapshot.clone());
        snapshot
    }

    fn inflight(&self) -> MutexGuard<'_, Option<InFlightRefresh>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Authentication mode plus the current login, shared across uploads.
pub struct Session {
    credentials: Credentials,
    state: Arc<LoginState>,
}

impl Session {
    /// Session using HTTP basic credentials; it never performs token exchanges.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Basic {
                username: username.into(),
                password: password.into(),
            },
            state: Arc::default(),
        }
    }

    /// Session in long-lived token mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyCredential`] for an empty token.
    pub fn token(
        long_lived_token: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ConfigError> {
        let long_lived_token = long_lived_token.into();
        if long_lived_token.trim().is_empty() {
            return Err(ConfigError::EmptyCredential {
                field: "long-lived token",
            });
        }
        Ok(Self {
            credentials: Credentials::Token {
                long_lived_token,
                authenticator,
            },
            state: Arc::default(),
        })
    }

    /// Builds a session from configuration, creating the HTTP token
    /// authenticator in token mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the token endpoint client cannot be built.
    pub fn from_auth_mode(
        auth: &AuthMode,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        match auth {
            AuthMode::Basic { username, password } => {
                Ok(Self::basic(username.clone(), password.clone()))
            }
            AuthMode::Token {
                long_lived_token,
                token_endpoint,
            } => {
                let authenticator = TokenAuthenticator::with_timeouts(
                    token_endpoint.clone(),
                    connect_timeout,
                    request_timeout,
                )?;
                Self::token(long_lived_token.clone(), Arc::new(authenticator))
            }
        }
    }

    /// True iff a long-lived token was configured, whether or not a login
    /// has succeeded yet.
    #[must_use]
    pub fn is_token_mode(&self) -> bool {
        matches!(self.credentials, Credentials::Token { .. })
    }

    /// Username and password in basic mode.
    #[must_use]
    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        match &self.credentials {
            Credentials::Basic { username, password } => Some((username, password)),
            Credentials::Token { .. } => None,
        }
    }

    /// The current login, if any.
    #[must_use]
    pub fn current_login(&self) -> Option<Arc<UserLogin>> {
        self.state.read_current().map(|snapshot| snapshot.login)
    }

    /// Generation of the current login, 0 when none has been stored.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read_current().map_or(0, |snapshot| snapshot.generation)
    }

    /// Runs `apply` against the current login while no refresh can replace it.
    ///
    /// Returns the generation `apply` saw (0 when there is no login, in which
    /// case `apply` is not called). Used to mirror the login into the cookie
    /// jar without racing a concurrent refresh into writing an older token.
    pub fn with_current_login<F>(&self, apply: F) -> u64
    where
        F: FnOnce(&LoginSnapshot),
    {
        let current = self
            .state
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(snapshot) => {
                apply(snapshot);
                snapshot.generation
            }
            None => 0,
        }
    }

    /// Replaces the current login as a whole; returns its new generation.
    pub fn set_current_login(&self, login: UserLogin) -> u64 {
        let snapshot = self.state.store(login);
        debug!(generation = snapshot.generation, "current login replaced");
        snapshot.generation
    }

    /// Number of token exchanges started by this session.
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.state.exchanges.load(Ordering::SeqCst)
    }

    /// Obtains a login newer than `observed_generation`.
    ///
    /// If the current login is already newer, it is returned immediately.
    /// Otherwise the caller joins the exchange in flight, or starts one.
    /// Every waiter of the same exchange gets the same result.
    ///
    /// The exchange runs on its own tokio task, so it completes and stores
    /// its login even if every waiter is cancelled.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime in token mode.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError::TokenModeDisabled`] in basic mode, or the
    /// exchange's error.
    #[instrument(skip(self))]
    pub async fn refresh(
        &self,
        observed_generation: u64,
    ) -> Result<LoginSnapshot, AuthenticationError> {
        let Credentials::Token {
            long_lived_token,
            authenticator,
        } = &self.credentials
        else {
            return Err(AuthenticationError::TokenModeDisabled);
        };

        let future = {
            let mut inflight = self.state.inflight();
            if let Some(current) = self.state.read_current()
                && current.generation > observed_generation
            {
                debug!(
                    generation = current.generation,
                    "login already refreshed by another task"
                );
                return Ok(current);
            }
            if let Some(existing) = inflight.as_ref() {
                debug!(refresh_id = existing.id, "joining token refresh in flight");
                existing.future.clone()
            } else {
                let id = self.state.refresh_ids.fetch_add(1, Ordering::SeqCst);
                let future = exchange(
                    id,
                    Arc::clone(&self.state),
                    Arc::clone(authenticator),
                    long_lived_token.clone(),
                );
                *inflight = Some(InFlightRefresh {
                    id,
                    future: future.clone(),
                });
                future
            }
        };

        future.await
    }
}

/// Clears the in-flight entry for `id` when the exchange task ends, however it ends.
struct ClearInFlight {
    id: u64,
    state: Arc<LoginState>,
}

impl Drop for ClearInFlight {
    fn drop(&mut self) {
        clear_if_current(&mut self.state.inflight(), self.id);
    }
}

fn clear_if_current(inflight: &mut Option<InFlightRefresh>, id: u64) {
    if inflight.as_ref().is_some_and(|refresh| refresh.id == id) {
        *inflight = None;
    }
}

fn exchange(
    id: u64,
    state: Arc<LoginState>,
    authenticator: Arc<dyn Authenticator>,
    long_lived_token: String,
) -> RefreshFuture {
    let task = tokio::spawn(async move {
        let guard = ClearInFlight {
            id,
            state: Arc::clone(&state),
        };
        state.exchanges.fetch_add(1, Ordering::SeqCst);
        info!(refresh_id = id, "exchanging long-lived token for a session token");
        let outcome = authenticator.authenticate(&long_lived_token).await;

        // Store and clear under one `inflight` lock so no caller sees neither.
        let mut inflight = state.inflight();
        let result = outcome.map(|login| state.store(login));
        clear_if_current(&mut inflight, id);
        drop(inflight);
        drop(guard);

        match &result {
            Ok(snapshot) => debug!(
                refresh_id = id,
                generation = snapshot.generation,
                "token refresh stored a new login"
            ),
            Err(error) => debug!(refresh_id = id, error = %error, "token refresh failed"),
        }
        result
    });

    async move {
        task.await.unwrap_or_else(|error| {
            Err(AuthenticationError::ExchangeAborted {
                reason: error.to_string(),
            })
        })
    }
    .boxed()
    .shared()
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.credentials {
            Credentials::Basic { .. } => "basic",
            Credentials::Token { .. } => "token",
        };
        f.debug_struct("Session")
            .field("mode", &mode)
            .field("generation", &self.generation())
            .field("exchanges", &self.exchange_count())
            .finish_non_exhaustive()
    }
}
