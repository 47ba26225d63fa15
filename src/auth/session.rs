use std::time::{Duration, Instant};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;

use super::jwt::issue_state_nonce;

pub const SESSION_COOKIE: &str = "sid";

/// How long a bound nonce stays usable. One consent round trip fits easily.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Per-session OAuth state, keyed by the `sid` cookie.
///
/// One slot per session: a new authorization-URL request overwrites the
/// previous nonce, so two concurrent OAuth flows from one session clobber
/// each other. Entries older than [`STATE_TTL`] are dropped on the next bind.
#[derive(Default)]
pub struct OAuthSessions {
    states: DashMap<String, (String, Instant)>,
}

impl OAuthSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_state(&self, session_id: &str, nonce: &str) {
        self.bind_state_at(session_id, nonce, Instant::now());
    }

    fn bind_state_at(&self, session_id: &str, nonce: &str, now: Instant) {
        self.states
            .retain(|_, (_, issued_at)| is_fresh(*issued_at, now));
        self.states
            .insert(session_id.to_string(), (nonce.to_string(), now));
    }

    /// Exact comparison against the bound nonce. A missing session or an
    /// expired nonce never matches.
    pub fn state_matches(&self, session_id: Option<&str>, candidate: &str) -> bool {
        self.state_matches_at(session_id, candidate, Instant::now())
    }

    fn state_matches_at(&self, session_id: Option<&str>, candidate: &str, now: Instant) -> bool {
        session_id
            .and_then(|sid| self.states.get(sid))
            .is_some_and(|bound| {
                let (nonce, issued_at) = bound.value();
                is_fresh(*issued_at, now) && nonce.as_str() == candidate
            })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.states.len()
    }
}

fn is_fresh(issued_at: Instant, now: Instant) -> bool {
    now.saturating_duration_since(issued_at) < STATE_TTL
}

pub fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Returns the caller's session id, issuing a fresh cookie when there is none.
pub fn ensure_session(jar: CookieJar) -> (CookieJar, String) {
    if let Some(sid) = session_id(&jar) {
        return (jar, sid);
    }
    let sid = issue_state_nonce();
    let cookie = Cookie::build((SESSION_COOKIE, sid.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), sid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_overwritten_per_session() {
        let sessions = OAuthSessions::new();
        sessions.bind_state("s1", "first");
        sessions.bind_state("s1", "second");
        assert!(!sessions.state_matches(Some("s1"), "first"));
        assert!(sessions.state_matches(Some("s1"), "second"));
        // Comparison does not consume the nonce.
        assert!(sessions.state_matches(Some("s1"), "second"));
    }

    #[test]
    fn unknown_or_missing_session_never_matches() {
        let sessions = OAuthSessions::new();
        sessions.bind_state("s1", "nonce");
        assert!(!sessions.state_matches(Some("s2"), "nonce"));
        assert!(!sessions.state_matches(None, "nonce"));
        assert!(!sessions.state_matches(None, ""));
    }

    #[test]
    fn expired_nonce_never_matches() {
        let sessions = OAuthSessions::new();
        let issued = Instant::now();
        sessions.bind_state_at("s1", "nonce", issued);
        assert!(sessions.state_matches_at(Some("s1"), "nonce", issued + STATE_TTL / 2));
        assert!(!sessions.state_matches_at(Some("s1"), "nonce", issued + STATE_TTL));
    }

    #[test]
    fn binding_prunes_expired_sessions() {
        let sessions = OAuthSessions::new();
        let issued = Instant::now();
        for i in 0..50 {
            sessions.bind_state_at(&format!("stale-{i}"), "nonce", issued);
        }
        assert_eq!(sessions.len(), 50);

        let later = issued + STATE_TTL + Duration::from_secs(1);
        sessions.bind_state_at("fresh", "nonce", later);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.state_matches_at(Some("fresh"), "nonce", later));
    }

    #[test]
    fn ensure_session_reuses_existing_cookie() {
        let (jar, sid) = ensure_session(CookieJar::new());
        assert_eq!(sid.len(), 64);
        let (_, again) = ensure_session(jar);
        assert_eq!(again, sid);
    }
}
