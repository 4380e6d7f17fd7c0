use std::fmt;

/// Bearer credential for the remote progress API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token. Blank input is not a credential and yields `None`.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// The two facts backend selection depends on, as reported by the auth layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionAuth {
    access_token: Option<AccessToken>,
    guest: bool,
}

impl SessionAuth {
    #[must_use]
    pub fn new(access_token: Option<AccessToken>, guest: bool) -> Self {
        Self {
            access_token,
            guest,
        }
    }

    #[must_use]
    pub fn authenticated(token: AccessToken) -> Self {
        Self::new(Some(token), false)
    }

    #[must_use]
    pub fn guest() -> Self {
        Self::new(None, true)
    }

    /// Neither a credential nor a guest flag.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.guest
    }
}
