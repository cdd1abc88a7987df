use anyhow::{Context, Result};
use reqwest::Url;
use strum::{Display, EnumString};

pub const DEFAULT_BASE_URL: &str = "https://sigaa.ufpb.br/sigaa/";
pub const DEFAULT_VINCULO: &str = "1";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// When to answer the "choose affiliation" page after logging in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AffiliationMode {
    /// Only when the login response is the affiliation page.
    #[default]
    Auto,
    Always,
    Never,
}

/// The portal pages the flow touches, all relative to one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: Url,
    pub vinculos: Url,
    pub summary: Url,
    pub data: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).with_context(|| format!("invalid base url {base:?}"))?;

        Ok(Self {
            login: base.join("index.jsf")?,
            vinculos: base.join("vinculos.jsf")?,
            summary: base.join("portal/discente/integralizacao/")?,
            data: base.join("portal/discente/integralizacao/dados/")?,
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        // DEFAULT_BASE_URL is a well-formed constant
        Self::new(DEFAULT_BASE_URL).unwrap()
    }
}
