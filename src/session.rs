use anyhow::{Context, Result};
use derive_builder::Builder;
use reqwest::{header::REFERER, Client, Response, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    config::{AffiliationMode, Credentials, Endpoints, DEFAULT_VINCULO},
    error::PortalError,
    form::{self, Affiliation, AffiliationForm, Fields, LEGACY_VIEW_STATE},
    progress::Integralizacao,
};

/// Everything needed to log into one SIGAA deployment.
#[derive(Debug, Clone, Builder)]
pub struct SigaaPortal {
    credentials: Credentials,
    #[builder(default)]
    endpoints: Endpoints,
    /// Affiliation index posted on the "choose affiliation" page.
    #[builder(default = "DEFAULT_VINCULO.to_string()", setter(into))]
    vinculo: String,
    #[builder(default)]
    affiliation: AffiliationMode,
    #[builder(default, setter(strip_option))]
    timeout: Option<Duration>,
}

/// A cookie-carrying HTTP session against the portal.
#[derive(Debug)]
pub struct Session<'a> {
    portal: &'a SigaaPortal,
    client: Client,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOutcome {
    pub affiliation_submitted: bool,
    /// Affiliations the portal offered, if it asked for one.
    pub vinculos: Vec<Affiliation>,
}

impl SigaaPortal {
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn session(&self) -> Result<Session<'_>> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Session {
            portal: self,
            client: builder.build()?,
        })
    }
}

impl Session<'_> {
    /// GET the login page, POST the credentials, then answer the affiliation
    /// page when the portal shows one.
    pub async fn login(&self) -> Result<LoginOutcome> {
        let endpoints = &self.portal.endpoints;

        info!(url = %endpoints.login, "fetching login page");
        let page = self
            .client
            .get(endpoints.login.clone())
            .send()
            .await?
            .error_for_status()
            .context("failed to load login page")?
            .text()
            .await?;
        let view_state = form::view_state(&page).unwrap_or_else(|| {
            warn!("login page carries no view state, using {LEGACY_VIEW_STATE}");
            LEGACY_VIEW_STATE.to_string()
        });

        let credentials = &self.portal.credentials;
        info!(username = %credentials.username, "submitting credentials");
        let payload = form::login_payload(&credentials.username, &credentials.password, &view_state);
        let resp = self
            .post_form(&endpoints.login, &payload)
            .await
            .context("login request failed")?;
        let landed = resp.url().clone();
        let body = resp.text().await?;

        if form::is_login_form(&body) {
            return Err(PortalError::LoginRejected.into());
        }

        let parsed = AffiliationForm::parse(&body);
        let submit = match self.portal.affiliation {
            AffiliationMode::Auto => parsed.is_some() || is_vinculos_page(&landed),
            AffiliationMode::Always => true,
            AffiliationMode::Never => false,
        };
        if !submit {
            info!("no affiliation choice needed");
            return Ok(LoginOutcome::default());
        }

        let form = parsed.unwrap_or_else(|| AffiliationForm::legacy(form::view_state(&body)));
        let vinculo = &self.portal.vinculo;
        if !form.choices.is_empty() && form.choice(vinculo).is_none() {
            return Err(PortalError::UnknownAffiliation {
                wanted: vinculo.clone(),
                available: form.choices.iter().map(|c| c.value.clone()).collect(),
            }
            .into());
        }
        if form.view_state.is_none() {
            warn!("affiliation page carries no view state, using {LEGACY_VIEW_STATE}");
        }

        info!(%vinculo, offered = form.choices.len(), "choosing affiliation");
        self.post_form(&endpoints.vinculos, &form.payload(vinculo))
            .await
            .context("affiliation request failed")?;

        Ok(LoginOutcome {
            affiliation_submitted: true,
            vinculos: form.choices,
        })
    }

    /// Loads the summary page, then the JSON behind it.
    pub async fn fetch_components(&self) -> Result<Integralizacao> {
        let endpoints = &self.portal.endpoints;

        debug!(url = %endpoints.summary, "priming summary page");
        self.client
            .get(endpoints.summary.clone())
            .send()
            .await?
            .error_for_status()
            .context("failed to load integralizacao page")?;

        debug!(url = %endpoints.data, "fetching components");
        let body = self
            .client
            .get(endpoints.data.clone())
            .send()
            .await?
            .error_for_status()
            .context("failed to load integralizacao data")?
            .text()
            .await?;

        let data = Integralizacao::from_json(&body)?;
        info!(components = data.disciplinas.len(), "fetched curriculum components");
        Ok(data)
    }

    async fn post_form(&self, url: &Url, fields: &Fields) -> Result<Response> {
        debug!(
            %url,
            fields = ?fields.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "posting form"
        );
        let resp = self
            .client
            .post(url.clone())
            .header(REFERER, url.as_str())
            .form(fields)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp)
    }
}

fn is_vinculos_page(url: &Url) -> bool {
    url.path().ends_with("vinculos.jsf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_should_require_credentials() {
        assert!(SigaaPortalBuilder::default().build().is_err());
    }

    #[test]
    fn builder_should_apply_defaults() {
        let portal = SigaaPortalBuilder::default()
            .credentials(Credentials::new("aluno", "segredo"))
            .build()
            .unwrap();

        assert_eq!(portal.vinculo, "1");
        assert_eq!(portal.affiliation, AffiliationMode::Auto);
        assert_eq!(portal.timeout, None);
        assert_eq!(portal.endpoints(), &Endpoints::default());
        assert!(portal.session().is_ok());
    }

    #[test]
    fn vinculos_page_should_be_detected_by_path() {
        let url = Url::parse("https://sigaa.ufpb.br/sigaa/vinculos.jsf").unwrap();
        assert!(is_vinculos_page(&url));
        let url = Url::parse("https://sigaa.ufpb.br/sigaa/portais/discente/discente.jsf").unwrap();
        assert!(!is_vinculos_page(&url));
    }
}
