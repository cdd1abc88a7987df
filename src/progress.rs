use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumString;

use crate::error::PortalError;

/// Body of the `integralizacao/dados/` endpoint. Only `disciplinas` is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Integralizacao {
    pub disciplinas: Vec<CurriculumComponent>,
}

/// One curriculum component, kept field-for-field as the portal sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurriculumComponent(Map<String, Value>);

#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
pub enum Status {
    #[strum(serialize = "PENDENTE")]
    Pendente,
    #[strum(serialize = "CONCLUIDO")]
    Concluido,
    #[strum(serialize = "MATRICULADO")]
    Matriculado,
    #[strum(default)]
    Other(String),
}

/// Component names split by status, in portal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub pendentes: Vec<String>,
    pub concluidas: Vec<String>,
}

impl Integralizacao {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).context("unexpected integralizacao payload")
    }
}

impl CurriculumComponent {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn nome(&self) -> Option<&str> {
        self.0.get("nome").and_then(Value::as_str)
    }

    pub fn situacao(&self) -> Option<Status> {
        self.0
            .get("situacao")
            .and_then(Value::as_str)
            .map(|s| s.parse().unwrap_or_else(|_| Status::Other(s.to_string())))
    }
}

impl Progress {
    /// Statuses other than PENDENTE and CONCLUIDO are skipped.
    pub fn from_components(components: &[CurriculumComponent]) -> Result<Self> {
        let mut progress = Self::default();
        for (index, component) in components.iter().enumerate() {
            if !component.fields().contains_key("situacao") {
                return Err(PortalError::MissingField {
                    index,
                    field: "situacao",
                }
                .into());
            }
            let list = match component.situacao() {
                Some(Status::Pendente) => &mut progress.pendentes,
                Some(Status::Concluido) => &mut progress.concluidas,
                _ => continue,
            };
            let nome = match component.fields().get("nome") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(PortalError::MissingField {
                        index,
                        field: "nome",
                    }
                    .into())
                }
            };
            list.push(nome);
        }
        Ok(progress)
    }
}
