use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("login rejected: the portal answered with the login form again")]
    LoginRejected,
    #[error("affiliation {wanted:?} is not offered by the portal (available: {available:?})")]
    UnknownAffiliation {
        wanted: String,
        available: Vec<String>,
    },
    #[error("component #{index} has no {field:?} field")]
    MissingField { index: usize, field: &'static str },
}
