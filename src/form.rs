//! Inspection of the JSF pages served during login.
//!
//! The portal renders plain HTML forms whose postbacks must echo the
//! `javax.faces.ViewState` token issued with the page. The affiliation
//! ("vínculos") page lists each binding as a link whose `onclick` submits
//! the form with an extra `vinculo` parameter.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

pub const VIEW_STATE_FIELD: &str = "javax.faces.ViewState";
pub const VINCULO_FIELD: &str = "vinculo";
/// Token the portal historically accepted when none could be read.
pub const LEGACY_VIEW_STATE: &str = "j_id1";

const LEGACY_FORM_ID: &str = "j_id_jsp_1522167007_1";
const LEGACY_LINK_ID: &str = "j_id_jsp_1522167007_2";

static FORM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"getElementById\('([^']+)'\)").unwrap());
static JS_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)'\s*:\s*'([^']*)'").unwrap());

/// Ordered form fields, as posted.
pub type Fields = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affiliation {
    pub value: String,
    pub label: String,
    params: Fields,
}

/// The affiliation form, either read from the page or the legacy layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffiliationForm {
    pub hidden: Fields,
    pub view_state: Option<String>,
    pub choices: Vec<Affiliation>,
    extra: Fields,
}

/// Reads the view-state token anywhere in the document.
pub fn view_state(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    find_view_state(document.root_element())
}

/// Whether the page still asks for a password, i.e. the login did not go through.
pub fn is_login_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"input[name="form:senha"]"#).unwrap();
    document.select(&selector).next().is_some()
}

pub fn login_payload(username: &str, password: &str, view_state: &str) -> Fields {
    [
        ("form", "form"),
        ("form:width", "1920"),
        ("form:height", "1080"),
        ("form:login", username),
        ("form:senha", password),
        ("form:entrar", "Entrar"),
        (VIEW_STATE_FIELD, view_state),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl AffiliationForm {
    /// Parses the affiliation page. Returns `None` when the page offers no
    /// affiliation choice at all.
    pub fn parse(html: &str) -> Option<Self> {
        let document = Html::parse_document(html);
        let mut choices: Vec<Affiliation> = vec![];
        let mut form_id = None;

        for link in document.select(&Selector::parse("a[onclick]").unwrap()) {
            let onclick = link.value().attr("onclick").unwrap_or_default();
            let mut params: Fields = JS_PAIR
                .captures_iter(onclick)
                .map(|c| (c[1].to_string(), c[2].to_string()))
                .collect();
            let Some(pos) = params.iter().position(|(k, _)| k == VINCULO_FIELD) else {
                continue;
            };
            let (_, value) = params.remove(pos);
            if form_id.is_none() {
                form_id = FORM_ID.captures(onclick).map(|c| c[1].to_string());
            }
            if choices.iter().any(|c| c.value == value) {
                continue;
            }
            let label = link
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "tr")
                .map_or_else(|| text_of(link), text_of);
            choices.push(Affiliation {
                value,
                label,
                params,
            });
        }

        let input = Selector::parse(r#"input[name="vinculo"], select[name="vinculo"] option"#).unwrap();
        for node in document.select(&input) {
            let Some(value) = node.value().attr("value") else {
                continue;
            };
            if choices.iter().any(|c| c.value == value) {
                continue;
            }
            let label = match node.parent().and_then(ElementRef::wrap) {
                Some(parent) if node.value().name() == "input" => text_of(parent),
                _ => text_of(node),
            };
            choices.push(Affiliation {
                value: value.to_string(),
                label,
                params: vec![],
            });
        }

        let forms = Selector::parse("form").unwrap();
        let form = match &form_id {
            Some(id) => document
                .select(&forms)
                .find(|f| f.value().id() == Some(id.as_str())),
            None => document.select(&forms).find(|f| {
                f.select(&Selector::parse(r#"[name="vinculo"]"#).unwrap())
                    .next()
                    .is_some()
            }),
        };

        if choices.is_empty() && form.is_none() {
            return None;
        }

        let (hidden, view_state) = match form {
            Some(form) => (
                hidden_fields(form),
                find_view_state(form).or_else(|| find_view_state(document.root_element())),
            ),
            None => {
                let id = form_id.unwrap_or_else(|| LEGACY_FORM_ID.to_string());
                (
                    vec![(id.clone(), id)],
                    find_view_state(document.root_element()),
                )
            }
        };

        Some(Self {
            hidden,
            view_state,
            choices,
            extra: vec![],
        })
    }

    /// The fixed layout posted when the page could not be read.
    pub fn legacy(view_state: Option<String>) -> Self {
        Self {
            hidden: vec![(LEGACY_FORM_ID.to_string(), LEGACY_FORM_ID.to_string())],
            view_state,
            choices: vec![],
            extra: vec![(LEGACY_LINK_ID.to_string(), LEGACY_LINK_ID.to_string())],
        }
    }

    pub fn choice(&self, vinculo: &str) -> Option<&Affiliation> {
        self.choices.iter().find(|c| c.value == vinculo)
    }

    pub fn payload(&self, vinculo: &str) -> Fields {
        let mut fields = self.hidden.clone();
        fields.push((
            VIEW_STATE_FIELD.to_string(),
            self.view_state
                .clone()
                .unwrap_or_else(|| LEGACY_VIEW_STATE.to_string()),
        ));
        match self.choice(vinculo) {
            Some(choice) => fields.extend(choice.params.iter().cloned()),
            None => fields.extend(self.extra.iter().cloned()),
        }
        fields.push((VINCULO_FIELD.to_string(), vinculo.to_string()));
        fields
    }
}

fn find_view_state(root: ElementRef) -> Option<String> {
    let selector = Selector::parse(r#"input[name="javax.faces.ViewState"]"#).unwrap();
    root.select(&selector)
        .find_map(|node| node.value().attr("value"))
        .map(str::to_string)
}

fn hidden_fields(form: ElementRef) -> Fields {
    form.select(&Selector::parse(r#"input[type="hidden"]"#).unwrap())
        .filter_map(|node| {
            let name = node.value().attr("name")?;
            if name == VIEW_STATE_FIELD || name == VINCULO_FIELD {
                return None;
            }
            let value = node.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn text_of(node: ElementRef) -> String {
    node.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn field<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn view_state_should_be_read_from_login_page() {
        let content = fs::read_to_string("fixtures/login.html").unwrap();
        assert_eq!(view_state(&content).as_deref(), Some("j_id3"));
        assert!(is_login_form(&content));
    }

    #[test]
    fn view_state_should_be_none_without_input() {
        assert_eq!(view_state("<html><body><form></form></body></html>"), None);
    }

    #[test]
    fn login_payload_should_carry_fixed_fields() {
        let payload = login_payload("aluno", "segredo", "j_id9");
        let names: Vec<_> = payload.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            [
                "form",
                "form:width",
                "form:height",
                "form:login",
                "form:senha",
                "form:entrar",
                "javax.faces.ViewState"
            ]
        );
        assert_eq!(field(&payload, "form:login"), Some("aluno"));
        assert_eq!(field(&payload, "javax.faces.ViewState"), Some("j_id9"));
    }

    #[test]
    fn affiliation_page_should_list_choices() {
        let content = fs::read_to_string("fixtures/vinculos.html").unwrap();
        let form = AffiliationForm::parse(&content).unwrap();

        let values: Vec<_> = form.choices.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, ["1", "2"]);
        assert!(form.choices[0].label.contains("CIÊNCIA DA COMPUTAÇÃO"));
        assert_eq!(form.view_state.as_deref(), Some("j_id4"));
        assert!(!is_login_form(&content));
    }

    #[test]
    fn affiliation_payload_should_echo_page_fields() {
        let content = fs::read_to_string("fixtures/vinculos.html").unwrap();
        let form = AffiliationForm::parse(&content).unwrap();
        let payload = form.payload("2");

        assert_eq!(
            payload,
            vec![
                (
                    "j_id_jsp_1522167007_1".to_string(),
                    "j_id_jsp_1522167007_1".to_string()
                ),
                ("javax.faces.ViewState".to_string(), "j_id4".to_string()),
                (
                    "j_id_jsp_1522167007_2".to_string(),
                    "j_id_jsp_1522167007_2".to_string()
                ),
                ("vinculo".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn legacy_form_should_match_fixed_layout() {
        let payload = AffiliationForm::legacy(None).payload("1");
        assert_eq!(field(&payload, "j_id_jsp_1522167007_1"), Some("j_id_jsp_1522167007_1"));
        assert_eq!(field(&payload, "j_id_jsp_1522167007_2"), Some("j_id_jsp_1522167007_2"));
        assert_eq!(field(&payload, "javax.faces.ViewState"), Some("j_id1"));
        assert_eq!(field(&payload, "vinculo"), Some("1"));
    }

    #[test]
    fn portal_home_should_not_be_an_affiliation_page() {
        let content = fs::read_to_string("fixtures/discente.html").unwrap();
        assert!(AffiliationForm::parse(&content).is_none());
        assert!(!is_login_form(&content));
    }

    #[test]
    fn radio_inputs_should_count_as_choices() {
        let html = r#"<form id="escolha">
            <input type="hidden" name="escolha" value="escolha">
            <input type="hidden" name="javax.faces.ViewState" value="j_id2">
            <label><input type="radio" name="vinculo" value="1"> Graduação</label>
            <label><input type="radio" name="vinculo" value="2"> Mestrado</label>
        </form>"#;
        let form = AffiliationForm::parse(html).unwrap();

        assert_eq!(form.choices.len(), 2);
        assert_eq!(form.choices[1].label, "Mestrado");
        assert_eq!(
            form.payload("2"),
            vec![
                ("escolha".to_string(), "escolha".to_string()),
                ("javax.faces.ViewState".to_string(), "j_id2".to_string()),
                ("vinculo".to_string(), "2".to_string()),
            ]
        );
    }
}
