use anyhow::{anyhow, Context, Result};
use askama::Template;
use serde_json::{Map, Value};
use std::{fs, path::Path};
use strum::{Display, EnumString};
use tracing::info;

use crate::progress::{CurriculumComponent, Progress};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    /// `{"column": {"0": value, ...}}`, one object per column.
    #[default]
    Table,
    /// The `disciplinas` array as received.
    Records,
    /// Tab-separated, with a leading index column.
    Csv,
}

/// Column-oriented view of the components. Columns appear in first-seen
/// order; a record without some column gets `null` there.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Template)]
#[template(path = "report.md.j2", escape = "none")]
pub struct Report<'a> {
    pub total: usize,
    pub progress: &'a Progress,
}

impl Table {
    pub fn from_components(components: &[CurriculumComponent]) -> Self {
        let mut columns: Vec<String> = vec![];
        for component in components {
            for key in component.fields().keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = components
            .iter()
            .map(|component| {
                columns
                    .iter()
                    .map(|column| component.fields().get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut table = Map::new();
        for (i, column) in self.columns.iter().enumerate() {
            let cells = self
                .rows
                .iter()
                .enumerate()
                .map(|(row, values)| (row.to_string(), values[i].clone()))
                .collect::<Map<_, _>>();
            table.insert(column.clone(), Value::Object(cells));
        }
        Value::Object(table)
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(vec![]);

        let header = std::iter::once("").chain(self.columns.iter().map(String::as_str));
        writer.write_record(header)?;
        for (row, values) in self.rows.iter().enumerate() {
            let record = std::iter::once(row.to_string()).chain(values.iter().map(csv_cell));
            writer.write_record(record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush csv: {}", e.error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn render(components: &[CurriculumComponent], format: ExportFormat) -> Result<String> {
    let content = match format {
        ExportFormat::Table => serde_json::to_string(&Table::from_components(components).to_json())?,
        ExportFormat::Records => serde_json::to_string(components)?,
        ExportFormat::Csv => Table::from_components(components).to_csv()?,
    };
    Ok(content)
}

/// Writes the components to `path`, replacing whatever was there.
pub fn write(components: &[CurriculumComponent], format: ExportFormat, path: &Path) -> Result<()> {
    let content = render(components, format)?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), %format, components = components.len(), "exported components");
    Ok(())
}

impl<'a> Report<'a> {
    pub fn new(components: &[CurriculumComponent], progress: &'a Progress) -> Self {
        Self {
            total: components.len(),
            progress,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = self.render()?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote progress report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::progress::Integralizacao;

    fn sample() -> Vec<CurriculumComponent> {
        serde_json::from_value::<Integralizacao>(json!({
            "disciplinas": [
                {"nome": "Calculo I", "situacao": "CONCLUIDO", "cargaHoraria": 60},
                {"nome": "Fisica I", "situacao": "PENDENTE"}
            ]
        }))
        .unwrap()
        .disciplinas
    }

    #[test]
    fn table_should_fill_missing_cells() {
        let table = Table::from_components(&sample());

        assert_eq!(table.columns(), ["nome", "situacao", "cargaHoraria"]);
        assert_eq!(table.len(), 2);
        insta::assert_json_snapshot!(table.to_json(), @r###"
        {
          "nome": {
            "0": "Calculo I",
            "1": "Fisica I"
          },
          "situacao": {
            "0": "CONCLUIDO",
            "1": "PENDENTE"
          },
          "cargaHoraria": {
            "0": 60,
            "1": null
          }
        }
        "###);
    }

    #[test]
    fn empty_table_should_render_empty_object() {
        assert_eq!(render(&[], ExportFormat::Table).unwrap(), "{}");
        assert_eq!(render(&[], ExportFormat::Records).unwrap(), "[]");
        assert!(Table::from_components(&[]).is_empty());
    }

    #[test]
    fn records_should_keep_field_order() {
        let content = render(&sample(), ExportFormat::Records).unwrap();
        assert_eq!(
            content,
            r#"[{"nome":"Calculo I","situacao":"CONCLUIDO","cargaHoraria":60},{"nome":"Fisica I","situacao":"PENDENTE"}]"#
        );
    }

    #[test]
    fn csv_should_be_tab_separated_with_index() {
        let content = render(&sample(), ExportFormat::Csv).unwrap();
        let lines: Vec<_> = content.lines().collect();

        assert_eq!(lines[0], "\tnome\tsituacao\tcargaHoraria");
        assert_eq!(lines[1], "0\tCalculo I\tCONCLUIDO\t60");
        assert_eq!(lines[2], "1\tFisica I\tPENDENTE\t");
    }

    #[test]
    fn format_should_parse_from_cli_value() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::default().to_string(), "table");
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn report_should_list_both_categories() {
        let components = sample();
        let progress = Progress::from_components(&components).unwrap();
        let content = Report::new(&components, &progress).render().unwrap();

        assert!(content.contains("Componentes: 2"));
        assert!(content.contains("- Calculo I"));
        assert!(content.contains("- Fisica I"));
        let concluidos = content.find("## Concluídos").unwrap();
        let pendentes = content.find("## Pendentes").unwrap();
        assert!(concluidos < content.find("- Calculo I").unwrap());
        assert!(pendentes < content.find("- Fisica I").unwrap());
    }
}
