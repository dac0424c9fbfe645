//! Deployment validation.
//!
//! Validation never fails; it produces findings. Any ERROR finding keeps the
//! VDB out of service until a later run comes back clean.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::composite::MergedView;
use crate::connector::{DataSourceProvider, TranslatorRegistry};
use crate::metadata::{MetadataStore, QueryMetadata, Table};
use crate::vdb::{ModelDef, VdbDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Model the finding is about; `None` for VDB-wide findings.
    pub model: Option<String>,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{} [{}] {}", self.severity, model, self.message),
            None => write!(f, "{} {}", self.severity, self.message),
        }
    }
}

/// Findings of the most recent validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, model: Option<&str>, message: impl Into<String>) {
        self.push(Severity::Error, model, message.into());
    }

    pub fn warning(&mut self, model: Option<&str>, message: impl Into<String>) {
        self.push(Severity::Warning, model, message.into());
    }

    fn push(&mut self, severity: Severity, model: Option<&str>, message: String) {
        self.findings.push(Finding {
            severity,
            model: model.map(str::to_string),
            message,
        });
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Checks a composite VDB's models, sources, and metadata.
pub struct Validator<'a> {
    translators: &'a TranslatorRegistry,
    data_sources: &'a dyn DataSourceProvider,
}

impl<'a> Validator<'a> {
    pub fn new(translators: &'a TranslatorRegistry, data_sources: &'a dyn DataSourceProvider) -> Self {
        Self {
            translators,
            data_sources,
        }
    }

    /// Validate a VDB.
    ///
    /// `own` is the VDB's own definition and `own_store` its own metadata;
    /// per-model structural checks apply only to those. Source bindings are
    /// checked for every physical model of the merged view.
    pub fn validate(
        &self,
        own: &VdbDefinition,
        own_store: &MetadataStore,
        view: &MergedView,
        metadata: &QueryMetadata,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        for model in own.models.iter().filter(|m| m.is_physical()) {
            self.check_own_bindings(model, &mut report);
        }
        for model in view.definition().models.iter().filter(|m| m.is_physical()) {
            self.check_sources(model, view, &mut report);
        }
        for handle in own_store.schemas() {
            let schema = handle.read();
            for table in &schema.tables {
                check_table(&schema.name, table, metadata, &mut report);
            }
        }

        report
    }

    fn check_own_bindings(&self, model: &ModelDef, report: &mut ValidationReport) {
        let name = Some(model.name.as_str());
        if model.sources.is_empty() {
            report.error(name, "physical model has no source binding");
            return;
        }
        if !model.multi_source && model.sources.len() > 1 {
            report.error(
                name,
                format!(
                    "model binds {} sources but is not multi-source",
                    model.sources.len()
                ),
            );
        }
        for binding in &model.sources {
            if !self.translators.contains(&binding.translator_name) {
                report.error(
                    name,
                    format!(
                        "source {} uses unknown translator {}",
                        binding.source_name, binding.translator_name
                    ),
                );
            }
        }
    }

    fn check_sources(&self, model: &ModelDef, view: &MergedView, report: &mut ValidationReport) {
        let name = Some(model.name.as_str());
        for binding in &model.sources {
            let Some(manager) = view.connectors().get(&binding.source_name) else {
                report.error(
                    name,
                    format!("source {} has no connector manager", binding.source_name),
                );
                continue;
            };
            match manager.connection_ref() {
                None => report.error(
                    name,
                    format!("source {} has no connection", binding.source_name),
                ),
                Some(connection) if !self.data_sources.is_available(connection) => report.error(
                    name,
                    format!(
                        "data source {} for source {} is not available",
                        connection, binding.source_name
                    ),
                ),
                Some(_) => {}
            }
        }
    }
}

fn check_table(schema: &str, table: &Table, metadata: &QueryMetadata, report: &mut ValidationReport) {
    let model = Some(schema);
    let qualified = format!("{}.{}", schema, table.name);

    if table.is_virtual && table.select_definition.is_none() {
        report.error(model, format!("view {} has no select definition", qualified));
    }

    if table.materialized {
        if let Some(target) = &table.materialized_table {
            let known = target
                .split_once('.')
                .is_some_and(|(target_schema, _)| metadata.schema(target_schema).is_some());
            if !known {
                report.error(
                    model,
                    format!(
                        "materialized view {} targets {} in an unknown schema",
                        qualified, target
                    ),
                );
            }
        }
    }

    if table.columns.is_empty() {
        report.warning(model, format!("table {} has no columns", qualified));
    } else {
        let mut seen = HashSet::new();
        for column in &table.columns {
            if !seen.insert(column.name.to_lowercase()) {
                report.error(
                    model,
                    format!("table {} declares column {} more than once", qualified, column.name),
                );
            }
        }
    }
}
