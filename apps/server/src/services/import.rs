//! CodeSystem $import
//!
//! Ingests a batch of concepts and concept properties into the terminology
//! tables. One invocation runs on one connection under one transaction:
//! concepts are upserted first, then each property row is attached to its
//! concept, resolving property definitions on demand. A batch commits whole
//! or rolls back whole.
//!
//! Property resolution walks the CodeSystem's declared property list and
//! falls back to implicit hierarchy semantics: the code named by
//! `hierarchyMeaning` (or the literal `parent` when none is set) denotes
//! parent/child containment and is synthesized as a `code`-typed property.
//! Properties of type `code` are relationships; their value names another
//! concept in the same system, and the row links to it when it resolves.

use std::collections::HashMap;

use sqlx::{Postgres, Transaction};

use crate::{
    auth::Principal,
    db::terminology::{CodingPropertyRow, TerminologyRepository},
    models::{
        code_system::{CodeSystemRecord, PropertyDefinition},
        parameters::Parameters,
    },
    Error, Result,
};

/// Concept-property URI for synthesized parent definitions.
pub const PARENT_PROPERTY_URI: &str = "http://hl7.org/fhir/concept-properties#parent";

/// Property code that implies hierarchy when a CodeSystem declares no
/// `hierarchyMeaning` of its own.
pub const IMPLICIT_PARENT_CODE: &str = "parent";

/// FHIR property type marking an inter-concept relationship.
const RELATIONSHIP_TYPE: &str = "code";

#[derive(Debug, Clone)]
pub struct ImportedConcept {
    pub code: String,
    pub display: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportedProperty {
    /// Code of the concept the property attaches to.
    pub code: String,
    /// Property code, possibly implicit.
    pub property: String,
    /// Textual value; the target code for relationships.
    pub value: String,
}

/// A validated $import payload.
#[derive(Debug)]
pub struct ImportRequest {
    pub system: String,
    pub concepts: Vec<ImportedConcept>,
    pub properties: Vec<ImportedProperty>,
}

impl ImportRequest {
    pub fn from_parameters(params: &Parameters) -> Result<Self> {
        let mut system: Option<String> = None;
        for param in params.all("system") {
            let value = param.value_str().ok_or_else(|| {
                Error::Validation("Parameter 'system' must carry a uri value".to_string())
            })?;
            if system.replace(value.to_string()).is_some() {
                return Err(Error::Validation(
                    "Parameter 'system' must be provided exactly once".to_string(),
                ));
            }
        }
        let system = system.ok_or_else(|| {
            Error::Validation("Missing required parameter: system".to_string())
        })?;

        let mut concepts = Vec::new();
        for param in params.all("concept") {
            let coding = param.value().ok_or_else(|| {
                Error::Validation("Parameter 'concept' must carry a Coding value".to_string())
            })?;
            let code = coding.get("code").and_then(|v| v.as_str()).unwrap_or("");
            if code.is_empty() {
                return Err(Error::Validation(
                    "Concept code must be a non-empty string".to_string(),
                ));
            }
            let display = coding
                .get("display")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            concepts.push(ImportedConcept {
                code: code.to_string(),
                display,
            });
        }

        let mut properties = Vec::new();
        for param in params.all("property") {
            properties.push(ImportedProperty {
                code: required_part(param, "code")?,
                property: required_part(param, "property")?,
                value: required_part(param, "value")?,
            });
        }

        Ok(Self {
            system,
            concepts,
            properties,
        })
    }

    fn len(&self) -> usize {
        self.concepts.len() + self.properties.len()
    }
}

fn required_part(param: &crate::models::Parameter, name: &str) -> Result<String> {
    param
        .part_value_str(name)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Validation(format!(
                "Property group is missing required part: {name}"
            ))
        })
}

/// A resolved property definition: row id plus how the writer treats values.
#[derive(Debug, Clone, Copy)]
struct ResolvedProperty {
    id: i64,
    is_relationship: bool,
}

/// Per-call memoization of property resolution, keyed by
/// `system-url|property-code`. Plain string keys in an ordinary map; crafted
/// codes are just keys.
#[derive(Default)]
struct ResolutionCache {
    entries: HashMap<String, ResolvedProperty>,
}

impl ResolutionCache {
    fn key(system_url: &str, code: &str) -> String {
        format!("{}|{}", system_url, code)
    }

    fn get(&self, system_url: &str, code: &str) -> Option<ResolvedProperty> {
        self.entries.get(&Self::key(system_url, code)).copied()
    }

    fn insert(&mut self, system_url: &str, code: &str, resolved: ResolvedProperty) {
        self.entries.insert(Self::key(system_url, code), resolved);
    }
}

/// Row shape at the writer boundary; flattened into column bindings when the
/// insert is built.
#[derive(Debug)]
enum PropertyValue {
    Attribute { value: String },
    Relationship { value: String, target: Option<i64> },
}

impl PropertyValue {
    fn into_bindings(self) -> (String, Option<i64>) {
        match self {
            PropertyValue::Attribute { value } => (value, None),
            PropertyValue::Relationship { value, target } => (value, target),
        }
    }
}

#[derive(Clone)]
pub struct ImportService {
    repo: TerminologyRepository,
    max_batch: usize,
}

impl ImportService {
    pub fn new(repo: TerminologyRepository, max_batch: usize) -> Self {
        Self { repo, max_batch }
    }

    /// Run one import batch. On success the resolved CodeSystem resource is
    /// returned as the `return` output parameter.
    pub async fn import(&self, principal: &Principal, params: &Parameters) -> Result<Parameters> {
        if !principal.can_write_terminology() {
            return Err(Error::Forbidden(
                "CodeSystem $import requires elevated privileges".to_string(),
            ));
        }

        let request = ImportRequest::from_parameters(params)?;
        if request.len() > self.max_batch {
            return Err(Error::Validation(format!(
                "Import batch of {} rows exceeds the configured maximum of {}",
                request.len(),
                self.max_batch
            )));
        }

        let code_system = self.resolve_code_system(&request.system).await?;

        let mut tx = self.repo.begin().await?;
        match run_import(&mut tx, &code_system, &request).await {
            Ok(()) => {
                tx.commit().await.map_err(Error::Database)?;
                tracing::info!(
                    system = %code_system.url,
                    concepts = request.concepts.len(),
                    properties = request.properties.len(),
                    "CodeSystem import committed"
                );
            }
            Err(e) => {
                // Rollback also happens on drop; do it eagerly so the
                // connection returns to the pool clean.
                let _ = tx.rollback().await;
                tracing::warn!(system = %request.system, error = %e, "CodeSystem import rolled back");
                return Err(e);
            }
        }

        let mut out = Parameters::new();
        out.add_resource("return", code_system.resource);
        Ok(out)
    }

    async fn resolve_code_system(&self, url: &str) -> Result<CodeSystemRecord> {
        let mut matches = self.repo.find_code_systems_by_url(url).await?;
        if matches.is_empty() {
            return Err(Error::CodeSystemNotFound(url.to_string()));
        }
        if matches.len() > 1 {
            return Err(Error::AmbiguousCodeSystem(url.to_string()));
        }
        let (id, resource) = matches.remove(0);
        CodeSystemRecord::from_resource(id, resource)
    }
}

async fn run_import(
    tx: &mut Transaction<'_, Postgres>,
    code_system: &CodeSystemRecord,
    request: &ImportRequest,
) -> Result<()> {
    // Concepts first: properties may reference codes introduced by this
    // very batch, in any order.
    for concept in &request.concepts {
        TerminologyRepository::upsert_coding(
            tx,
            &code_system.id,
            &concept.code,
            concept.display.as_deref(),
        )
        .await?;
    }

    let mut cache = ResolutionCache::default();
    for imported in &request.properties {
        import_property(tx, code_system, imported, &mut cache).await?;
    }

    Ok(())
}

async fn import_property(
    tx: &mut Transaction<'_, Postgres>,
    code_system: &CodeSystemRecord,
    imported: &ImportedProperty,
    cache: &mut ResolutionCache,
) -> Result<()> {
    let coding_id = TerminologyRepository::find_coding_id(tx, &code_system.id, &imported.code)
        .await?
        .ok_or_else(|| {
            Error::UnknownCode(format!("{}|{}", code_system.url, imported.code))
        })?;

    let resolved = match cache.get(&code_system.url, &imported.property) {
        Some(resolved) => resolved,
        None => {
            let resolved = resolve_property(tx, code_system, &imported.property).await?;
            cache.insert(&code_system.url, &imported.property, resolved);
            resolved
        }
    };

    let value = if resolved.is_relationship {
        let target =
            TerminologyRepository::find_coding_id(tx, &code_system.id, &imported.value).await?;
        PropertyValue::Relationship {
            value: imported.value.clone(),
            target,
        }
    } else {
        PropertyValue::Attribute {
            value: imported.value.clone(),
        }
    };

    let (value, target) = value.into_bindings();
    TerminologyRepository::insert_coding_property(
        tx,
        &CodingPropertyRow {
            coding: coding_id,
            property: resolved.id,
            value,
            target,
        },
    )
    .await
}

/// Resolve a property code to its definition row, creating the row when the
/// definition exists only in the CodeSystem resource (or implicitly).
async fn resolve_property(
    tx: &mut Transaction<'_, Postgres>,
    code_system: &CodeSystemRecord,
    code: &str,
) -> Result<ResolvedProperty> {
    let definition = select_definition(code_system, code)?;
    let is_relationship = definition.property_type == RELATIONSHIP_TYPE;
    let id = ensure_property_row(tx, &code_system.id, &definition).await?;
    Ok(ResolvedProperty {
        id,
        is_relationship,
    })
}

/// Pick the definition for a property code: declared list first, then
/// implicit hierarchy semantics.
fn select_definition(code_system: &CodeSystemRecord, code: &str) -> Result<PropertyDefinition> {
    if let Some(declared) = code_system.declared_property(code) {
        return Ok(declared.clone());
    }

    if is_implicit_parent(code_system, code) {
        return Ok(PropertyDefinition {
            code: code.to_string(),
            uri: Some(PARENT_PROPERTY_URI.to_string()),
            property_type: RELATIONSHIP_TYPE.to_string(),
            description: None,
        });
    }

    Err(Error::UnknownProperty(code.to_string()))
}

fn is_implicit_parent(code_system: &CodeSystemRecord, code: &str) -> bool {
    match code_system.hierarchy_meaning.as_deref() {
        Some(hierarchy_meaning) => code == hierarchy_meaning,
        None => code == IMPLICIT_PARENT_CODE,
    }
}

/// Look up or lazily create the definition row. Concurrent importers racing
/// on the same `(system, code)` are settled by the unique constraint: a lost
/// insert returns no id and the row is re-read under the same transaction.
async fn ensure_property_row(
    tx: &mut Transaction<'_, Postgres>,
    system: &str,
    definition: &PropertyDefinition,
) -> Result<i64> {
    if let Some(id) = TerminologyRepository::find_property_id(tx, system, &definition.code).await? {
        return Ok(id);
    }

    if let Some(id) =
        TerminologyRepository::insert_property_definition(tx, system, definition).await?
    {
        return Ok(id);
    }

    TerminologyRepository::find_property_id(tx, system, &definition.code)
        .await?
        .ok_or_else(|| {
            Error::Internal(format!(
                "property definition '{}' disappeared during import",
                definition.code
            ))
        })
}
