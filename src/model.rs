//! The input model (§3): a parsed, typed authorization schema. Producing
//! this is the job of the out-of-scope `.fga` surface parser; the compiler
//! only ever consumes it.

use serde::{Deserialize, Serialize};

/// An ordered list of type definitions. Order is preserved because it
/// determines the default iteration order used before dependency sorting
/// takes over (§5, determinism).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub types: Vec<TypeDefinition>,
}

impl Model {
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub relations: Vec<RelationDefinition>,
}

impl TypeDefinition {
    pub fn get_relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub name: String,

    /// Other relations on the *same type* whose holding also satisfies this
    /// one (`implied_by`).
    pub implied_by: Vec<String>,

    /// Tuple-to-userset references: `(relation, linking_relation)`, i.e.
    /// "this relation from `linking_relation`".
    pub parent_relations: Vec<(String, String)>,

    pub excluded_relations: Vec<String>,
    pub excluded_parent_relations: Vec<(String, String)>,
    pub excluded_intersection_groups: Vec<IntersectionGroup>,

    pub intersection_groups: Vec<IntersectionGroup>,

    /// Direct and userset subject references, e.g. `[user]`, `[user:*]`,
    /// `[group#member]`.
    pub subject_type_refs: Vec<SubjectTypeRef>,
}

/// A single entry of a `[...]` subject reference list on a relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectTypeRef {
    pub subject_type: String,
    /// Present for userset references (`type#relation`); `None` for a
    /// direct subject reference.
    pub subject_relation: Option<String>,
    pub wildcard: bool,
}

impl SubjectTypeRef {
    pub fn direct(subject_type: impl Into<String>) -> Self {
        SubjectTypeRef {
            subject_type: subject_type.into(),
            subject_relation: None,
            wildcard: false,
        }
    }

    pub fn wildcard(subject_type: impl Into<String>) -> Self {
        SubjectTypeRef {
            subject_type: subject_type.into(),
            subject_relation: None,
            wildcard: true,
        }
    }

    pub fn userset(subject_type: impl Into<String>, subject_relation: impl Into<String>) -> Self {
        SubjectTypeRef {
            subject_type: subject_type.into(),
            subject_relation: Some(subject_relation.into()),
            wildcard: false,
        }
    }

    pub fn is_userset(&self) -> bool {
        self.subject_relation.is_some()
    }
}

/// `all parts AND; groups within one relation OR`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntersectionGroup {
    pub relations: Vec<String>,
    pub parent_relations: Vec<(String, String)>,
    /// First exclusion per relation only; see §9(a) — multiple exclusions
    /// on the same relation within one intersection part are not
    /// representable and this limitation is preserved as-is.
    pub exclusions: std::collections::BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A hosting process typically hands the compiler a model loaded from
    /// JSON rather than constructed in Rust; this round-trips one to make
    /// sure the derived `Deserialize` impl matches what a parser would
    /// plausibly emit.
    #[test]
    fn model_round_trips_through_json() {
        let json = r#"{
            "types": [
                {
                    "name": "doc",
                    "relations": [
                        {
                            "name": "viewer",
                            "implied_by": [],
                            "parent_relations": [],
                            "excluded_relations": [],
                            "excluded_parent_relations": [],
                            "excluded_intersection_groups": [],
                            "intersection_groups": [],
                            "subject_type_refs": [
                                {"subject_type": "user", "subject_relation": null, "wildcard": false}
                            ]
                        }
                    ]
                }
            ]
        }"#;

        let model: Model = serde_json::from_str(json).unwrap();
        assert_eq!(model.types.len(), 1);
        let viewer = model.get_type("doc").unwrap().get_relation("viewer").unwrap();
        assert_eq!(viewer.subject_type_refs[0].subject_type, "user");

        let reserialized = serde_json::to_string(&model).unwrap();
        let roundtripped: Model = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(roundtripped.types.len(), model.types.len());
    }
}
