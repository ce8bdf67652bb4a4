//! The working IR (§3): one [`RelationAnalysis`] per `(object_type,
//! relation)`, built by the [`crate::analyzer`], mutated in place by the
//! [`crate::propagate`] fixpoint pass in dependency order, then frozen
//! before emission.

use std::collections::BTreeMap;

use crate::model::IntersectionGroup;

#[derive(Debug, Clone, Default)]
pub struct Features {
    pub has_direct: bool,
    pub has_implied: bool,
    pub has_wildcard: bool,
    pub has_userset: bool,
    pub has_recursive: bool,
    pub has_exclusion: bool,
    pub has_intersection: bool,
}

impl Features {
    /// A relation is "closure-compatible" iff it has none of userset,
    /// recursive, exclusion, or intersection — i.e. it can be resolved by a
    /// single tuple lookup rather than a delegated function call.
    pub fn is_closure_compatible(&self) -> bool {
        !(self.has_userset || self.has_recursive || self.has_exclusion || self.has_intersection)
    }

    /// Needs a pl/pgsql body (as opposed to a plain SQL expression) — true
    /// for relations with recursive access paths, and for intersections
    /// (§4.8): the plain-SQL template has no `INTERSECT`-of-delegated-calls
    /// shape, only the pl/pgsql template's `AND`-of-`check_permission_internal`
    /// branch evaluates an intersection group at all.
    pub fn needs_pl_pgsql(&self) -> bool {
        self.has_recursive || self.has_intersection
    }
}

#[derive(Debug, Clone)]
pub struct UsersetPattern {
    pub subject_type: String,
    pub subject_relation: String,
    /// Filled in during propagation from the subject relation's own
    /// closure; `[subject_relation]` until then.
    pub satisfying_relations: Vec<String>,
    pub has_wildcard: bool,
    pub is_complex: bool,
    /// Set when this pattern was copied into a relation's closure
    /// aggregation (`closure_userset_patterns`) from another relation.
    pub is_closure_pattern: bool,
    pub source_relation: Option<String>,
}

impl UsersetPattern {
    pub fn new(subject_type: impl Into<String>, subject_relation: impl Into<String>) -> Self {
        let subject_relation = subject_relation.into();
        UsersetPattern {
            subject_type: subject_type.into(),
            satisfying_relations: vec![subject_relation.clone()],
            subject_relation,
            has_wildcard: false,
            is_complex: false,
            is_closure_pattern: false,
            source_relation: None,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.subject_type.clone(), self.subject_relation.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ParentRelationInfo {
    /// Name of the relation to check on the linked object (almost always
    /// equal to the owning relation's own name — see §4.1).
    pub relation: String,
    pub linking_relation: String,
    pub allowed_linking_types: Vec<String>,
}

#[derive(Debug, Clone, enum_as_inner::EnumAsInner)]
pub enum AnchorPathStep {
    Ttu {
        linking_relation: String,
        target_type: String,
        target_relation: String,
        all_target_types: Vec<String>,
        recursive_types: Vec<String>,
    },
    Userset {
        subject_type: String,
        subject_relation: String,
    },
}

#[derive(Debug, Clone)]
pub struct IndirectAnchor {
    pub path: Vec<AnchorPathStep>,
    pub anchor_type: String,
    pub anchor_relation: String,
}

#[derive(Debug, Clone)]
pub struct RelationAnalysis {
    pub object_type: String,
    pub relation: String,

    pub features: Features,

    pub satisfying_relations: Vec<String>,

    pub direct_subject_types: Vec<String>,
    pub allowed_subject_types: Vec<String>,

    pub excluded_relations: Vec<String>,
    pub excluded_parent_relations: Vec<(String, String)>,
    pub excluded_intersection_groups: Vec<IntersectionGroup>,
    /// `(relation, linking_relation, allowed_linking_types)` — the
    /// propagated form of `excluded_parent_relations`, resolved the same
    /// way as `parent_relations` (§4.5 step 3).
    pub excluded_parent_relations_resolved: Vec<(String, String, Vec<String>)>,

    pub userset_patterns: Vec<UsersetPattern>,
    pub parent_relations: Vec<ParentRelationInfo>,
    pub intersection_groups: Vec<IntersectionGroup>,

    pub simple_closure_relations: Vec<String>,
    pub complex_closure_relations: Vec<String>,
    pub closure_userset_patterns: Vec<UsersetPattern>,
    pub closure_parent_relations: Vec<ParentRelationInfo>,
    pub closure_excluded_relations: Vec<String>,
    pub simple_excluded_relations: Vec<String>,
    pub complex_excluded_relations: Vec<String>,

    pub indirect_anchor: Option<IndirectAnchor>,

    /// 0 = none; -1 = cycle; >=25 = exceeds limit.
    pub max_userset_depth: i64,
    pub exceeds_depth_limit: bool,
    pub self_referential_usersets: Vec<UsersetPattern>,
    pub has_self_referential_userset: bool,
    pub has_complex_userset_patterns: bool,

    pub can_generate: bool,
    pub can_generate_list_value: bool,
    pub cannot_generate_list_reason: String,

    /// Diagnostics only; never gates emission (§7, §9(b)).
    pub unknown_references: Vec<String>,
}

impl RelationAnalysis {
    pub fn new(object_type: impl Into<String>, relation: impl Into<String>) -> Self {
        RelationAnalysis {
            object_type: object_type.into(),
            relation: relation.into(),
            features: Features::default(),
            satisfying_relations: Vec::new(),
            direct_subject_types: Vec::new(),
            allowed_subject_types: Vec::new(),
            excluded_relations: Vec::new(),
            excluded_parent_relations: Vec::new(),
            excluded_intersection_groups: Vec::new(),
            excluded_parent_relations_resolved: Vec::new(),
            userset_patterns: Vec::new(),
            parent_relations: Vec::new(),
            intersection_groups: Vec::new(),
            simple_closure_relations: Vec::new(),
            complex_closure_relations: Vec::new(),
            closure_userset_patterns: Vec::new(),
            closure_parent_relations: Vec::new(),
            closure_excluded_relations: Vec::new(),
            simple_excluded_relations: Vec::new(),
            complex_excluded_relations: Vec::new(),
            indirect_anchor: None,
            max_userset_depth: 0,
            exceeds_depth_limit: false,
            self_referential_usersets: Vec::new(),
            has_self_referential_userset: false,
            has_complex_userset_patterns: false,
            can_generate: true,
            can_generate_list_value: false,
            cannot_generate_list_reason: String::new(),
            unknown_references: Vec::new(),
        }
    }

    pub fn node_key(&self) -> (String, String) {
        (self.object_type.clone(), self.relation.clone())
    }

    pub fn has_standalone_access(&self) -> bool {
        self.features.has_direct
            || self.features.has_implied
            || self.features.has_userset
            || self.features.has_recursive
    }
}

/// All analyses for the model, indexed by `(object_type, relation)` for
/// O(1) lookup during propagation, plus the original ordering used before
/// dependency sorting takes over.
#[derive(Debug, Default)]
pub struct AnalysisSet {
    pub by_key: BTreeMap<(String, String), RelationAnalysis>,
    pub order: Vec<(String, String)>,
}

impl AnalysisSet {
    pub fn get(&self, object_type: &str, relation: &str) -> Option<&RelationAnalysis> {
        self.by_key
            .get(&(object_type.to_string(), relation.to_string()))
    }

    pub fn get_mut(&mut self, object_type: &str, relation: &str) -> Option<&mut RelationAnalysis> {
        self.by_key
            .get_mut(&(object_type.to_string(), relation.to_string()))
    }

    pub fn insert(&mut self, analysis: RelationAnalysis) {
        let key = analysis.node_key();
        if !self.by_key.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.by_key.insert(key, analysis);
    }
}
