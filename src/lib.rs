//! # melange-compiler
//!
//! Compiles a relationship-based authorization model into a family of
//! specialized SQL functions plus routing dispatchers, so that runtime
//! permission checks are answered by straight-line SQL shaped to each
//! relation rather than by walking the model at query time.
//!
//! The pipeline, leaf to root:
//! ```ascii
//!            Model
//!              │
//!    (1) validate          cycle::validate
//!              │
//!    (2) closure           closure::compute
//!              │
//!    (3) analyze           analyzer::analyze
//!              │
//!    (4) sort              depsort::sort
//!              │
//!    (5) propagate         propagate::run
//!              │
//!    (6) select + emit     template:: / emit::
//!              │
//!    (7) dispatch          dispatch::
//!              │
//!          Artifacts
//! ```
//!
//! [`compile`] runs the whole pipeline. Everything up to and including
//! step 5 is infallible given a model that passed validation; the only
//! failure mode is [`error::ErrorKind::CyclicSchema`] at step 1.

use std::sync::OnceLock;

pub mod analysis;
pub mod analyzer;
pub mod artifacts;
pub mod closure;
pub mod cycle;
pub mod depsort;
pub mod dispatch;
pub mod emit;
pub mod error;
pub mod model;
pub mod propagate;
pub mod sql;
pub mod template;
pub mod utils;

pub use artifacts::Artifacts;
pub use error::{Error, ErrorKind, Result};
pub use model::Model;

/// The compiler's version, resolved in order from `git describe` (recorded
/// at build time by `build.rs` via `vergen-gitcl`) falling back to the
/// crate's own `Cargo.toml` version. Mirrors the fallback chain used
/// elsewhere in this codebase for build-time version resolution.
pub fn compiler_version() -> &'static str {
    static COMPILER_VERSION: OnceLock<String> = OnceLock::new();
    COMPILER_VERSION.get_or_init(|| {
        option_env!("VERGEN_GIT_DESCRIBE")
            .filter(|v| !v.is_empty())
            .unwrap_or(env!("CARGO_PKG_VERSION"))
            .to_string()
    })
}

/// Runs the full `Model → Artifacts` pipeline (§2).
pub fn compile(model: &Model) -> Result<Artifacts> {
    cycle::validate(model)?;

    let closure_rows = closure::compute(model);
    let mut analyses = analyzer::analyze(model, &closure_rows);
    let order = depsort::sort(&analyses);
    propagate::run(&mut analyses, &order);

    let mut artifacts = Artifacts::default();

    for (object_type, relation) in &order {
        let Some(a) = analyses.get(object_type, relation) else {
            continue;
        };

        if a.can_generate {
            log::debug!(
                "{object_type}.{relation}: check template {}",
                template::select_check_template(a)
            );
            let (wildcard, no_wildcard) = emit::check::emit(a);
            artifacts.functions.push(wildcard);
            artifacts.no_wildcard_functions.push(no_wildcard);
        }

        if a.can_generate_list_value {
            log::debug!(
                "{object_type}.{relation}: list template {}",
                template::select_list_template(a)
            );
            let (objects, subjects) = emit::list::emit(a);
            artifacts.list_objects_functions.push(objects);
            artifacts.list_subjects_functions.push(subjects);
        }
    }

    artifacts.dispatcher = dispatch::emit_check_dispatcher(&analyses, &order);
    artifacts.dispatcher_no_wildcard = dispatch::emit_check_no_wildcard_dispatcher(&analyses, &order);
    artifacts.list_objects_dispatcher = dispatch::emit_list_objects_dispatcher(&analyses, &order);
    artifacts.list_subjects_dispatcher = dispatch::emit_list_subjects_dispatcher(&analyses, &order);

    log::info!(
        "compiled {} relation(s) into {} check function(s) and {} list function(s)",
        order.len(),
        artifacts.functions.len(),
        artifacts.list_objects_functions.len(),
    );

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    #[test]
    fn s1_closure_compiles_three_functions() {
        let owner = RelationDefinition {
            name: "owner".into(),
            subject_type_refs: vec![SubjectTypeRef::direct("user")],
            ..Default::default()
        };
        let admin = RelationDefinition {
            name: "admin".into(),
            implied_by: vec!["owner".into()],
            ..Default::default()
        };
        let member = RelationDefinition {
            name: "member".into(),
            implied_by: vec!["admin".into()],
            ..Default::default()
        };
        let model = Model {
            types: vec![TypeDefinition {
                name: "resource".into(),
                relations: vec![owner, admin, member],
            }],
        };

        let artifacts = compile(&model).unwrap();
        assert_eq!(artifacts.functions.len(), 3);
        assert_eq!(artifacts.no_wildcard_functions.len(), 3);
        assert!(artifacts.dispatcher.contains("check_permission"));
    }

    #[test]
    fn s2_implied_by_cycle_rejected() {
        let mut a = RelationDefinition {
            name: "a".into(),
            ..Default::default()
        };
        a.implied_by = vec!["c".into()];
        let mut b = RelationDefinition {
            name: "b".into(),
            ..Default::default()
        };
        b.implied_by = vec!["a".into()];
        let mut c = RelationDefinition {
            name: "c".into(),
            ..Default::default()
        };
        c.implied_by = vec!["b".into()];
        let model = Model {
            types: vec![TypeDefinition {
                name: "resource".into(),
                relations: vec![a, b, c],
            }],
        };

        let err = compile(&model).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicSchema);
    }

    #[test]
    fn s6_wildcard_dispatch_emits_both_variants() {
        let public = RelationDefinition {
            name: "public".into(),
            subject_type_refs: vec![SubjectTypeRef::wildcard("user")],
            ..Default::default()
        };
        let model = Model {
            types: vec![TypeDefinition {
                name: "doc".into(),
                relations: vec![public],
            }],
        };

        let artifacts = compile(&model).unwrap();
        assert!(artifacts.functions[0].contains("check_doc_public"));
        assert!(artifacts.no_wildcard_functions[0].contains("check_doc_public_no_wildcard"));
        assert!(artifacts.functions[0].contains("subject_id = '*'"));
        assert!(artifacts.no_wildcard_functions[0].contains("subject_id != '*'"));
    }

    #[test]
    fn determinism_same_model_same_artifacts() {
        let viewer = RelationDefinition {
            name: "viewer".into(),
            subject_type_refs: vec![SubjectTypeRef::direct("user")],
            ..Default::default()
        };
        let model = Model {
            types: vec![TypeDefinition {
                name: "doc".into(),
                relations: vec![viewer],
            }],
        };

        let first = compile(&model).unwrap();
        let second = compile(&model).unwrap();
        similar_asserts::assert_eq!(first.functions, second.functions);
        similar_asserts::assert_eq!(first.dispatcher, second.dispatcher);
    }
}
