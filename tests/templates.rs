//! Template naming is part of the crate's log output (`lib.rs` logs the
//! selected template's `Display` string at debug level), so its exact
//! rendering is worth pinning down directly rather than only indirectly
//! through the selection logic in `template.rs`'s own unit tests.

use insta::assert_snapshot;
use melange_compiler::template::{CheckTemplate, ListTemplate};
use rstest::rstest;

#[rstest]
#[case(ListTemplate::DepthExceeded, "depth_exceeded")]
#[case(ListTemplate::SelfRefUserset, "self_ref_userset")]
#[case(ListTemplate::Composed, "composed")]
#[case(ListTemplate::Intersection, "intersection")]
#[case(ListTemplate::Recursive, "recursive")]
#[case(ListTemplate::Userset, "userset")]
#[case(ListTemplate::Exclusion, "exclusion")]
#[case(ListTemplate::Direct, "direct")]
fn list_template_renders_snake_case(#[case] template: ListTemplate, #[case] expected: &str) {
    assert_eq!(template.to_string(), expected);
}

#[test]
fn check_template_names() {
    assert_snapshot!(CheckTemplate::PlPgsql.to_string(), @"pl_pgsql");
    assert_snapshot!(CheckTemplate::Sql.to_string(), @"sql");
}
