//! End-to-end scenarios through the engine's public entry points.

#![allow(missing_docs)]

use prereqs::{
    Catalog, Code, CompletionStatus, Engine, EngineConfig, OfferingId, RequirementRecord,
    StatusSnapshot, SubjectId, SubjectRef, Target,
    domain::{NewOffering, OfferingKind, ProgramId},
};
use test_case::test_case;

struct Plan {
    catalog: Catalog,
    program: ProgramId,
}

impl Plan {
    fn new() -> Self {
        let mut catalog = Catalog::default();
        let program = catalog.add_program("Computer Engineering", Some(1997)).unwrap();
        Self { catalog, program }
    }

    fn subject(&mut self, code: &str) -> SubjectId {
        self.catalog
            .add_subject(self.program, Code::new(code).unwrap(), code, 8)
            .unwrap()
    }

    fn course(&mut self, subject: SubjectId) -> OfferingId {
        self.catalog
            .add_offering(NewOffering::new(subject, OfferingKind::Course, "2025S1"))
            .unwrap()
    }
}

fn approved(code: &str) -> RequirementRecord {
    RequirementRecord::leaf("SUBJECT", code, "APPROVED")
}

fn status(entries: &[(SubjectId, CompletionStatus)]) -> StatusSnapshot {
    entries
        .iter()
        .map(|(subject, status)| (Target::Subject(*subject), *status))
        .collect()
}

/// One gated course with requirements over subjects `codes`.
fn single(
    codes: &[&str],
    root: RequirementRecord,
) -> (Engine, OfferingId, Vec<SubjectId>) {
    let mut plan = Plan::new();
    let subjects: Vec<SubjectId> = codes.iter().map(|code| plan.subject(code)).collect();
    let gated_subject = plan.subject("GATED");
    let gated = plan.course(gated_subject);

    let engine = Engine::new(plan.catalog, EngineConfig::default());
    let report = engine.ingest(gated, &[root]).unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    (engine, gated, subjects)
}

#[test_case(CompletionStatus::Enrolled, false; "second requirement only enrolled")]
#[test_case(CompletionStatus::Approved, true; "both approved")]
fn all_requires_every_leaf(y: CompletionStatus, expected: bool) {
    let (engine, gated, subjects) = single(
        &["X", "Y"],
        RequirementRecord::group("ALL")
            .with_child(approved("X"))
            .with_child(approved("Y")),
    );
    let snapshot = status(&[
        (subjects[0], CompletionStatus::Approved),
        (subjects[1], y),
    ]);

    assert_eq!(engine.evaluate(gated, &snapshot), expected);
}

#[test_case(&[true, true, false], true; "two of three")]
#[test_case(&[true, false, false], false; "one of three")]
fn any_counts_towards_threshold(approvals: &[bool], expected: bool) {
    let (engine, gated, subjects) = single(
        &["X", "Y", "Z"],
        RequirementRecord::group("ANY")
            .with_threshold(2)
            .with_child(approved("X"))
            .with_child(approved("Y"))
            .with_child(approved("Z")),
    );
    let entries: Vec<_> = subjects
        .iter()
        .zip(approvals)
        .filter(|(_, approved)| **approved)
        .map(|(subject, _)| (*subject, CompletionStatus::Approved))
        .collect();

    assert_eq!(engine.evaluate(gated, &status(&entries)), expected);
}

#[test_case(CompletionStatus::Approved, false; "forbidden subject approved")]
#[test_case(CompletionStatus::None, true; "forbidden subject untaken")]
fn none_forbids_its_children(w: CompletionStatus, expected: bool) {
    let (engine, gated, subjects) = single(
        &["W"],
        RequirementRecord::group("NONE").with_child(approved("W")),
    );

    assert_eq!(
        engine.evaluate(gated, &status(&[(subjects[0], w)])),
        expected
    );
}

#[test]
fn unlocks_only_when_the_rest_is_already_met() {
    let (engine, gated, subjects) = single(
        &["X", "Y"],
        RequirementRecord::group("ALL")
            .with_child(approved("X"))
            .with_child(approved("Y")),
    );
    let x: SubjectRef = "X".parse().unwrap();

    let with_y = status(&[(subjects[1], CompletionStatus::Approved)]);
    assert_eq!(engine.unlocked_by(&x, &with_y).unwrap(), vec![gated]);

    let without_y = StatusSnapshot::default();
    assert!(engine.unlocked_by(&x, &without_y).unwrap().is_empty());
}

#[test]
fn unknown_subject_is_an_error() {
    let (engine, _, _) = single(&["X"], RequirementRecord::group("ALL").with_child(approved("X")));
    let missing: SubjectRef = "NOPE".parse().unwrap();

    assert!(engine.unlocked_by(&missing, &StatusSnapshot::default()).is_err());
}

#[test]
fn unresolved_references_block_without_failing() {
    let (engine, gated, subjects) = single(
        &["X"],
        RequirementRecord::group("ALL").with_child(approved("X")),
    );
    let report = engine
        .ingest(
            gated,
            &[RequirementRecord::group("ALL")
                .with_child(approved("X"))
                .with_child(approved("RETIRED"))],
        )
        .unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].is_resolution());

    let snapshot = status(&[(subjects[0], CompletionStatus::Approved)]);
    let evaluation = engine.evaluate_detailed(gated, &snapshot);
    assert!(!evaluation.eligible);
    assert_eq!(evaluation.diagnostics.len(), 1);
    assert_eq!(engine.audit()[&gated][0].code, "RETIRED");
}

#[test]
fn catalog_snapshot_round_trip_through_the_engine() {
    use std::io::Write;

    use prereqs::{CatalogSnapshot, StatusFile};

    let mut catalog = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    catalog
        .write_all(
            br#"
programs:
  - name: Computer Engineering
    planYear: 1997
    subjects:
      - code: CDIV
        name: Calculus
        credits: 13
      - code: GAL1
        name: Linear Algebra
        credits: 9
      - code: CDIVV
        name: Vector Calculus
        credits: "OPTATIVA - 10"
    offerings:
      - subject: CDIVV
        kind: COURSE
        term: 2025S2
        code: C1062
        requirements:
          - kind: ALL
            children:
              - kind: LEAF
                targetKind: SUBJECT
                targetCode: CDIV
                condition: APPROVED
              - kind: LEAF
                targetKind: SUBJECT
                targetCode: GAL1
                condition: ENROLLED
"#,
        )
        .unwrap();
    let mut student = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    student
        .write_all(br#"{"subjects": {"GAL1": "enrolled"}}"#)
        .unwrap();

    let loaded = CatalogSnapshot::load(catalog.path())
        .unwrap()
        .into_catalog()
        .unwrap();
    let (engine, reports) = Engine::from_snapshot(loaded, EngineConfig::default());
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].edges, 2);

    let snapshot = StatusFile::load(student.path())
        .unwrap()
        .resolve(engine.catalog())
        .unwrap();
    let course = engine
        .catalog()
        .offering_by_code(&Code::new("C1062").unwrap())
        .unwrap();
    assert!(!engine.evaluate(course, &snapshot));

    let cdiv: SubjectRef = "Computer Engineering_1997/CDIV".parse().unwrap();
    assert_eq!(engine.unlocked_by(&cdiv, &snapshot).unwrap(), vec![course]);
}
