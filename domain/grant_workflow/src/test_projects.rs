use crate::invariants::{assert_lock_consistent, assert_valid_project_transition};
use crate::permissions::ViewerRole;
use crate::project::{
    approve_contract, contract_to_approve, create_approval, listed_contracts,
    missing_document_categories, plan_create, plan_edit, request_changes, send_for_approval,
    update_lead, upload_contract, ProjectEdit,
};
use crate::types::{
    Contract, DocumentCategory, PacketFile, Project, ProjectStatus, Role, Submission, User,
};
use crate::workflow::{WorkflowKind, WorkflowStatus};
use crate::WorkflowError;

fn staff(id: i64) -> User {
    User {
        id,
        full_name: format!("Staff {id}"),
        email: format!("staff{id}@example.org"),
        role: Role::Staff,
    }
}

fn owner() -> User {
    User {
        id: 2,
        full_name: "Ada Applicant".into(),
        email: "ada@example.org".into(),
        role: Role::Applicant,
    }
}

fn project(status: ProjectStatus, is_locked: bool) -> Project {
    Project {
        id: 30,
        submission: 100,
        title: "Secure messaging audit".into(),
        user: owner().id,
        lead: Some(1),
        value: 120_000,
        status,
        is_locked,
        created_at: 1_700_000_000,
    }
}

fn contract(id: i64, created_at: i64, is_signed: bool, approver: Option<i64>) -> Contract {
    Contract {
        id,
        project: 30,
        file: format!("projects/30/contract-{id}.pdf"),
        is_signed,
        approver,
        approved_at: approver.map(|_| created_at + 10),
        created_at,
    }
}

#[test]
fn test_approval_lifecycle() {
    let lead = staff(1);
    let mut p = project(ProjectStatus::Draft, false);

    let change = send_for_approval(&lead, &p).unwrap();
    assert!(change.is_locked);
    assert_valid_project_transition(p.status, change.status);
    p.status = change.status;
    p.is_locked = change.is_locked;
    assert_lock_consistent(&p);

    let change = create_approval(&lead, &p).unwrap();
    assert_eq!(change.status, ProjectStatus::Contracting);
    assert!(!change.is_locked);
    assert_valid_project_transition(p.status, change.status);
}

#[test]
fn test_cannot_approve_unlocked_project() {
    let p = project(ProjectStatus::Draft, false);
    assert_eq!(
        create_approval(&staff(1), &p),
        Err(WorkflowError::NotAwaitingApproval)
    );
}

#[test]
fn test_cannot_resend_locked_project() {
    let p = project(ProjectStatus::Draft, true);
    assert_eq!(
        send_for_approval(&staff(1), &p),
        Err(WorkflowError::CannotSendForApproval)
    );
}

#[test]
fn test_rejection_unlocks_and_keeps_status() {
    let p = project(ProjectStatus::Draft, true);
    let change = request_changes(&staff(1), &p, "Please revise the budget").unwrap();
    assert_eq!(change.status, ProjectStatus::Draft);
    assert!(!change.is_locked);

    assert_eq!(
        request_changes(&staff(1), &p, "   "),
        Err(WorkflowError::MissingComment)
    );
}

#[test]
fn test_applicant_cannot_approve() {
    let p = project(ProjectStatus::Draft, true);
    assert!(matches!(
        create_approval(&owner(), &p),
        Err(WorkflowError::PermissionDenied(_))
    ));
}

#[test]
fn test_latest_contract_requiring_approval() {
    let contracts = [
        contract(1, 100, true, Some(1)),
        contract(2, 200, true, None),
    ];
    assert_eq!(contract_to_approve(&contracts).map(|c| c.id), Some(2));

    let all_approved = [contract(1, 100, true, Some(1)), contract(2, 200, true, Some(1))];
    assert_eq!(contract_to_approve(&all_approved), None);
    assert_eq!(contract_to_approve(&[]), None);
}

#[test]
fn test_listed_contracts_put_pending_first() {
    let contracts = [
        contract(1, 100, true, Some(1)),
        contract(2, 150, false, Some(1)),
        contract(3, 200, true, Some(1)),
        contract(4, 300, false, None),
    ];
    let ids: Vec<i64> = listed_contracts(&contracts).iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![4, 3, 1]);
}

#[test]
fn test_approve_contract_moves_to_in_progress() {
    let p = project(ProjectStatus::Contracting, false);
    let contracts = [contract(1, 100, true, None)];
    let approval = approve_contract(&staff(1), &p, &contracts, 1).unwrap();
    assert_eq!(approval.status, ProjectStatus::InProgress);
    assert_eq!(approval.approver, 1);
    assert_valid_project_transition(p.status, approval.status);
}

#[test]
fn test_approve_contract_without_pending_is_refused() {
    let p = project(ProjectStatus::Contracting, false);
    let contracts = [contract(1, 100, true, Some(1))];
    assert_eq!(
        approve_contract(&staff(1), &p, &contracts, 1),
        Err(WorkflowError::NoPendingContract)
    );
}

#[test]
fn test_approve_contract_outside_contracting_is_refused() {
    let contracts = [contract(1, 100, true, None)];
    for (status, locked) in [
        (ProjectStatus::Draft, true),
        (ProjectStatus::Draft, false),
        (ProjectStatus::InProgress, false),
    ] {
        let p = project(status, locked);
        let err = approve_contract(&staff(1), &p, &contracts, 1).unwrap_err();
        assert_eq!(err, WorkflowError::NotContracting);
        assert!(err.is_notice());
    }
}

#[test]
fn test_only_latest_contract_can_be_approved() {
    let p = project(ProjectStatus::Contracting, false);
    let contracts = [contract(1, 100, false, None), contract(2, 200, true, None)];
    assert_eq!(
        approve_contract(&staff(1), &p, &contracts, 1),
        Err(WorkflowError::NotLatestContract)
    );
    assert_eq!(
        approve_contract(&staff(1), &p, &contracts, 99),
        Err(WorkflowError::not_found("contract", 99))
    );
}

#[test]
fn test_owner_upload_is_signed() {
    let p = project(ProjectStatus::Contracting, false);
    assert_eq!(upload_contract(&owner(), &p), Ok(true));
    assert_eq!(upload_contract(&staff(1), &p), Ok(false));

    let stranger = User {
        id: 77,
        ..owner()
    };
    assert!(upload_contract(&stranger, &p).is_err());
}

#[test]
fn test_missing_document_categories() {
    let categories = [
        DocumentCategory {
            id: 1,
            name: "Budget".into(),
            required: true,
        },
        DocumentCategory {
            id: 2,
            name: "Letter of support".into(),
            required: false,
        },
        DocumentCategory {
            id: 3,
            name: "Work plan".into(),
            required: true,
        },
    ];
    let files = [PacketFile {
        id: 9,
        project: 30,
        category: 1,
        title: "Budget v2".into(),
        document: "projects/30/9-budget.xlsx".into(),
        created_at: 0,
    }];
    let missing: Vec<&str> = missing_document_categories(&categories, &files)
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(missing, vec!["Work plan"]);
}

#[test]
fn test_create_project_from_accepted_submission() {
    let mut s = Submission {
        id: 100,
        title: "Secure messaging audit".into(),
        user: owner().id,
        lead: Some(1),
        workflow: WorkflowKind::Request,
        status: WorkflowStatus::Determination,
        previous: None,
        created_at: 0,
    };
    assert_eq!(
        plan_create(&staff(1), &s, false),
        Err(WorkflowError::NotAccepted)
    );

    s.status = WorkflowStatus::Accepted;
    let new = plan_create(&staff(1), &s, false).unwrap();
    assert_eq!(new.status, ProjectStatus::Draft);
    assert_eq!(new.lead, Some(1));
    assert!(!new.is_locked);

    assert_eq!(
        plan_create(&staff(1), &s, true),
        Err(WorkflowError::ProjectExists)
    );
}

#[test]
fn test_lead_must_be_staff() {
    assert!(update_lead(&staff(1), &staff(3)).is_ok());
    assert_eq!(
        update_lead(&staff(1), &owner()),
        Err(WorkflowError::NotStaff(2))
    );
}

#[test]
fn test_edit_dispatches_by_role() {
    let p = project(ProjectStatus::Draft, false);
    let edit = ProjectEdit {
        title: Some("Secure messaging audit, phase 1".into()),
        value: None,
    };

    let (role, title, value) = plan_edit(&owner(), &p, &edit).unwrap();
    assert_eq!(role, ViewerRole::Applicant);
    assert_eq!(title, "Secure messaging audit, phase 1");
    assert_eq!(value, 120_000);

    let (role, _, _) = plan_edit(&staff(1), &p, &edit).unwrap();
    assert_eq!(role, ViewerRole::Admin);

    // Staff who do not lead the project are turned away softly.
    assert_eq!(
        plan_edit(&staff(5), &p, &edit),
        Err(WorkflowError::NotEditable)
    );
}

#[test]
fn test_locked_project_is_not_editable() {
    let p = project(ProjectStatus::Draft, true);
    assert_eq!(
        plan_edit(&owner(), &p, &ProjectEdit::default()),
        Err(WorkflowError::NotEditable)
    );
    assert_eq!(
        plan_edit(
            &owner(),
            &project(ProjectStatus::Draft, false),
            &ProjectEdit {
                title: None,
                value: Some(-5)
            }
        ),
        Err(WorkflowError::InvalidField("value"))
    );
}
