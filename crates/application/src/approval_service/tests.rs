use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reportflow_core::{AppError, AppResult, PrincipalId, ProjectId, StepId, SubjectId, WorkflowId};
use reportflow_domain::{
    ApprovalChain, ApprovalWorkflow, AssignmentScope, CommentKind, Principal, RoleAssignment,
    RoleCatalog, RoleName, StepStatus, WorkflowStatus,
};
use tokio::sync::Mutex;

use super::ApprovalService;
use crate::approval_ports::{
    ApprovalWorkflowRepository, VersionedWorkflow, WorkflowEvent, WorkflowEventSink,
};
use crate::permission_evaluator::PermissionEvaluator;

#[derive(Default)]
struct FakeWorkflowRepository {
    store: Mutex<HashMap<WorkflowId, (i64, ApprovalWorkflow)>>,
    fail_next_save_with_conflict: AtomicBool,
}

#[async_trait]
impl ApprovalWorkflowRepository for FakeWorkflowRepository {
    async fn create_workflow(&self, workflow: &ApprovalWorkflow) -> AppResult<()> {
        let mut store = self.store.lock().await;
        if store.contains_key(&workflow.id()) {
            return Err(AppError::Conflict(format!(
                "workflow '{}' already exists",
                workflow.id()
            )));
        }

        store.insert(workflow.id(), (1, workflow.clone()));
        Ok(())
    }

    async fn load_workflow(&self, workflow_id: WorkflowId) -> AppResult<Option<VersionedWorkflow>> {
        Ok(self
            .store
            .lock()
            .await
            .get(&workflow_id)
            .map(|(version, workflow)| VersionedWorkflow {
                workflow: workflow.clone(),
                version: *version,
            }))
    }

    async fn save_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        expected_version: i64,
    ) -> AppResult<()> {
        if self.fail_next_save_with_conflict.swap(false, Ordering::SeqCst) {
            return Err(AppError::Conflict(
                "workflow was modified by another writer".to_owned(),
            ));
        }

        let mut store = self.store.lock().await;
        let entry = store.get_mut(&workflow.id()).ok_or_else(|| {
            AppError::NotFound(format!("workflow '{}' does not exist", workflow.id()))
        })?;

        if entry.0 != expected_version {
            return Err(AppError::Conflict(
                "workflow was modified by another writer".to_owned(),
            ));
        }

        *entry = (expected_version + 1, workflow.clone());
        Ok(())
    }

    async fn find_active_workflow_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> AppResult<Option<VersionedWorkflow>> {
        Ok(self
            .store
            .lock()
            .await
            .values()
            .find(|(_, workflow)| {
                workflow.subject_id() == subject_id && !workflow.is_terminal()
            })
            .map(|(version, workflow)| VersionedWorkflow {
                workflow: workflow.clone(),
                version: *version,
            }))
    }
}

#[derive(Default)]
struct RecordingEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

#[async_trait]
impl WorkflowEventSink for RecordingEventSink {
    async fn publish(&self, event: WorkflowEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct FailingEventSink;

#[async_trait]
impl WorkflowEventSink for FailingEventSink {
    async fn publish(&self, _event: WorkflowEvent) -> AppResult<()> {
        Err(AppError::Internal("sink is down".to_owned()))
    }
}

fn service(
    repository: Arc<FakeWorkflowRepository>,
    event_sink: Arc<impl WorkflowEventSink + 'static>,
) -> ApprovalService {
    let catalog = Arc::new(RoleCatalog::builtin());
    ApprovalService::new(
        repository,
        event_sink,
        PermissionEvaluator::new(Arc::clone(&catalog)),
        catalog,
        ApprovalChain::standard(),
    )
}

fn principal_with_role(name: &str, role: RoleName, scope: AssignmentScope) -> Principal {
    let catalog = RoleCatalog::builtin();
    let level = catalog
        .level_of(&role)
        .unwrap_or_else(|| panic!("missing builtin role '{role}'"));
    Principal::new(PrincipalId::new(), name)
        .with_assignment(RoleAssignment::active(role, level, scope))
}

fn branch_admin(project_id: ProjectId) -> Principal {
    principal_with_role(
        "Branch Admin",
        RoleName::BranchAdmin,
        AssignmentScope::Project { project_id },
    )
}

fn project_admin(project_id: ProjectId) -> Principal {
    principal_with_role(
        "Project Admin",
        RoleName::ProjectAdmin,
        AssignmentScope::Project { project_id },
    )
}

fn country_admin() -> Principal {
    principal_with_role(
        "Country Admin",
        RoleName::CountryAdmin,
        AssignmentScope::Regional {
            country: "KE".to_owned(),
        },
    )
}

fn global_admin() -> Principal {
    principal_with_role("Global Admin", RoleName::GlobalAdmin, AssignmentScope::Global)
}

fn step_id(workflow: &ApprovalWorkflow, number: u32) -> StepId {
    workflow
        .steps()
        .iter()
        .find(|step| step.step_number() == number)
        .map(reportflow_domain::ApprovalStep::id)
        .unwrap_or_else(|| panic!("missing step {number}"))
}

async fn created_workflow(
    service: &ApprovalService,
    project_id: ProjectId,
) -> AppResult<ApprovalWorkflow> {
    service
        .create_workflow(&branch_admin(project_id), SubjectId::new(), project_id)
        .await
}

#[tokio::test]
async fn create_workflow_materializes_the_chain() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let sink = Arc::new(RecordingEventSink::default());
    let service = service(Arc::clone(&repository), Arc::clone(&sink));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id).await;
    assert!(workflow.is_ok());

    let workflow = workflow.unwrap_or_else(|_| panic!("creation failed"));
    assert_eq!(workflow.status(), WorkflowStatus::InProgress);
    assert_eq!(workflow.current_step_number(), 1);
    assert_eq!(workflow.steps().len(), 4);
    assert_eq!(workflow.steps()[0].status(), StepStatus::InReview);

    let events = sink.events.lock().await;
    assert!(matches!(
        events.first(),
        Some(WorkflowEvent::WorkflowCreated { .. })
    ));
}

#[tokio::test]
async fn create_workflow_requires_submit_permission() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));

    // Country admins carry no submit grant.
    let result = service
        .create_workflow(&country_admin(), SubjectId::new(), ProjectId::new())
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn one_live_workflow_per_subject() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();
    let subject_id = SubjectId::new();
    let creator = branch_admin(project_id);

    let first = service
        .create_workflow(&creator, subject_id, project_id)
        .await;
    assert!(first.is_ok());

    let second = service
        .create_workflow(&creator, subject_id, project_id)
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn approve_advances_and_publishes_events() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let sink = Arc::new(RecordingEventSink::default());
    let service = service(Arc::clone(&repository), Arc::clone(&sink));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let result = service
        .approve(
            &branch_admin(project_id),
            workflow.id(),
            step_id(&workflow, 1),
            None,
        )
        .await;
    assert!(result.is_ok());

    let updated = result.unwrap_or_else(|_| panic!("approve failed"));
    assert_eq!(updated.current_step_number(), 2);
    assert_eq!(updated.steps()[0].status(), StepStatus::Approved);
    assert_eq!(updated.steps()[1].status(), StepStatus::InReview);

    let events = sink.events.lock().await;
    assert!(
        events
            .iter()
            .any(|event| matches!(event, WorkflowEvent::StepApproved { step_number: 1, .. }))
    );
}

#[tokio::test]
async fn approve_denies_branch_admin_of_another_project() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let outsider = branch_admin(ProjectId::new());
    let result = service
        .approve(&outsider, workflow.id(), step_id(&workflow, 1), None)
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn equal_level_may_approve_but_never_skip() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let branch = branch_admin(project_id);
    let first = step_id(&workflow, 1);

    let skipped = service
        .skip(&branch, workflow.id(), first, "not needed")
        .await;
    assert!(matches!(skipped, Err(AppError::Unauthorized)));

    let approved = service.approve(&branch, workflow.id(), first, None).await;
    assert!(approved.is_ok());
}

#[tokio::test]
async fn senior_principal_skips_a_junior_step() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let after_first = service
        .approve(
            &branch_admin(project_id),
            workflow.id(),
            step_id(&workflow, 1),
            None,
        )
        .await
        .unwrap_or_else(|_| panic!("approve failed"));

    // Country admin (level 3) outranks the project-admin step (level 4).
    let result = service
        .skip(
            &country_admin(),
            workflow.id(),
            step_id(&after_first, 2),
            "pre-approved offline",
        )
        .await;
    assert!(result.is_ok());

    let updated = result.unwrap_or_else(|_| panic!("skip failed"));
    assert_eq!(updated.steps()[1].status(), StepStatus::Skipped);
    assert_eq!(updated.steps()[2].status(), StepStatus::InReview);
    assert_eq!(updated.current_step_number(), 3);
}

#[tokio::test]
async fn reject_terminates_and_blocks_later_steps() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let after_first = service
        .approve(
            &branch_admin(project_id),
            workflow.id(),
            step_id(&workflow, 1),
            None,
        )
        .await
        .unwrap_or_else(|_| panic!("approve failed"));

    let rejected = service
        .reject(
            &project_admin(project_id),
            workflow.id(),
            step_id(&after_first, 2),
            "incomplete data",
        )
        .await;
    assert!(rejected.is_ok());

    let terminal = rejected.unwrap_or_else(|_| panic!("reject failed"));
    assert_eq!(terminal.status(), WorkflowStatus::Rejected);

    let late = service
        .approve(
            &country_admin(),
            workflow.id(),
            step_id(&terminal, 3),
            None,
        )
        .await;
    assert!(matches!(late, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn reject_without_reason_is_a_validation_error() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let result = service
        .reject(
            &branch_admin(project_id),
            workflow.id(),
            step_id(&workflow, 1),
            "   ",
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn stale_step_is_an_invalid_transition() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));
    let first = step_id(&workflow, 1);

    let approved = service
        .approve(&branch_admin(project_id), workflow.id(), first, None)
        .await;
    assert!(approved.is_ok());

    // The losing racer targets a step that is no longer current.
    let replay = service
        .approve(&global_admin(), workflow.id(), first, None)
        .await;
    assert!(matches!(replay, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn stale_step_reports_invalid_transition_before_the_seniority_gate() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));
    let first = step_id(&workflow, 1);

    let approved = service
        .approve(&branch_admin(project_id), workflow.id(), first, None)
        .await;
    assert!(approved.is_ok());

    // A branch admin no longer qualifies for step 2, but the staleness of
    // the targeted step wins over the seniority check.
    let replay = service
        .approve(&branch_admin(project_id), workflow.id(), first, None)
        .await;
    assert!(matches!(replay, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn concurrent_writer_conflict_surfaces_to_the_caller() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(Arc::clone(&repository), Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    repository
        .fail_next_save_with_conflict
        .store(true, Ordering::SeqCst);

    let result = service
        .approve(
            &branch_admin(project_id),
            workflow.id(),
            step_id(&workflow, 1),
            None,
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Nothing was applied; the stored aggregate is unchanged.
    let stored = repository.load_workflow(workflow.id()).await;
    let stored = stored
        .ok()
        .flatten()
        .unwrap_or_else(|| panic!("workflow disappeared"));
    assert_eq!(stored.workflow.steps()[0].status(), StepStatus::InReview);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn event_sink_failure_never_rolls_back_the_mutation() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(Arc::clone(&repository), Arc::new(FailingEventSink));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let result = service
        .approve(
            &branch_admin(project_id),
            workflow.id(),
            step_id(&workflow, 1),
            None,
        )
        .await;
    assert!(result.is_ok());

    let stored = repository.load_workflow(workflow.id()).await;
    let stored = stored
        .ok()
        .flatten()
        .unwrap_or_else(|| panic!("workflow disappeared"));
    assert_eq!(stored.workflow.steps()[0].status(), StepStatus::Approved);
}

#[tokio::test]
async fn comments_require_an_active_role_only() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));
    let first = step_id(&workflow, 1);

    let stranger = Principal::new(PrincipalId::new(), "No Roles");
    let denied = service
        .add_comment(&stranger, workflow.id(), first, "hello", CommentKind::Comment)
        .await;
    assert!(matches!(denied, Err(AppError::Unauthorized)));

    // Any recognized participant may comment, on historical steps too.
    let advanced = service
        .approve(&branch_admin(project_id), workflow.id(), first, None)
        .await;
    assert!(advanced.is_ok());

    let commented = service
        .add_comment(
            &country_admin(),
            workflow.id(),
            first,
            "noted for the country review",
            CommentKind::ChangeRequest,
        )
        .await;
    assert!(commented.is_ok());

    let updated = commented.unwrap_or_else(|_| panic!("comment failed"));
    assert_eq!(updated.steps()[0].comments().len(), 2);
}

#[tokio::test]
async fn full_chain_approval_records_the_final_decision() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let sink = Arc::new(RecordingEventSink::default());
    let service = service(repository, Arc::clone(&sink));
    let project_id = ProjectId::new();

    let mut workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let root = global_admin();
    for number in 1..=4 {
        let id = step_id(&workflow, number);
        let result = service.approve(&root, workflow.id(), id, None).await;
        assert!(result.is_ok());
        workflow = result.unwrap_or_else(|_| panic!("approve failed"));
    }

    assert_eq!(workflow.status(), WorkflowStatus::Approved);
    assert_eq!(workflow.final_decision_by(), Some(root.id()));
    assert!(workflow.final_decision_at().is_some());

    let events = sink.events.lock().await;
    assert!(events.iter().any(|event| matches!(
        event,
        WorkflowEvent::WorkflowFinalized {
            status: WorkflowStatus::Approved,
            ..
        }
    )));
}

#[tokio::test]
async fn get_workflow_gates_on_view_permission() {
    let repository = Arc::new(FakeWorkflowRepository::default());
    let service = service(repository, Arc::new(RecordingEventSink::default()));
    let project_id = ProjectId::new();

    let workflow = created_workflow(&service, project_id)
        .await
        .unwrap_or_else(|_| panic!("creation failed"));

    let member = service
        .get_workflow(&branch_admin(project_id), workflow.id())
        .await;
    assert!(member.is_ok());

    let outsider = service
        .get_workflow(&branch_admin(ProjectId::new()), workflow.id())
        .await;
    assert!(matches!(outsider, Err(AppError::Unauthorized)));

    let missing = service
        .get_workflow(&global_admin(), WorkflowId::new())
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
