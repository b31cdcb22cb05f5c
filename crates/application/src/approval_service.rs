use std::sync::Arc;

use chrono::Utc;
use reportflow_core::{AppError, AppResult, ProjectId, StepId, SubjectId, WorkflowId};
use reportflow_domain::{
    ApprovalChain, ApprovalWorkflow, CommentAuthor, CommentKind, Principal, RoleBinding,
    RoleCatalog,
};
use tracing::warn;

use crate::approval_ports::{
    ApprovalWorkflowRepository, VersionedWorkflow, WorkflowEvent, WorkflowEventSink,
};
use crate::permission_evaluator::{EvaluationScope, PermissionEvaluator};

/// Resource every workflow operation is gated on.
const REPORTS_RESOURCE: &str = "reports";

/// Drives report approval workflows through the fixed chain.
///
/// Every transition is gated twice: the permission evaluator decides whether
/// the principal may act on reports for the owning project, and the
/// seniority rule decides whether the principal may decide the current step.
/// Mutations are all-or-nothing per aggregate; saves are compare-and-swap on
/// the version stamp and the retry loop lives with the caller.
#[derive(Clone)]
pub struct ApprovalService {
    repository: Arc<dyn ApprovalWorkflowRepository>,
    event_sink: Arc<dyn WorkflowEventSink>,
    permission_evaluator: PermissionEvaluator,
    catalog: Arc<RoleCatalog>,
    chain: ApprovalChain,
}

impl ApprovalService {
    /// Creates an approval service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ApprovalWorkflowRepository>,
        event_sink: Arc<dyn WorkflowEventSink>,
        permission_evaluator: PermissionEvaluator,
        catalog: Arc<RoleCatalog>,
        chain: ApprovalChain,
    ) -> Self {
        Self {
            repository,
            event_sink,
            permission_evaluator,
            catalog,
            chain,
        }
    }

    /// Returns the chain every workflow traverses.
    #[must_use]
    pub fn chain(&self) -> &ApprovalChain {
        &self.chain
    }

    /// Creates a workflow for a subject, materializing every chain step.
    ///
    /// One live workflow per subject: creation is rejected while a
    /// non-terminal workflow exists.
    pub async fn create_workflow(
        &self,
        principal: &Principal,
        subject_id: SubjectId,
        owner_project_id: ProjectId,
    ) -> AppResult<ApprovalWorkflow> {
        self.permission_evaluator.require(
            principal,
            REPORTS_RESOURCE,
            "submit",
            EvaluationScope::Project(owner_project_id),
        )?;

        if let Some(existing) = self
            .repository
            .find_active_workflow_for_subject(subject_id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "subject '{subject_id}' already has workflow '{}' in progress",
                existing.workflow.id()
            )));
        }

        let workflow = ApprovalWorkflow::create(
            &self.chain,
            subject_id,
            owner_project_id,
            principal.id(),
            Utc::now(),
        );
        self.repository.create_workflow(&workflow).await?;

        self.publish(WorkflowEvent::WorkflowCreated {
            workflow_id: workflow.id(),
            subject_id,
            owner_project_id,
            created_by: principal.id(),
        })
        .await;

        Ok(workflow)
    }

    /// Approves the current step and advances or finalizes the workflow.
    pub async fn approve(
        &self,
        principal: &Principal,
        workflow_id: WorkflowId,
        step_id: StepId,
        comment: Option<String>,
    ) -> AppResult<ApprovalWorkflow> {
        let mut stored = self.load(workflow_id).await?;
        stored.workflow.ensure_actionable(step_id)?;
        self.authorize_decision(principal, &stored.workflow, false)?;

        let author = author_snapshot(principal)?;
        stored
            .workflow
            .approve(step_id, &author, comment, Utc::now())?;
        self.repository
            .save_workflow(&stored.workflow, stored.version)
            .await?;

        let step_number = step_number_of(&stored.workflow, step_id);
        self.publish(WorkflowEvent::StepApproved {
            workflow_id,
            step_id,
            step_number,
            decided_by: principal.id(),
        })
        .await;
        self.publish_finalized(&stored.workflow).await;

        Ok(stored.workflow)
    }

    /// Rejects the current step, terminating the workflow immediately.
    pub async fn reject(
        &self,
        principal: &Principal,
        workflow_id: WorkflowId,
        step_id: StepId,
        reason: &str,
    ) -> AppResult<ApprovalWorkflow> {
        let mut stored = self.load(workflow_id).await?;
        stored.workflow.ensure_actionable(step_id)?;
        self.authorize_decision(principal, &stored.workflow, false)?;

        let author = author_snapshot(principal)?;
        stored
            .workflow
            .reject(step_id, &author, reason, Utc::now())?;
        self.repository
            .save_workflow(&stored.workflow, stored.version)
            .await?;

        let step_number = step_number_of(&stored.workflow, step_id);
        self.publish(WorkflowEvent::StepRejected {
            workflow_id,
            step_id,
            step_number,
            decided_by: principal.id(),
            reason: reason.to_owned(),
        })
        .await;
        self.publish_finalized(&stored.workflow).await;

        Ok(stored.workflow)
    }

    /// Skips the current step on behalf of a strictly more senior principal.
    ///
    /// Self-skip and peer-skip are forbidden: the principal must outrank the
    /// step's required role, never merely match it.
    pub async fn skip(
        &self,
        principal: &Principal,
        workflow_id: WorkflowId,
        step_id: StepId,
        reason: &str,
    ) -> AppResult<ApprovalWorkflow> {
        let mut stored = self.load(workflow_id).await?;
        stored.workflow.ensure_actionable(step_id)?;
        self.authorize_decision(principal, &stored.workflow, true)?;

        let author = author_snapshot(principal)?;
        stored.workflow.skip(step_id, &author, reason, Utc::now())?;
        self.repository
            .save_workflow(&stored.workflow, stored.version)
            .await?;

        let step_number = step_number_of(&stored.workflow, step_id);
        self.publish(WorkflowEvent::StepSkipped {
            workflow_id,
            step_id,
            step_number,
            decided_by: principal.id(),
            reason: reason.to_owned(),
        })
        .await;
        self.publish_finalized(&stored.workflow).await;

        Ok(stored.workflow)
    }

    /// Appends a comment to any step without gating the chain.
    ///
    /// Requires only that the principal resolves some active role.
    pub async fn add_comment(
        &self,
        principal: &Principal,
        workflow_id: WorkflowId,
        step_id: StepId,
        body: &str,
        kind: CommentKind,
    ) -> AppResult<ApprovalWorkflow> {
        let author = author_snapshot(principal)?;

        let mut stored = self.load(workflow_id).await?;
        stored
            .workflow
            .add_comment(step_id, &author, body, kind, Utc::now())?;
        self.repository
            .save_workflow(&stored.workflow, stored.version)
            .await?;

        self.publish(WorkflowEvent::CommentAdded {
            workflow_id,
            step_id,
            author: principal.id(),
            kind,
        })
        .await;

        Ok(stored.workflow)
    }

    /// Loads one workflow for a principal allowed to view its project.
    pub async fn get_workflow(
        &self,
        principal: &Principal,
        workflow_id: WorkflowId,
    ) -> AppResult<ApprovalWorkflow> {
        let stored = self.load(workflow_id).await?;
        self.permission_evaluator.require(
            principal,
            REPORTS_RESOURCE,
            "view",
            EvaluationScope::Project(stored.workflow.owner_project_id()),
        )?;

        Ok(stored.workflow)
    }

    async fn load(&self, workflow_id: WorkflowId) -> AppResult<VersionedWorkflow> {
        self.repository
            .load_workflow(workflow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("workflow '{workflow_id}' does not exist")))
    }

    /// Applies both transition gates: the reports permission for the owning
    /// project and the seniority comparison against the current step.
    fn authorize_decision(
        &self,
        principal: &Principal,
        workflow: &ApprovalWorkflow,
        strictly_senior: bool,
    ) -> AppResult<()> {
        self.permission_evaluator.require(
            principal,
            REPORTS_RESOURCE,
            "approve",
            EvaluationScope::Project(workflow.owner_project_id()),
        )?;

        let step = workflow.current_step().ok_or_else(|| {
            AppError::InvalidTransition(format!(
                "workflow '{}' is already {}",
                workflow.id(),
                workflow.status().as_str()
            ))
        })?;

        let required = step.required_role();
        let required_level = self.catalog.level_of(required).ok_or_else(|| {
            AppError::Internal(format!("role '{required}' is missing from the catalog"))
        })?;

        let bound_project = match self.catalog.binding_of(required) {
            Some(RoleBinding::Project) => Some(workflow.owner_project_id()),
            _ => None,
        };

        if principal.qualifies_for_level(required_level, bound_project, strictly_senior) {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }

    async fn publish(&self, event: WorkflowEvent) {
        if let Err(error) = self.event_sink.publish(event).await {
            warn!(error = %error, "failed to publish workflow event");
        }
    }

    async fn publish_finalized(&self, workflow: &ApprovalWorkflow) {
        if !workflow.is_terminal() {
            return;
        }

        if let Some(decided_by) = workflow.final_decision_by() {
            self.publish(WorkflowEvent::WorkflowFinalized {
                workflow_id: workflow.id(),
                status: workflow.status(),
                decided_by,
            })
            .await;
        }
    }
}

fn author_snapshot(principal: &Principal) -> AppResult<CommentAuthor> {
    let assignment = principal
        .most_senior_active_role()
        .ok_or(AppError::Unauthorized)?;

    Ok(CommentAuthor::new(
        principal.id(),
        principal.display_name(),
        assignment.role_name.clone(),
    ))
}

fn step_number_of(workflow: &ApprovalWorkflow, step_id: StepId) -> u32 {
    workflow
        .find_step(step_id)
        .map(reportflow_domain::ApprovalStep::step_number)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
