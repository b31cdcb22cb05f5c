use chrono::{DateTime, Utc};
use reportflow_core::{AppError, AppResult, PrincipalId, ProjectId, StepId, SubjectId, WorkflowId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::{ApprovalChain, RoleName};

/// Lifecycle state of one approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not been reached yet.
    Pending,
    /// Step is awaiting a decision from its required role.
    InReview,
    /// Step was approved.
    Approved,
    /// Step was rejected; the workflow stops here.
    Rejected,
    /// Step was skipped by a more senior principal.
    Skipped,
}

impl StepStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Skipped => "skipped",
        }
    }

    /// Returns whether the step can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Skipped)
    }
}

/// Lifecycle state of the whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// At least one step still awaits a decision.
    InProgress,
    /// Every step was approved or skipped.
    Approved,
    /// Some step was rejected.
    Rejected,
}

impl WorkflowStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Returns whether the workflow is immutable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Classification of an appended comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    /// Free-form remark.
    Comment,
    /// Recorded alongside an approval decision.
    Approval,
    /// Recorded alongside a rejection decision.
    Rejection,
    /// Request for changes without a decision.
    ChangeRequest,
}

impl CommentKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Approval => "approval",
            Self::Rejection => "rejection",
            Self::ChangeRequest => "change_request",
        }
    }
}

/// Acting principal snapshot captured on every appended comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    /// Acting principal.
    pub principal_id: PrincipalId,
    /// Display name at the time of the comment.
    pub display_name: String,
    /// Most senior active role at the time of the comment.
    pub role_name: RoleName,
}

impl CommentAuthor {
    /// Creates an author snapshot.
    #[must_use]
    pub fn new(
        principal_id: PrincipalId,
        display_name: impl Into<String>,
        role_name: RoleName,
    ) -> Self {
        Self {
            principal_id,
            display_name: display_name.into(),
            role_name,
        }
    }
}

/// Immutable append-only audit record attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepComment {
    /// Stable comment id.
    pub id: Uuid,
    /// Step the comment belongs to.
    pub step_id: StepId,
    /// Acting principal.
    pub principal_id: PrincipalId,
    /// Display name captured at the time of the comment.
    pub principal_display_name: String,
    /// Role captured at the time of the comment.
    pub role_at_time_of_comment: RoleName,
    /// Comment body.
    pub body: String,
    /// Append timestamp.
    pub timestamp: DateTime<Utc>,
    /// Comment classification.
    pub kind: CommentKind,
}

/// One step in the fixed approval chain of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    id: StepId,
    step_number: u32,
    required_role: RoleName,
    assigned_principal_id: Option<PrincipalId>,
    status: StepStatus,
    submitted_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
    comments: Vec<StepComment>,
    is_current_step: bool,
}

impl ApprovalStep {
    fn new(step_number: u32, required_role: RoleName) -> Self {
        Self {
            id: StepId::new(),
            step_number,
            required_role,
            assigned_principal_id: None,
            status: StepStatus::Pending,
            submitted_at: None,
            reviewed_at: None,
            comments: Vec::new(),
            is_current_step: false,
        }
    }

    /// Returns the step id.
    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    /// Returns the 1-based position in the approval chain.
    #[must_use]
    pub fn step_number(&self) -> u32 {
        self.step_number
    }

    /// Returns the role required to decide this step.
    #[must_use]
    pub fn required_role(&self) -> &RoleName {
        &self.required_role
    }

    /// Returns the principal that decided the step, once decided.
    #[must_use]
    pub fn assigned_principal_id(&self) -> Option<PrincipalId> {
        self.assigned_principal_id
    }

    /// Returns the step status.
    #[must_use]
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Returns when the step entered review.
    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Returns when the step was decided.
    #[must_use]
    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.reviewed_at
    }

    /// Returns the append-only comment trail.
    #[must_use]
    pub fn comments(&self) -> &[StepComment] {
        self.comments.as_slice()
    }

    /// Returns whether this is the step currently awaiting a decision.
    #[must_use]
    pub fn is_current_step(&self) -> bool {
        self.is_current_step
    }

    fn append_comment(
        &mut self,
        author: &CommentAuthor,
        body: impl Into<String>,
        kind: CommentKind,
        now: DateTime<Utc>,
    ) {
        self.comments.push(StepComment {
            id: Uuid::new_v4(),
            step_id: self.id,
            principal_id: author.principal_id,
            principal_display_name: author.display_name.clone(),
            role_at_time_of_comment: author.role_name.clone(),
            body: body.into(),
            timestamp: now,
            kind,
        });
    }

    fn decide(&mut self, status: StepStatus, author: &CommentAuthor, now: DateTime<Utc>) {
        self.status = status;
        self.reviewed_at = Some(now);
        self.assigned_principal_id = Some(author.principal_id);
    }
}

/// Aggregate root driving one report through the approval chain.
///
/// `current_step_number` is the single source of truth for progression; the
/// per-step `is_current_step` flags are recomputed after every mutation and
/// carried only for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    id: WorkflowId,
    subject_id: SubjectId,
    owner_project_id: ProjectId,
    created_by: PrincipalId,
    created_at: DateTime<Utc>,
    steps: Vec<ApprovalStep>,
    current_step_number: u32,
    status: WorkflowStatus,
    final_decision_at: Option<DateTime<Utc>>,
    final_decision_by: Option<PrincipalId>,
}

impl ApprovalWorkflow {
    /// Materializes a workflow with every chain step created up front.
    ///
    /// Step 1 starts in review; all later steps start pending.
    #[must_use]
    pub fn create(
        chain: &ApprovalChain,
        subject_id: SubjectId,
        owner_project_id: ProjectId,
        created_by: PrincipalId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut steps: Vec<ApprovalStep> = chain
            .required_roles()
            .enumerate()
            .map(|(index, role)| ApprovalStep::new(index as u32 + 1, role.clone()))
            .collect();

        if let Some(first) = steps.first_mut() {
            first.status = StepStatus::InReview;
            first.submitted_at = Some(now);
        }

        let mut workflow = Self {
            id: WorkflowId::new(),
            subject_id,
            owner_project_id,
            created_by,
            created_at: now,
            steps,
            current_step_number: 1,
            status: WorkflowStatus::InProgress,
            final_decision_at: None,
            final_decision_by: None,
        };
        workflow.recompute_current_flags();
        workflow
    }

    /// Returns the workflow id.
    #[must_use]
    pub fn id(&self) -> WorkflowId {
        self.id
    }

    /// Returns the report under approval.
    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    /// Returns the project the report belongs to.
    #[must_use]
    pub fn owner_project_id(&self) -> ProjectId {
        self.owner_project_id
    }

    /// Returns the creating principal.
    #[must_use]
    pub fn created_by(&self) -> PrincipalId {
        self.created_by
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns all steps in chain order.
    #[must_use]
    pub fn steps(&self) -> &[ApprovalStep] {
        self.steps.as_slice()
    }

    /// Returns the step number currently awaiting a decision.
    ///
    /// Once terminal this stays at the last decided step.
    #[must_use]
    pub fn current_step_number(&self) -> u32 {
        self.current_step_number
    }

    /// Returns the workflow status.
    #[must_use]
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns when the final decision was recorded.
    #[must_use]
    pub fn final_decision_at(&self) -> Option<DateTime<Utc>> {
        self.final_decision_at
    }

    /// Returns who recorded the final decision.
    #[must_use]
    pub fn final_decision_by(&self) -> Option<PrincipalId> {
        self.final_decision_by
    }

    /// Returns the step awaiting a decision, or none once terminal.
    #[must_use]
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        if self.status.is_terminal() {
            return None;
        }

        self.steps
            .iter()
            .find(|step| step.step_number == self.current_step_number)
    }

    /// Returns whether the workflow is immutable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Finds a step by id, current or historical.
    #[must_use]
    pub fn find_step(&self, step_id: StepId) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    /// Checks that a step can be decided right now, without mutating state.
    ///
    /// Surfaces the same errors a decision would: a terminal workflow or a
    /// non-current step is an invalid transition, an unknown step is not
    /// found.
    pub fn ensure_actionable(&self, step_id: StepId) -> AppResult<()> {
        self.actionable_step_index(step_id).map(|_| ())
    }

    /// Approves the current step and advances or finalizes the workflow.
    pub fn approve(
        &mut self,
        step_id: StepId,
        author: &CommentAuthor,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let index = self.actionable_step_index(step_id)?;
        let body = comment.unwrap_or_else(|| "Approved".to_owned());

        let step = &mut self.steps[index];
        step.decide(StepStatus::Approved, author, now);
        step.append_comment(author, body, CommentKind::Approval, now);

        self.advance_or_finalize(author, now);
        Ok(())
    }

    /// Rejects the current step and terminates the workflow.
    ///
    /// Later steps remain pending forever.
    pub fn reject(
        &mut self,
        step_id: StepId,
        author: &CommentAuthor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let index = self.actionable_step_index(step_id)?;
        require_reason(reason, "reject")?;

        let step = &mut self.steps[index];
        step.decide(StepStatus::Rejected, author, now);
        step.append_comment(author, reason, CommentKind::Rejection, now);

        self.status = WorkflowStatus::Rejected;
        self.final_decision_at = Some(now);
        self.final_decision_by = Some(author.principal_id);
        self.recompute_current_flags();
        Ok(())
    }

    /// Skips the current step and advances exactly as an approval would,
    /// while the step keeps its distinct skipped status for audit.
    pub fn skip(
        &mut self,
        step_id: StepId,
        author: &CommentAuthor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let index = self.actionable_step_index(step_id)?;
        require_reason(reason, "skip")?;

        let step = &mut self.steps[index];
        step.decide(StepStatus::Skipped, author, now);
        step.append_comment(author, reason, CommentKind::Comment, now);

        self.advance_or_finalize(author, now);
        Ok(())
    }

    /// Appends a comment to any step, current or historical.
    ///
    /// Never transitions state and stays available on terminal workflows.
    pub fn add_comment(
        &mut self,
        step_id: StepId,
        author: &CommentAuthor,
        body: &str,
        kind: CommentKind,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if body.trim().is_empty() {
            return Err(AppError::Validation(
                "comment body must not be empty".to_owned(),
            ));
        }

        let step = self
            .steps
            .iter_mut()
            .find(|step| step.id == step_id)
            .ok_or_else(|| AppError::NotFound(format!("step '{step_id}' does not exist")))?;

        step.append_comment(author, body, kind, now);
        Ok(())
    }

    fn actionable_step_index(&self, step_id: StepId) -> AppResult<usize> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "workflow '{}' is already {}",
                self.id,
                self.status.as_str()
            )));
        }

        let (index, step) = self
            .steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.id == step_id)
            .ok_or_else(|| AppError::NotFound(format!("step '{step_id}' does not exist")))?;

        if step.step_number != self.current_step_number {
            return Err(AppError::InvalidTransition(format!(
                "step {} is not the current step",
                step.step_number
            )));
        }

        if step.status != StepStatus::InReview {
            return Err(AppError::InvalidTransition(format!(
                "step {} is {} and cannot be decided",
                step.step_number,
                step.status.as_str()
            )));
        }

        Ok(index)
    }

    fn advance_or_finalize(&mut self, author: &CommentAuthor, now: DateTime<Utc>) {
        let next_number = self.current_step_number + 1;
        let next = self
            .steps
            .iter_mut()
            .find(|step| step.step_number == next_number);

        match next {
            Some(step) => {
                step.status = StepStatus::InReview;
                step.submitted_at = Some(now);
                self.current_step_number = next_number;
            }
            None => {
                self.status = WorkflowStatus::Approved;
                self.final_decision_at = Some(now);
                self.final_decision_by = Some(author.principal_id);
            }
        }

        self.recompute_current_flags();
    }

    fn recompute_current_flags(&mut self) {
        let terminal = self.status.is_terminal();
        for step in &mut self.steps {
            step.is_current_step = !terminal && step.step_number == self.current_step_number;
        }
    }
}

fn require_reason(reason: &str, operation: &str) -> AppResult<()> {
    if reason.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "a reason is required to {operation} a step"
        )));
    }

    Ok(())
}
