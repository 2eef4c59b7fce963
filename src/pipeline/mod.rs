//! Work pipeline lifecycle.
//!
//! A script enters the pipeline when it is sent to work and then only moves
//! forward:
//!
//! ```text
//! (unset) -> todo -> content_creation -> ready_for_edit -> editing -> ready_to_publish -> published
//! ```
//!
//! `ready_for_edit` and `ready_to_publish` are reached as the effect of
//! completing the preceding phase; they are never claimed directly.
//!
//! Everything here is pure: the eligibility table, the expected starting state
//! of each transition and the column patch it writes. The conditional update
//! against the store lives in `services::pipeline_service`.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::{Role, Script, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Todo,
    ContentCreation,
    ReadyForEdit,
    Editing,
    ReadyToPublish,
    Published,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 6] = [
        PipelineStatus::Todo,
        PipelineStatus::ContentCreation,
        PipelineStatus::ReadyForEdit,
        PipelineStatus::Editing,
        PipelineStatus::ReadyToPublish,
        PipelineStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Todo => "todo",
            PipelineStatus::ContentCreation => "content_creation",
            PipelineStatus::ReadyForEdit => "ready_for_edit",
            PipelineStatus::Editing => "editing",
            PipelineStatus::ReadyToPublish => "ready_to_publish",
            PipelineStatus::Published => "published",
        }
    }

    /// Position in the lifecycle. Status never decreases.
    pub fn rank(&self) -> u8 {
        match self {
            PipelineStatus::Todo => 0,
            PipelineStatus::ContentCreation => 1,
            PipelineStatus::ReadyForEdit => 2,
            PipelineStatus::Editing => 3,
            PipelineStatus::ReadyToPublish => 4,
            PipelineStatus::Published => 5,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown pipeline status: {}", s))
    }
}

fn describe(status: Option<PipelineStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("not in the pipeline")
}

/// The identity every transition is authorized against. Built explicitly from
/// the authenticated user and passed into each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: i32,
    pub role: Option<Role>,
}

impl Actor {
    pub fn new(id: i32, role: Role) -> Self {
        Self {
            id,
            role: Some(role),
        }
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role.is_some_and(|r| roles.contains(&r))
    }

    pub fn require_any_role(&self, roles: &[Role], action: &str) -> Result<(), AppError> {
        if self.has_any_role(roles) {
            return Ok(());
        }
        let role = self.role.map(|r| r.as_str()).unwrap_or("no role");
        Err(AppError::Authorization(format!(
            "role '{}' may not {}",
            role, action
        )))
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Content,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    AnyRole(&'static [Role]),
    /// Only the actor who claimed the phase.
    Claimant(Phase),
}

const WORKSPACE_LEADS: &[Role] = &[Role::Admin, Role::Manager];
const CONTENT_CLAIMERS: &[Role] = &[Role::ContentCreator, Role::Manager, Role::Admin];
const EDIT_CLAIMERS: &[Role] = &[Role::Editor, Role::Manager, Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    SendToWork,
    ClaimContent,
    CompleteContent,
    ClaimEdit,
    CompleteEdit,
    Publish,
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::SendToWork,
        Transition::ClaimContent,
        Transition::CompleteContent,
        Transition::ClaimEdit,
        Transition::CompleteEdit,
        Transition::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::SendToWork => "send_to_work",
            Transition::ClaimContent => "claim_content",
            Transition::CompleteContent => "complete_content",
            Transition::ClaimEdit => "claim_edit",
            Transition::CompleteEdit => "complete_edit",
            Transition::Publish => "publish",
        }
    }

    /// Status the row must hold at commit time. `None` is "not in the pipeline".
    pub fn expected_status(&self) -> Option<PipelineStatus> {
        match self {
            Transition::SendToWork => None,
            Transition::ClaimContent => Some(PipelineStatus::Todo),
            Transition::CompleteContent => Some(PipelineStatus::ContentCreation),
            Transition::ClaimEdit => Some(PipelineStatus::ReadyForEdit),
            Transition::CompleteEdit => Some(PipelineStatus::Editing),
            Transition::Publish => Some(PipelineStatus::ReadyToPublish),
        }
    }

    pub fn target_status(&self) -> PipelineStatus {
        match self {
            Transition::SendToWork => PipelineStatus::Todo,
            Transition::ClaimContent => PipelineStatus::ContentCreation,
            Transition::CompleteContent => PipelineStatus::ReadyForEdit,
            Transition::ClaimEdit => PipelineStatus::Editing,
            Transition::CompleteEdit => PipelineStatus::ReadyToPublish,
            Transition::Publish => PipelineStatus::Published,
        }
    }

    pub fn eligibility(&self) -> Eligibility {
        match self {
            Transition::SendToWork | Transition::Publish => Eligibility::AnyRole(WORKSPACE_LEADS),
            Transition::ClaimContent => Eligibility::AnyRole(CONTENT_CLAIMERS),
            Transition::CompleteContent => Eligibility::Claimant(Phase::Content),
            Transition::ClaimEdit => Eligibility::AnyRole(EDIT_CLAIMERS),
            Transition::CompleteEdit => Eligibility::Claimant(Phase::Edit),
        }
    }

    /// Conditions the conditional update must re-check at commit time.
    pub fn expected_state(&self, actor: &Actor) -> ExpectedState {
        let claimant = match self.eligibility() {
            Eligibility::Claimant(phase) => Some((phase, actor.id)),
            Eligibility::AnyRole(_) => None,
        };
        ExpectedState {
            status: self.expected_status(),
            claimant,
        }
    }

    /// Column writes for this transition. Completion timestamps are clamped so
    /// they never precede the matching assignment.
    pub fn patch(
        &self,
        actor: &Actor,
        snapshot: &PipelineSnapshot,
        now: NaiveDateTime,
    ) -> TransitionPatch {
        let status = Some(self.target_status().as_str().to_string());
        match self {
            Transition::SendToWork | Transition::Publish => TransitionPatch {
                status,
                published_at: (*self == Transition::Publish).then_some(now),
                ..Default::default()
            },
            Transition::ClaimContent => TransitionPatch {
                status,
                content_creator_id: Some(actor.id),
                content_assigned_at: Some(now),
                ..Default::default()
            },
            Transition::CompleteContent => TransitionPatch {
                status,
                content_completed_at: Some(not_before(now, snapshot.content_assigned_at)),
                ..Default::default()
            },
            Transition::ClaimEdit => TransitionPatch {
                status,
                editor_id: Some(actor.id),
                edit_assigned_at: Some(now),
                ..Default::default()
            },
            Transition::CompleteEdit => TransitionPatch {
                status,
                edit_completed_at: Some(not_before(now, snapshot.edit_assigned_at)),
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn not_before(now: NaiveDateTime, floor: Option<NaiveDateTime>) -> NaiveDateTime {
    match floor {
        Some(floor) if floor > now => floor,
        _ => now,
    }
}

/// The invariant-bearing subset of a script row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub status: Option<PipelineStatus>,
    pub content_creator_id: Option<i32>,
    pub editor_id: Option<i32>,
    pub content_assigned_at: Option<NaiveDateTime>,
    pub edit_assigned_at: Option<NaiveDateTime>,
}

impl From<&Script> for PipelineSnapshot {
    fn from(script: &Script) -> Self {
        Self {
            status: script.pipeline_status(),
            content_creator_id: script.content_creator_id,
            editor_id: script.editor_id,
            content_assigned_at: script.content_assigned_at,
            edit_assigned_at: script.edit_assigned_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedState {
    pub status: Option<PipelineStatus>,
    pub claimant: Option<(Phase, i32)>,
}

/// Writes performed by a single transition. `None` leaves a column untouched,
/// so earlier timestamps are never cleared.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = crate::schema::scripts)]
pub struct TransitionPatch {
    pub status: Option<String>,
    pub content_creator_id: Option<i32>,
    pub editor_id: Option<i32>,
    pub content_assigned_at: Option<NaiveDateTime>,
    pub content_completed_at: Option<NaiveDateTime>,
    pub edit_assigned_at: Option<NaiveDateTime>,
    pub edit_completed_at: Option<NaiveDateTime>,
    pub published_at: Option<NaiveDateTime>,
}

/// The single eligibility table. State is checked before identity, so a
/// transition from the wrong state is always an illegal transition even when
/// the actor would also be ineligible.
pub fn check_transition(
    transition: Transition,
    actor: &Actor,
    snapshot: &PipelineSnapshot,
) -> Result<(), AppError> {
    let expected = transition.expected_status();
    if snapshot.status != expected {
        return Err(AppError::IllegalTransition(format!(
            "cannot {} a script that is {} (requires {})",
            transition,
            describe(snapshot.status),
            describe(expected)
        )));
    }

    match transition.eligibility() {
        Eligibility::AnyRole(roles) => {
            actor.require_any_role(roles, &transition.as_str().replace('_', " "))
        }
        Eligibility::Claimant(phase) => {
            let claimant = match phase {
                Phase::Content => snapshot.content_creator_id,
                Phase::Edit => snapshot.editor_id,
            };
            if claimant == Some(actor.id) {
                Ok(())
            } else {
                Err(AppError::Authorization(format!(
                    "only the user who claimed this task may {}",
                    transition.as_str().replace('_', " ")
                )))
            }
        }
    }
}

pub fn can_transition(transition: Transition, actor: &Actor, snapshot: &PipelineSnapshot) -> bool {
    check_transition(transition, actor, snapshot).is_ok()
}

/// Transitions the actor could perform right now, in lifecycle order.
pub fn available_transitions(actor: &Actor, snapshot: &PipelineSnapshot) -> Vec<Transition> {
    Transition::ALL
        .into_iter()
        .filter(|t| can_transition(*t, actor, snapshot))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn snapshot(status: Option<PipelineStatus>) -> PipelineSnapshot {
        PipelineSnapshot {
            status,
            ..Default::default()
        }
    }

    /// Applies a patch the way the store would, for walking the lifecycle in memory.
    fn apply(snapshot: &mut PipelineSnapshot, patch: &TransitionPatch) {
        snapshot.status = patch.status.as_deref().map(|s| s.parse().unwrap());
        if patch.content_creator_id.is_some() {
            snapshot.content_creator_id = patch.content_creator_id;
        }
        if patch.editor_id.is_some() {
            snapshot.editor_id = patch.editor_id;
        }
        if patch.content_assigned_at.is_some() {
            snapshot.content_assigned_at = patch.content_assigned_at;
        }
        if patch.edit_assigned_at.is_some() {
            snapshot.edit_assigned_at = patch.edit_assigned_at;
        }
    }

    #[test]
    fn test_status_round_trips_and_orders() {
        for status in PipelineStatus::ALL {
            assert_eq!(status.as_str().parse::<PipelineStatus>(), Ok(status));
        }
        assert!("archived".parse::<PipelineStatus>().is_err());

        let ranks: Vec<u8> = PipelineStatus::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_every_transition_moves_forward_by_one_step() {
        for transition in Transition::ALL {
            let target = transition.target_status();
            match transition.expected_status() {
                None => assert_eq!(target, PipelineStatus::Todo),
                Some(from) => assert_eq!(target.rank(), from.rank() + 1, "{}", transition),
            }
        }
    }

    #[test]
    fn test_claim_content_role_gating() {
        let todo = snapshot(Some(PipelineStatus::Todo));
        assert!(can_transition(Transition::ClaimContent, &Actor::new(1, Role::ContentCreator), &todo));
        assert!(can_transition(Transition::ClaimContent, &Actor::new(1, Role::Manager), &todo));
        assert!(can_transition(Transition::ClaimContent, &Actor::new(1, Role::Admin), &todo));

        let err = check_transition(Transition::ClaimContent, &Actor::new(1, Role::Editor), &todo)
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let roleless = Actor { id: 9, role: None };
        let err = check_transition(Transition::ClaimContent, &roleless, &todo).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_claim_edit_and_publish_role_gating() {
        let ready = snapshot(Some(PipelineStatus::ReadyForEdit));
        assert!(can_transition(Transition::ClaimEdit, &Actor::new(2, Role::Editor), &ready));
        assert!(!can_transition(Transition::ClaimEdit, &Actor::new(2, Role::ContentCreator), &ready));

        let publishable = snapshot(Some(PipelineStatus::ReadyToPublish));
        assert!(can_transition(Transition::Publish, &Actor::new(3, Role::Manager), &publishable));
        assert!(can_transition(Transition::Publish, &Actor::new(3, Role::Admin), &publishable));
        assert!(!can_transition(Transition::Publish, &Actor::new(3, Role::Editor), &publishable));
    }

    #[test]
    fn test_complete_requires_the_claimant_even_for_privileged_roles() {
        let claimed = PipelineSnapshot {
            status: Some(PipelineStatus::ContentCreation),
            content_creator_id: Some(10),
            content_assigned_at: Some(at(0)),
            ..Default::default()
        };

        assert!(can_transition(Transition::CompleteContent, &Actor::new(10, Role::ContentCreator), &claimed));

        for role in [Role::Admin, Role::Manager, Role::ContentCreator] {
            let err = check_transition(Transition::CompleteContent, &Actor::new(11, role), &claimed)
                .unwrap_err();
            assert!(matches!(err, AppError::Authorization(_)), "{:?}", role);
        }
    }

    #[test]
    fn test_wrong_state_is_illegal_not_unauthorized() {
        let todo = snapshot(Some(PipelineStatus::Todo));
        // The editor is not allowed to claim content, but the state check wins.
        let err = check_transition(Transition::CompleteContent, &Actor::new(1, Role::Editor), &todo)
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));

        let unset = snapshot(None);
        let err = check_transition(Transition::ClaimContent, &Actor::new(1, Role::Admin), &unset)
            .unwrap_err();
        assert!(matches!(err, AppError::IllegalTransition(_)));

        let published = snapshot(Some(PipelineStatus::Published));
        for transition in Transition::ALL {
            assert!(!can_transition(transition, &Actor::new(1, Role::Admin), &published));
        }
    }

    #[test]
    fn test_send_to_work_only_from_unset() {
        let leads = Actor::new(1, Role::Manager);
        assert!(can_transition(Transition::SendToWork, &leads, &snapshot(None)));
        assert!(!can_transition(Transition::SendToWork, &leads, &snapshot(Some(PipelineStatus::Todo))));
        assert!(!can_transition(Transition::SendToWork, &Actor::new(2, Role::ContentCreator), &snapshot(None)));
    }

    #[test]
    fn test_full_lifecycle_never_regresses() {
        let creator = Actor::new(1, Role::ContentCreator);
        let editor = Actor::new(2, Role::Editor);
        let manager = Actor::new(3, Role::Manager);
        let steps = [
            (Transition::SendToWork, manager),
            (Transition::ClaimContent, creator),
            (Transition::CompleteContent, creator),
            (Transition::ClaimEdit, editor),
            (Transition::CompleteEdit, editor),
            (Transition::Publish, manager),
        ];

        let mut state = PipelineSnapshot::default();
        let mut last_rank: Option<u8> = None;
        for (hour, (transition, actor)) in steps.into_iter().enumerate() {
            check_transition(transition, &actor, &state).unwrap();
            let patch = transition.patch(&actor, &state, at(hour as u32));
            apply(&mut state, &patch);

            let rank = state.status.unwrap().rank();
            if let Some(previous) = last_rank {
                assert!(rank > previous);
            }
            last_rank = Some(rank);

            // Nothing at all is possible from the new state except forward moves.
            for other in available_transitions(&Actor::new(3, Role::Admin), &state) {
                assert!(other.target_status().rank() > rank);
            }
        }

        assert_eq!(state.status, Some(PipelineStatus::Published));
        assert_eq!(state.content_creator_id, Some(1));
        assert_eq!(state.editor_id, Some(2));
    }

    #[test]
    fn test_completion_timestamp_never_precedes_assignment() {
        let creator = Actor::new(1, Role::ContentCreator);
        let claimed = PipelineSnapshot {
            status: Some(PipelineStatus::ContentCreation),
            content_creator_id: Some(1),
            content_assigned_at: Some(at(5)),
            ..Default::default()
        };

        // Clock went backwards between claim and completion.
        let patch = Transition::CompleteContent.patch(&creator, &claimed, at(4));
        assert_eq!(patch.content_completed_at, Some(at(5)));

        let patch = Transition::CompleteContent.patch(&creator, &claimed, at(7));
        assert_eq!(patch.content_completed_at, Some(at(7)));
        assert_eq!(patch.status.as_deref(), Some("ready_for_edit"));
        assert!(patch.content_assigned_at.is_none());
    }

    #[test]
    fn test_publish_patch_sets_published_at_only() {
        let manager = Actor::new(3, Role::Manager);
        let patch = Transition::Publish.patch(&manager, &snapshot(Some(PipelineStatus::ReadyToPublish)), at(9));
        assert_eq!(patch.status.as_deref(), Some("published"));
        assert_eq!(patch.published_at, Some(at(9)));
        assert!(patch.content_creator_id.is_none());
        assert!(patch.editor_id.is_none());
    }

    #[test]
    fn test_expected_state_guards_claimant_on_completion() {
        let editor = Actor::new(2, Role::Editor);
        let expected = Transition::CompleteEdit.expected_state(&editor);
        assert_eq!(expected.status, Some(PipelineStatus::Editing));
        assert_eq!(expected.claimant, Some((Phase::Edit, 2)));

        let expected = Transition::ClaimEdit.expected_state(&editor);
        assert_eq!(expected.claimant, None);
    }
}
