//! Routing-rule evaluation.
//!
//! Given the active rules for a request type and a snapshot of the relevant
//! team memberships, decide who acts on a new request. Rules are evaluated
//! in ascending priority order; the first rule that resolves to a concrete
//! assignee wins. When nothing resolves, routing falls back to the
//! manager/admin set for the organizational scope so a request is never
//! silently dropped.

use chrono::NaiveDateTime;

use crate::db::models::routing_rule::RoutingStrategy;

/// Active rule row, already filtered to the request type.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    pub id: i32,
    pub strategy: RoutingStrategy,
    pub team_id: Option<i32>,
    pub default_assignee: Option<i32>,
    pub priority: i32,
    pub required_skills: Vec<String>,
}

/// Membership snapshot for the teams referenced by the rules.
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub user_id: i32,
    pub team_id: i32,
    pub role_in_team: String,
    pub skills: Vec<String>,
    pub on_leave: bool,
    /// Open requests currently assigned to this member.
    pub open_assignments: i64,
    pub last_assigned_at: Option<NaiveDateTime>,
}

/// A resolved assignment: which rule matched and who acts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub rule_id: i32,
    pub strategy: RoutingStrategy,
    pub team_id: Option<i32>,
    pub user_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// A rule resolved to a concrete assignee.
    Assigned(Assignment),
    /// No rule resolved; every manager/admin in scope must be notified.
    Escalated { approver_ids: Vec<i32> },
    /// No rule resolved and the scope holds no manager/admin either.
    Unroutable,
}

/// Evaluate the rule set. `scope_approvers` is the manager/admin fallback
/// set for the request's organizational scope.
pub fn resolve_assignee(
    rules: &[RuleSnapshot],
    members: &[MemberSnapshot],
    scope_approvers: &[i32],
) -> RoutingOutcome {
    let mut ordered: Vec<&RuleSnapshot> = rules.iter().collect();
    ordered.sort_by_key(|rule| (rule.priority, rule.id));

    for rule in ordered {
        if let Some(user_id) = resolve_rule(rule, members) {
            return RoutingOutcome::Assigned(Assignment {
                rule_id: rule.id,
                strategy: rule.strategy,
                team_id: rule.team_id,
                user_id,
            });
        }
    }

    if scope_approvers.is_empty() {
        RoutingOutcome::Unroutable
    } else {
        let mut approver_ids = scope_approvers.to_vec();
        approver_ids.sort_unstable();
        approver_ids.dedup();
        RoutingOutcome::Escalated { approver_ids }
    }
}

fn resolve_rule(rule: &RuleSnapshot, members: &[MemberSnapshot]) -> Option<i32> {
    if rule.strategy == RoutingStrategy::DefaultAssignee {
        return rule.default_assignee;
    }

    let team_id = rule.team_id?;
    let available: Vec<&MemberSnapshot> = members
        .iter()
        .filter(|member| member.team_id == team_id && !member.on_leave)
        .collect();
    if available.is_empty() {
        return None;
    }

    match rule.strategy {
        RoutingStrategy::DefaultAssignee => unreachable!("handled above"),
        RoutingStrategy::RoundRobin => least_recently_assigned(&available),
        RoutingStrategy::LoadBalance => available
            .iter()
            .min_by_key(|member| (member.open_assignments, member.user_id))
            .map(|member| member.user_id),
        RoutingStrategy::TeamLeadFirst => {
            let leads: Vec<&MemberSnapshot> = available
                .iter()
                .copied()
                .filter(|member| member.role_in_team == "lead")
                .collect();
            if leads.is_empty() {
                least_recently_assigned(&available)
            } else {
                leads.iter().map(|member| member.user_id).min()
            }
        }
        RoutingStrategy::SkillBased => available
            .iter()
            .filter(|member| has_required_skills(member, &rule.required_skills))
            .map(|member| member.user_id)
            .min(),
        RoutingStrategy::FallbackToDepartment => {
            available.iter().map(|member| member.user_id).min()
        }
    }
}

fn has_required_skills(member: &MemberSnapshot, required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    required.iter().any(|skill| {
        member
            .skills
            .iter()
            .any(|held| held.eq_ignore_ascii_case(skill))
    })
}

// Never-assigned members sort before any timestamp; ties break on user id
// so results are stable.
fn least_recently_assigned(members: &[&MemberSnapshot]) -> Option<i32> {
    members
        .iter()
        .min_by_key(|member| (member.last_assigned_at, member.user_id))
        .map(|member| member.user_id)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{resolve_assignee, MemberSnapshot, RoutingOutcome, RuleSnapshot};
    use crate::db::models::routing_rule::RoutingStrategy;

    fn member(user_id: i32, team_id: i32) -> MemberSnapshot {
        MemberSnapshot {
            user_id,
            team_id,
            role_in_team: "member".to_string(),
            skills: Vec::new(),
            on_leave: false,
            open_assignments: 0,
            last_assigned_at: None,
        }
    }

    fn rule(id: i32, strategy: RoutingStrategy, team_id: Option<i32>, priority: i32) -> RuleSnapshot {
        RuleSnapshot {
            id,
            strategy,
            team_id,
            default_assignee: None,
            priority,
            required_skills: Vec::new(),
        }
    }

    fn assigned_user(outcome: RoutingOutcome) -> i32 {
        match outcome {
            RoutingOutcome::Assigned(assignment) => assignment.user_id,
            other => panic!("expected an assignment, got {other:?}"),
        }
    }

    #[test]
    fn default_assignee_wins_immediately() {
        let mut direct = rule(1, RoutingStrategy::DefaultAssignee, None, 10);
        direct.default_assignee = Some(77);
        let team_rule = rule(2, RoutingStrategy::RoundRobin, Some(1), 20);

        let outcome = resolve_assignee(&[direct, team_rule], &[member(5, 1)], &[1]);
        assert_eq!(assigned_user(outcome), 77);
    }

    #[test]
    fn rules_are_evaluated_in_priority_order() {
        let low_priority = rule(1, RoutingStrategy::RoundRobin, Some(1), 100);
        let high_priority = rule(2, RoutingStrategy::RoundRobin, Some(2), 10);

        let members = vec![member(5, 1), member(9, 2)];
        let outcome = resolve_assignee(&[low_priority, high_priority], &members, &[]);
        assert_eq!(assigned_user(outcome), 9);
    }

    #[test]
    fn round_robin_picks_least_recently_assigned() {
        let rules = vec![rule(1, RoutingStrategy::RoundRobin, Some(1), 10)];
        let stamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let mut recent = member(5, 1);
        recent.last_assigned_at = Some(stamp);
        let idle = member(8, 1);

        let outcome = resolve_assignee(&rules, &[recent, idle], &[]);
        assert_eq!(assigned_user(outcome), 8);
    }

    #[test]
    fn load_balance_picks_fewest_open_assignments() {
        let rules = vec![rule(1, RoutingStrategy::LoadBalance, Some(1), 10)];

        let mut busy = member(5, 1);
        busy.open_assignments = 4;
        let mut light = member(8, 1);
        light.open_assignments = 1;

        let outcome = resolve_assignee(&rules, &[busy, light], &[]);
        assert_eq!(assigned_user(outcome), 8);
    }

    #[test]
    fn team_lead_first_prefers_leads() {
        let rules = vec![rule(1, RoutingStrategy::TeamLeadFirst, Some(1), 10)];

        let plain = member(5, 1);
        let mut lead = member(8, 1);
        lead.role_in_team = "lead".to_string();

        let outcome = resolve_assignee(&rules, &[plain, lead], &[]);
        assert_eq!(assigned_user(outcome), 8);
    }

    #[test]
    fn skill_based_requires_an_intersection() {
        let mut skilled_rule = rule(1, RoutingStrategy::SkillBased, Some(1), 10);
        skilled_rule.required_skills = vec!["printers".to_string()];

        let unskilled = member(5, 1);
        let mut skilled = member(8, 1);
        skilled.skills = vec!["Printers".to_string(), "networking".to_string()];

        let outcome = resolve_assignee(&[skilled_rule], &[unskilled, skilled], &[]);
        assert_eq!(assigned_user(outcome), 8);
    }

    #[test]
    fn members_on_leave_are_skipped() {
        let rules = vec![rule(1, RoutingStrategy::RoundRobin, Some(1), 10)];

        let mut away = member(5, 1);
        away.on_leave = true;
        let present = member(8, 1);

        let outcome = resolve_assignee(&rules, &[away, present], &[]);
        assert_eq!(assigned_user(outcome), 8);
    }

    #[test]
    fn empty_team_falls_through_to_next_rule() {
        let empty_team = rule(1, RoutingStrategy::RoundRobin, Some(1), 10);
        let staffed_team = rule(2, RoutingStrategy::RoundRobin, Some(2), 20);

        let outcome = resolve_assignee(&[empty_team, staffed_team], &[member(9, 2)], &[]);
        assert_eq!(assigned_user(outcome), 9);
    }

    #[test]
    fn fallback_notifies_scope_approvers_when_nothing_resolves() {
        let rules = vec![rule(1, RoutingStrategy::RoundRobin, Some(1), 10)];

        let outcome = resolve_assignee(&rules, &[], &[3, 1, 3]);
        assert_eq!(
            outcome,
            RoutingOutcome::Escalated {
                approver_ids: vec![1, 3],
            }
        );
    }

    #[test]
    fn no_rules_and_no_approvers_is_unroutable() {
        let outcome = resolve_assignee(&[], &[], &[]);
        assert_eq!(outcome, RoutingOutcome::Unroutable);
    }
}
