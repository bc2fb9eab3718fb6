//! Access policy.
//!
//! One ordered rule table decides every allow/deny question in the service. Rules are
//! evaluated top to bottom, the first rule whose actor, action, resource and condition
//! all match wins, and anything no rule matches is denied. Administrators and moderators
//! share one unrestricted tier.

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{Actor, Comment, Post, Role},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Moderate,
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Post,
    Comment,
    Category,
    Actor,
}

/// Target
///
/// What the action is aimed at. `owner` is the owning actor for posts and comments and
/// the actor itself for actor records; it is `None` for resources that do not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub resource: Resource,
    pub owner: Option<i64>,
    pub moderated: bool,
}

impl Target {
    /// A resource kind with no particular instance (create, list).
    pub fn kind(resource: Resource) -> Self {
        Self {
            resource,
            owner: None,
            moderated: false,
        }
    }

    pub fn post(post: &Post) -> Self {
        Self {
            resource: Resource::Post,
            owner: Some(post.author_id),
            moderated: post.moderated,
        }
    }

    pub fn comment(comment: &Comment) -> Self {
        Self {
            resource: Resource::Comment,
            owner: Some(comment.author_id),
            moderated: false,
        }
    }

    pub fn actor(actor: &Actor) -> Self {
        Self {
            resource: Resource::Actor,
            owner: Some(actor.id),
            moderated: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Who {
    Role(Role),
    Anonymous,
}

#[derive(Debug, Clone, Copy)]
enum Actions {
    Any,
    Only(&'static [Action]),
}

#[derive(Debug, Clone, Copy)]
enum Resources {
    Any,
    Only(&'static [Resource]),
}

#[derive(Debug, Clone, Copy)]
enum Condition {
    Always,
    OwnsTarget,
    TargetModerated,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    who: Who,
    actions: Actions,
    resources: Resources,
    condition: Condition,
    allow: bool,
}

const RULES: &[Rule] = &[
    Rule {
        who: Who::Role(Role::Administrator),
        actions: Actions::Any,
        resources: Resources::Any,
        condition: Condition::Always,
        allow: true,
    },
    Rule {
        who: Who::Role(Role::Moderator),
        actions: Actions::Any,
        resources: Resources::Any,
        condition: Condition::Always,
        allow: true,
    },
    Rule {
        who: Who::Role(Role::Author),
        actions: Actions::Only(&[Action::Create]),
        resources: Resources::Only(&[Resource::Post, Resource::Comment]),
        condition: Condition::Always,
        allow: true,
    },
    Rule {
        who: Who::Role(Role::Author),
        actions: Actions::Only(&[Action::Update, Action::Delete]),
        resources: Resources::Only(&[Resource::Post]),
        condition: Condition::OwnsTarget,
        allow: true,
    },
    // Authors may edit their own profile.
    Rule {
        who: Who::Role(Role::Author),
        actions: Actions::Only(&[Action::Update]),
        resources: Resources::Only(&[Resource::Actor]),
        condition: Condition::OwnsTarget,
        allow: true,
    },
    Rule {
        who: Who::Role(Role::Author),
        actions: Actions::Only(&[Action::Read]),
        resources: Resources::Any,
        condition: Condition::Always,
        allow: true,
    },
    Rule {
        who: Who::Role(Role::Author),
        actions: Actions::Only(&[Action::Like]),
        resources: Resources::Only(&[Resource::Post]),
        condition: Condition::Always,
        allow: true,
    },
    Rule {
        who: Who::Role(Role::Author),
        actions: Actions::Only(&[Action::Moderate]),
        resources: Resources::Any,
        condition: Condition::Always,
        allow: false,
    },
    Rule {
        who: Who::Anonymous,
        actions: Actions::Only(&[Action::Read]),
        resources: Resources::Only(&[Resource::Post]),
        condition: Condition::TargetModerated,
        allow: true,
    },
    Rule {
        who: Who::Anonymous,
        actions: Actions::Any,
        resources: Resources::Any,
        condition: Condition::Always,
        allow: false,
    },
];

impl Rule {
    fn matches(&self, actor: Option<&AuthUser>, action: Action, target: &Target) -> bool {
        let who = match (self.who, actor) {
            (Who::Role(role), Some(user)) => user.role == role,
            (Who::Anonymous, None) => true,
            _ => false,
        };
        let action_ok = match self.actions {
            Actions::Any => true,
            Actions::Only(list) => list.contains(&action),
        };
        let resource_ok = match self.resources {
            Resources::Any => true,
            Resources::Only(list) => list.contains(&target.resource),
        };
        let condition_ok = match self.condition {
            Condition::Always => true,
            Condition::OwnsTarget => match (actor, target.owner) {
                (Some(user), Some(owner)) => user.id == owner,
                _ => false,
            },
            Condition::TargetModerated => target.moderated,
        };

        who && action_ok && resource_ok && condition_ok
    }
}

/// authorize
///
/// Pure decision over the rule table. `None` is the anonymous caller.
pub fn authorize(actor: Option<&AuthUser>, action: Action, target: &Target) -> bool {
    RULES
        .iter()
        .find(|rule| rule.matches(actor, action, target))
        .map(|rule| rule.allow)
        .unwrap_or(false)
}

/// require
///
/// `authorize`, turned into a `Forbidden` error on denial.
pub fn require(actor: Option<&AuthUser>, action: Action, target: &Target) -> Result<()> {
    if authorize(actor, action, target) {
        return Ok(());
    }

    let who = actor
        .map(|user| format!("{} {}", user.role, user.id))
        .unwrap_or_else(|| "anonymous caller".to_string());
    tracing::debug!(?action, ?target, "policy denied {}", who);

    Err(AppError::forbidden(format!(
        "{} may not {:?} this {:?}",
        who, action, target.resource
    )))
}
