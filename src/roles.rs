//! Role label classification.
//!
//! Callers describe the purchased tier with free text ("VIP Mensuel",
//! "Accès à Vie", ...). The resolver walks an ordered table of
//! `(marker, kind, role id)` entries and picks the first marker contained
//! in the label. Matching is substring-based and case-sensitive.

use std::fmt;

use serde::Serialize;

use crate::config::RolesConfig;
use crate::platform::Snowflake;

/// The VIP tiers the relay manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// Recurring monthly subscription.
    Monthly,
    /// One-off lifetime purchase.
    Lifetime,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly => f.write_str("monthly"),
            Self::Lifetime => f.write_str("lifetime"),
        }
    }
}

/// Outcome of a successful classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRole {
    /// Which tier matched.
    pub kind: RoleKind,
    /// The platform role to attach or detach.
    pub role_id: Snowflake,
}

/// Role classification errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    /// No marker occurs in the label.
    #[error("unrecognized role type: {0}")]
    Unrecognized(String),
}

#[derive(Debug, Clone)]
struct MarkerRule {
    marker: String,
    resolved: ResolvedRole,
}

/// Ordered marker table mapping role labels to role ids.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    rules: Vec<MarkerRule>,
}

impl RoleResolver {
    /// Build a resolver from explicit `(marker, kind, role id)` entries,
    /// checked in the given order.
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, RoleKind, Snowflake)>,
        S: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(marker, kind, role_id)| MarkerRule {
                marker: marker.into(),
                resolved: ResolvedRole { kind, role_id },
            })
            .collect();
        Self { rules }
    }

    /// Build a resolver from config: monthly markers first, then lifetime.
    ///
    /// Kinds whose role id is not configured contribute no rules.
    pub fn from_config(config: &RolesConfig) -> Self {
        let monthly = config.monthly_role_id.into_iter().flat_map(|id| {
            config
                .monthly_markers
                .iter()
                .map(move |m| (m.clone(), RoleKind::Monthly, id))
        });
        let lifetime = config.lifetime_role_id.into_iter().flat_map(|id| {
            config
                .lifetime_markers
                .iter()
                .map(move |m| (m.clone(), RoleKind::Lifetime, id))
        });
        Self::new(monthly.chain(lifetime))
    }

    /// Classify a role label.
    ///
    /// # Errors
    ///
    /// Returns [`RoleError::Unrecognized`] echoing the label when no marker
    /// occurs in it.
    pub fn resolve(&self, label: &str) -> Result<ResolvedRole, RoleError> {
        self.rules
            .iter()
            .find(|rule| !rule.marker.is_empty() && label.contains(rule.marker.as_str()))
            .map(|rule| rule.resolved)
            .ok_or_else(|| RoleError::Unrecognized(label.to_owned()))
    }

    /// Role id configured for a kind, if any rule targets it.
    pub fn role_id(&self, kind: RoleKind) -> Option<Snowflake> {
        self.rules
            .iter()
            .find(|rule| rule.resolved.kind == kind)
            .map(|rule| rule.resolved.role_id)
    }
}
