//! Composite templates and the member index.
//!
//! The [`TemplateIndex`] is built once per engine from the scenario
//! description. It keeps, per composite name, the authored
//! [`CompositeTemplate`] the composite can be respawned from, and, per member
//! identity, the name of the composite that owns it.
//!
//! Member identities are expected to be unique. When two composites claim
//! the same member the later one wins and the clash is kept as a
//! [`MemberConflict`] so tooling can surface broken scenarios.

use std::collections::{BTreeMap, HashMap};

use lazarus_world::identity::{CompositeCategory, FactionId};
use lazarus_world::scenario::{CompositeSpec, ScenarioDescription};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// CompositeTemplate
// ---------------------------------------------------------------------------

/// How a composite was authored: structure, owner and spawn category.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeTemplate {
    pub spec: CompositeSpec,
    pub faction: FactionId,
    pub category: CompositeCategory,
    /// Some member seat is flagged for a human player or client.
    pub has_human_member: bool,
}

impl CompositeTemplate {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

/// Two composites claimed the same member identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberConflict {
    pub member: String,
    pub previous_owner: String,
    pub new_owner: String,
}

// ---------------------------------------------------------------------------
// TemplateIndex
// ---------------------------------------------------------------------------

/// Composite name -> template, member identity -> composite name.
#[derive(Debug, Default)]
pub struct TemplateIndex {
    built: bool,
    templates: BTreeMap<String, CompositeTemplate>,
    owners: HashMap<String, String>,
    conflicts: Vec<MemberConflict>,
}

impl TemplateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every composite of the description.
    ///
    /// Only the first call does any work; later calls return `false` and
    /// leave the index untouched.
    pub fn build(&mut self, description: &ScenarioDescription) -> bool {
        if self.built {
            debug!("template index already built");
            return false;
        }
        for entry in description.composites() {
            let name = entry.spec.name.clone();
            for member in &entry.spec.members {
                if let Some(previous) = self.owners.insert(member.name.clone(), name.clone()) {
                    if previous != name {
                        warn!(
                            member = %member.name,
                            previous_owner = %previous,
                            new_owner = %name,
                            "member identity claimed by two composites"
                        );
                        self.conflicts.push(MemberConflict {
                            member: member.name.clone(),
                            previous_owner: previous,
                            new_owner: name.clone(),
                        });
                    }
                }
            }
            let template = CompositeTemplate {
                has_human_member: entry.spec.has_human_member(),
                spec: entry.spec.clone(),
                faction: entry.faction,
                category: entry.category,
            };
            if self.templates.insert(name.clone(), template).is_some() {
                warn!(composite = %name, "composite name declared twice; keeping the later one");
            }
        }
        self.built = true;
        debug!(
            composites = self.templates.len(),
            members = self.owners.len(),
            conflicts = self.conflicts.len(),
            "template index built"
        );
        true
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Template of a composite.
    pub fn template(&self, composite: &str) -> Option<&CompositeTemplate> {
        self.templates.get(composite)
    }

    /// Name of the composite owning a member identity.
    pub fn owner_of(&self, member: &str) -> Option<&str> {
        self.owners.get(member).map(String::as_str)
    }

    /// Every template, ordered by composite name.
    pub fn iter(&self) -> impl Iterator<Item = &CompositeTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Member identities claimed by more than one composite.
    pub fn conflicts(&self) -> &[MemberConflict] {
        &self.conflicts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
